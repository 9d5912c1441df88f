pub mod catalog;
pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod fetch;
pub mod geo;
pub mod models;
pub mod normalize;
pub mod parser;
pub mod store;
pub mod web;

pub use error::{Error, Result};

pub mod gtfs_rt {
    include!(concat!(env!("OUT_DIR"), "/transit_realtime.rs"));
}
