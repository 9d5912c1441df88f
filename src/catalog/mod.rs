//! Static catalog loading.
//!
//! A [`CatalogSource`] produces the stop map (names, coordinates, platforms
//! and served routes) by joining `stops.txt`, `routes.txt`, `trips.txt` and
//! `stop_times.txt`. [`GtfsDirectory`] reads an extracted feed from disk;
//! [`GtfsArchive`] downloads the zipped feed.

mod gtfs;
mod source;

#[cfg(test)]
pub(crate) mod fixtures;

pub use gtfs::build_catalog;
pub use source::{GtfsArchive, GtfsDirectory, GTFS_REGULAR_URL, GTFS_SUPPLEMENTED_URL};

use async_trait::async_trait;

use crate::error::Result;
use crate::models::StopMap;

/// Produces a complete stop map from static schedule data.
///
/// Fails with [`crate::Error::NotFound`] when the source is unavailable and
/// [`crate::Error::Parse`] when a table lacks a required column.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn load_catalog(&self) -> Result<StopMap>;

    /// Human-readable location, used in log fields.
    fn describe(&self) -> String;
}
