//! HTTP adapter over a [`crate::client::Client`].
//!
//! Every endpoint answers JSON wrapped in `{data, updated, static_data_updated}`;
//! errors are `{"error": message}`.

mod dto;
mod routes;

pub use dto::*;
pub use routes::{AppError, AppState, create_router};
