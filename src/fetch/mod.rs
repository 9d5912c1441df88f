//! HTTP plumbing for static archives and real-time feeds.
//!
//! [`HttpClient`] is the seam: [`BasicClient`] talks to the network with a
//! bounded timeout and [`ApiKey`] decorates any client with a credential
//! header.

mod auth;
mod basic;

pub use auth::ApiKey;
pub use basic::BasicClient;

use async_trait::async_trait;
use reqwest::{Request, Response, StatusCode};
use tracing::debug;

use crate::error::{Error, Result};

#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, req: Request) -> reqwest::Result<Response>;
}

/// GETs `url` through `client` and returns the body.
///
/// A 404 maps to [`Error::NotFound`]; any other non-success status or
/// transport failure maps to [`Error::Fetch`].
pub async fn fetch_bytes<C: HttpClient + ?Sized>(client: &C, url: &str) -> Result<Vec<u8>> {
    let url = url
        .parse()
        .map_err(|e| Error::Fetch(format!("invalid URL {url}: {e}")))?;
    let req = Request::new(reqwest::Method::GET, url);

    let resp = client.execute(req).await?;
    let status = resp.status();
    if status == StatusCode::NOT_FOUND {
        return Err(Error::NotFound(format!("HTTP {status}")));
    }
    if !status.is_success() {
        return Err(Error::Fetch(format!("HTTP {status}")));
    }

    let bytes = resp.bytes().await?;
    debug!(bytes = bytes.len(), "Fetched payload");
    Ok(bytes.to_vec())
}
