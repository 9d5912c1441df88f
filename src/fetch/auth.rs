use async_trait::async_trait;
use reqwest::header::{HeaderName, HeaderValue};

use super::HttpClient;
use crate::error::{Error, Result};

/// An [`HttpClient`] wrapper that sends an API key as an HTTP header.
///
/// The header is validated once at construction, so sending never fails on
/// a malformed key.
#[derive(Debug, Clone)]
pub struct ApiKey<C> {
    inner: C,
    header_name: HeaderName,
    key: HeaderValue,
}

impl<C> ApiKey<C> {
    pub fn new(inner: C, header_name: &str, key: &str) -> Result<Self> {
        let header_name = HeaderName::from_bytes(header_name.as_bytes())
            .map_err(|e| Error::Fetch(format!("invalid header name {header_name:?}: {e}")))?;
        let mut key = HeaderValue::from_str(key)
            .map_err(|_| Error::Fetch("API key is not a valid header value".into()))?;
        key.set_sensitive(true);

        Ok(Self {
            inner,
            header_name,
            key,
        })
    }

    /// `x-api-key: <key>`, the scheme used by the MTA feed endpoints.
    pub fn x_api_key(inner: C, key: &str) -> Result<Self> {
        Self::new(inner, "x-api-key", key)
    }
}

#[async_trait]
impl<C: HttpClient> HttpClient for ApiKey<C> {
    async fn execute(&self, mut req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        req.headers_mut()
            .insert(self.header_name.clone(), self.key.clone());
        self.inner.execute(req).await
    }
}
