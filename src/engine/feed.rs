use std::sync::Arc;

use async_trait::async_trait;

use crate::config::EngineConfig;
use crate::error::Result;
use crate::fetch::{ApiKey, BasicClient, HttpClient, fetch_bytes};

/// Where the merge engine gets raw GTFS-RT payloads from.
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// Fetches feeds over HTTP, sending the API key when one is configured.
#[derive(Clone)]
pub struct HttpFeedSource {
    client: Arc<dyn HttpClient>,
}

impl HttpFeedSource {
    pub fn new(client: Arc<dyn HttpClient>) -> Self {
        Self { client }
    }

    /// Timeout-bounded client with the `x-api-key` header.
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        let basic = BasicClient::new(config.fetch_timeout)?;
        let client: Arc<dyn HttpClient> = if config.api_key.is_empty() {
            Arc::new(basic)
        } else {
            Arc::new(ApiKey::x_api_key(basic, &config.api_key)?)
        };
        Ok(Self::new(client))
    }
}

#[async_trait]
impl FeedSource for HttpFeedSource {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        fetch_bytes(self.client.as_ref(), url).await
    }
}
