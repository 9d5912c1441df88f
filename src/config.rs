//! Merge engine configuration.

use std::time::Duration;

/// NYCT subway GTFS-RT endpoints, one per line group.
pub const FEED_URLS: [&str; 7] = [
    "https://api-endpoint.mta.info/Dataservice/mtagtfsfeeds/nyct%2Fgtfs",
    "https://api-endpoint.mta.info/Dataservice/mtagtfsfeeds/nyct%2Fgtfs-l",
    "https://api-endpoint.mta.info/Dataservice/mtagtfsfeeds/nyct%2Fgtfs-nqrw",
    "https://api-endpoint.mta.info/Dataservice/mtagtfsfeeds/nyct%2Fgtfs-bdfm",
    "https://api-endpoint.mta.info/Dataservice/mtagtfsfeeds/nyct%2Fgtfs-ace",
    "https://api-endpoint.mta.info/Dataservice/mtagtfsfeeds/nyct%2Fgtfs-jz",
    "https://api-endpoint.mta.info/Dataservice/mtagtfsfeeds/nyct%2Fgtfs-g",
];

pub const DEFAULT_REALTIME_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_STATIC_INTERVAL: Duration = Duration::from_secs(6 * 60 * 60);
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Period between merge cycles.
    pub realtime_interval: Duration,
    /// Period between static catalog reloads. [`Duration::ZERO`] loads once.
    pub static_interval: Duration,
    /// Upper bound on each network call.
    pub fetch_timeout: Duration,
    pub feed_urls: Vec<String>,
    /// Sent verbatim as the `x-api-key` header.
    pub api_key: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            realtime_interval: DEFAULT_REALTIME_INTERVAL,
            static_interval: DEFAULT_STATIC_INTERVAL,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            feed_urls: FEED_URLS.iter().map(|u| u.to_string()).collect(),
            api_key: String::new(),
        }
    }
}

impl EngineConfig {
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = api_key.into();
        self
    }

    pub fn with_realtime_interval(mut self, interval: Duration) -> Self {
        self.realtime_interval = interval;
        self
    }

    pub fn with_static_interval(mut self, interval: Duration) -> Self {
        self.static_interval = interval;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn with_feed_urls<I, S>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.feed_urls = urls.into_iter().map(Into::into).collect();
        self
    }

    /// Whether the static catalog is reloaded after the first load.
    pub fn static_refresh_enabled(&self) -> bool {
        !self.static_interval.is_zero()
    }
}
