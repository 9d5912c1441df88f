//! Query facade over a running merge engine.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::catalog::CatalogSource;
use crate::config::EngineConfig;
use crate::engine::{FeedSource, HttpFeedSource, MergeEngine};
use crate::error::Result;
use crate::models::{Coordinate, ServiceAdvisory, Stop};
use crate::store::SnapshotStore;

/// Read access to the current snapshot.
pub trait Client: Send + Sync {
    fn stops_by_location(&self, location: Coordinate, limit: usize) -> Result<Vec<Stop>>;
    fn stops_by_route(&self, route: &str) -> Result<Vec<Stop>>;
    fn stops_by_ids(&self, ids: &[String]) -> Result<Vec<Stop>>;
    fn routes(&self) -> Result<Vec<String>>;
    fn service_advisories(&self) -> Result<Vec<ServiceAdvisory>>;
    fn last_realtime_update(&self) -> Option<DateTime<Utc>>;
    fn last_static_update(&self) -> Option<DateTime<Utc>>;
}

impl Client for SnapshotStore {
    fn stops_by_location(&self, location: Coordinate, limit: usize) -> Result<Vec<Stop>> {
        Ok(self.query_by_proximity(location, limit))
    }

    fn stops_by_route(&self, route: &str) -> Result<Vec<Stop>> {
        self.query_by_route(route)
    }

    fn stops_by_ids(&self, ids: &[String]) -> Result<Vec<Stop>> {
        self.query_by_ids(ids)
    }

    fn routes(&self) -> Result<Vec<String>> {
        Ok(self.list_routes())
    }

    fn service_advisories(&self) -> Result<Vec<ServiceAdvisory>> {
        Ok(self.list_advisories())
    }

    fn last_realtime_update(&self) -> Option<DateTime<Utc>> {
        SnapshotStore::last_realtime_update(self)
    }

    fn last_static_update(&self) -> Option<DateTime<Utc>> {
        SnapshotStore::last_static_update(self)
    }
}

/// In-process client: owns a store and the engine that keeps it fresh.
pub struct LocalClient {
    store: Arc<SnapshotStore>,
    engine: MergeEngine,
}

impl LocalClient {
    /// Starts an engine that fetches feeds over HTTP with `config`.
    pub fn start(config: EngineConfig, catalog: Arc<dyn CatalogSource>) -> Result<Self> {
        let feeds = Arc::new(HttpFeedSource::from_config(&config)?);
        Ok(Self::with_feeds(config, catalog, feeds))
    }

    pub fn with_feeds(
        config: EngineConfig,
        catalog: Arc<dyn CatalogSource>,
        feeds: Arc<dyn FeedSource>,
    ) -> Self {
        let store = Arc::new(SnapshotStore::new());
        let mut engine = MergeEngine::new(store.clone(), catalog, feeds, config);
        engine.start();
        Self { store, engine }
    }

    /// Shared handle to the store, for adapters such as the HTTP server.
    pub fn store(&self) -> Arc<SnapshotStore> {
        self.store.clone()
    }

    /// Waits until the engine has completed its first merge cycle, or
    /// `timeout` passes. Returns whether static data is loaded.
    pub async fn wait_for_first_cycle(&self, timeout: Duration) -> bool {
        let mut cycles = self.engine.subscribe();
        if tokio::time::timeout(timeout, cycles.wait_for(|n| *n >= 1))
            .await
            .is_err()
        {
            return false;
        }
        self.store.last_static_update().is_some()
    }

    /// Stops the engine and waits for its loop to exit.
    pub async fn close(mut self) {
        self.engine.stop().await;
        info!("Client closed");
    }
}

impl Client for LocalClient {
    fn stops_by_location(&self, location: Coordinate, limit: usize) -> Result<Vec<Stop>> {
        self.store.stops_by_location(location, limit)
    }

    fn stops_by_route(&self, route: &str) -> Result<Vec<Stop>> {
        self.store.stops_by_route(route)
    }

    fn stops_by_ids(&self, ids: &[String]) -> Result<Vec<Stop>> {
        self.store.stops_by_ids(ids)
    }

    fn routes(&self) -> Result<Vec<String>> {
        self.store.routes()
    }

    fn service_advisories(&self) -> Result<Vec<ServiceAdvisory>> {
        self.store.service_advisories()
    }

    fn last_realtime_update(&self) -> Option<DateTime<Utc>> {
        Client::last_realtime_update(self.store.as_ref())
    }

    fn last_static_update(&self) -> Option<DateTime<Utc>> {
        Client::last_static_update(self.store.as_ref())
    }
}
