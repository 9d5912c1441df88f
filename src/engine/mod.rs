//! Real-time merge engine.
//!
//! A [`MergeEngine`] owns one background task that runs a [`MergeCycle`]
//! immediately on start and then once per `realtime_interval`. Each cycle
//! optionally reloads the static catalog, then fetches every real-time
//! endpoint, layers the fresh arrivals onto a working copy of the stops and
//! installs the result into the [`SnapshotStore`].

mod feed;
mod realtime;

pub use feed::{FeedSource, HttpFeedSource};
pub use realtime::{FeedSummary, advisory_from_alert, apply_feed, finalize_stops};

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::catalog::CatalogSource;
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::parser::parse_feed;
use crate::store::SnapshotStore;

/// One static + real-time refresh pass, plus the static load bookkeeping
/// carried between passes.
pub struct MergeCycle {
    store: Arc<SnapshotStore>,
    catalog: Arc<dyn CatalogSource>,
    feeds: Arc<dyn FeedSource>,
    config: EngineConfig,
    last_static_load: Option<Instant>,
}

impl MergeCycle {
    pub fn new(
        store: Arc<SnapshotStore>,
        catalog: Arc<dyn CatalogSource>,
        feeds: Arc<dyn FeedSource>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            catalog,
            feeds,
            config,
            last_static_load: None,
        }
    }

    fn static_refresh_due(&self) -> bool {
        match self.last_static_load {
            None => true,
            Some(at) => {
                self.config.static_refresh_enabled() && at.elapsed() >= self.config.static_interval
            }
        }
    }

    /// Runs one merge cycle.
    ///
    /// Only a failed first static load is returned as an error
    /// ([`Error::InitialLoad`]); every other upstream failure is logged. A
    /// failed static refresh keeps the previous catalog, and endpoints that
    /// fail contribute no arrivals to the installed snapshot.
    #[tracing::instrument(skip(self), fields(source = %self.catalog.describe()))]
    pub async fn run(&mut self) -> Result<()> {
        if self.static_refresh_due() {
            match self.catalog.load_catalog().await {
                Ok(stops) => {
                    info!(stations = stops.len(), "Static GTFS data loaded");
                    self.store.install_catalog(stops);
                    self.last_static_load = Some(Instant::now());
                }
                Err(e) if self.last_static_load.is_none() => {
                    return Err(Error::InitialLoad(Box::new(e)));
                }
                Err(e) => {
                    warn!(
                        error = %e,
                        last_update = ?self.store.last_static_update(),
                        "Failed to refresh static GTFS data, keeping existing catalog"
                    );
                }
            }
        }

        self.refresh_realtime().await;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(endpoints = self.config.feed_urls.len()))]
    async fn refresh_realtime(&self) {
        let mut stops = self.store.working_copy();

        let payloads = join_all(self.config.feed_urls.iter().map(|url| async move {
            (url.as_str(), self.feeds.fetch(url).await)
        }))
        .await;

        let now = Utc::now();
        let mut advisories = Vec::new();
        let mut failed = 0;

        for (url, payload) in payloads {
            let bytes = match payload {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(url, stage = "fetch", error = %e, "Failed to process feed");
                    failed += 1;
                    continue;
                }
            };
            let feed = match parse_feed(&bytes) {
                Ok(feed) => feed,
                Err(e) => {
                    warn!(url, stage = "decode", error = %e, "Failed to process feed");
                    failed += 1;
                    continue;
                }
            };

            let summary = apply_feed(&feed, &mut stops, &mut advisories, now);
            debug!(
                url,
                entities = feed.entity.len(),
                trip_updates = summary.trip_updates,
                arrivals = summary.arrivals,
                skipped = summary.skipped,
                advisories = summary.advisories,
                "Feed applied"
            );
        }

        if failed > 0 && failed == self.config.feed_urls.len() {
            error!(failed, "Every real-time feed failed, installing stops without arrivals");
        }

        finalize_stops(&mut stops, now);
        info!(
            stations = stops.len(),
            advisories = advisories.len(),
            failed,
            "Real-time data merged"
        );
        self.store.replace_stops(stops);
        self.store.replace_advisories(advisories);
    }
}

struct Running {
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// Lifecycle owner for the background merge loop.
pub struct MergeEngine {
    store: Arc<SnapshotStore>,
    catalog: Arc<dyn CatalogSource>,
    feeds: Arc<dyn FeedSource>,
    config: EngineConfig,
    cycles: Arc<watch::Sender<u64>>,
    running: Option<Running>,
}

impl MergeEngine {
    pub fn new(
        store: Arc<SnapshotStore>,
        catalog: Arc<dyn CatalogSource>,
        feeds: Arc<dyn FeedSource>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            catalog,
            feeds,
            config,
            cycles: Arc::new(watch::channel(0).0),
            running: None,
        }
    }

    pub fn store(&self) -> &Arc<SnapshotStore> {
        &self.store
    }

    /// Number of merge cycles completed so far, successful or not.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.cycles.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Spawns the merge loop. The first cycle runs immediately.
    ///
    /// Calling `start` on a running engine does nothing.
    pub fn start(&mut self) {
        if self.running.is_some() {
            warn!("Merge engine already running");
            return;
        }

        let cycle = MergeCycle::new(
            self.store.clone(),
            self.catalog.clone(),
            self.feeds.clone(),
            self.config.clone(),
        );
        let period = self.config.realtime_interval.max(Duration::from_millis(1));
        let (shutdown, rx) = oneshot::channel();
        let handle = tokio::spawn(run_loop(cycle, period, self.cycles.clone(), rx));

        info!(interval_secs = period.as_secs_f64(), "Merge engine started");
        self.running = Some(Running { shutdown, handle });
    }

    /// Signals the loop to exit and waits for it. An in-flight cycle is
    /// allowed to finish first.
    pub async fn stop(&mut self) {
        let Some(Running { shutdown, handle }) = self.running.take() else {
            return;
        };

        let _ = shutdown.send(());
        if let Err(e) = handle.await {
            error!(error = %e, "Merge loop terminated abnormally");
        }
    }
}

async fn run_loop(
    mut cycle: MergeCycle,
    period: Duration,
    cycles: Arc<watch::Sender<u64>>,
    mut shutdown: oneshot::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => break,
            _ = ticker.tick() => {}
        }

        if let Err(e) = cycle.run().await {
            error!(error = %e, "Merge cycle failed");
        }
        cycles.send_modify(|n| *n += 1);
    }

    info!("Merge engine stopped");
}
