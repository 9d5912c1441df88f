//! Concurrent in-memory snapshot of stops, routes and advisories.
//!
//! Writes are rare (one per merge cycle) and replace the snapshot wholesale
//! under the write lock; reads take the shared lock and return clones.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::{Error, Result};
use crate::geo::haversine_km;
use crate::models::{Coordinate, ServiceAdvisory, Stop, StopMap};

#[derive(Debug, Default)]
struct Snapshot {
    stops: StopMap,
    /// Route code → stop ids, ordered by stop name.
    by_route: HashMap<String, Vec<String>>,
    routes: Vec<String>,
    advisories: Vec<ServiceAdvisory>,
    last_realtime_update: Option<DateTime<Utc>>,
    last_static_update: Option<DateTime<Utc>>,
}

impl Snapshot {
    fn install(&mut self, stops: StopMap, now: DateTime<Utc>) {
        let mut by_route: HashMap<String, Vec<String>> = HashMap::new();
        for stop in stops.values() {
            for route in &stop.routes {
                by_route
                    .entry(route.clone())
                    .or_default()
                    .push(stop.id.clone());
            }
        }

        for ids in by_route.values_mut() {
            ids.sort_by(|a, b| {
                let (sa, sb) = (&stops[a], &stops[b]);
                sa.name.cmp(&sb.name).then_with(|| sa.id.cmp(&sb.id))
            });
            ids.dedup();
        }

        let mut routes: Vec<String> = by_route.keys().cloned().collect();
        routes.sort();

        debug!(stops = stops.len(), routes = routes.len(), "Installed snapshot");

        self.stops = stops;
        self.by_route = by_route;
        self.routes = routes;
        self.last_realtime_update = Some(now);
    }
}

/// Thread-safe holder of the current [`Snapshot`].
///
/// Construct one per process and share it behind an `Arc`.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    inner: RwLock<Snapshot>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Snapshot> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Snapshot> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Installs `stops` as the current stop map and rebuilds the route index.
    ///
    /// Records the real-time merge timestamp as now.
    pub fn replace_stops(&self, stops: StopMap) {
        self.write().install(stops, Utc::now());
    }

    /// Installs a freshly loaded static catalog and records the static load
    /// timestamp in the same critical section.
    pub fn install_catalog(&self, stops: StopMap) {
        let now = Utc::now();
        let mut snapshot = self.write();
        snapshot.install(stops, now);
        snapshot.last_static_update = Some(now);
    }

    /// Replaces the advisory list wholesale.
    pub fn replace_advisories(&self, advisories: Vec<ServiceAdvisory>) {
        self.write().advisories = advisories;
    }

    /// Up to `limit` stops ordered by great-circle distance from `origin`.
    ///
    /// Ties keep no particular order.
    pub fn query_by_proximity(&self, origin: Coordinate, limit: usize) -> Vec<Stop> {
        let snapshot = self.read();

        let mut by_distance: Vec<(f64, &Stop)> = snapshot
            .stops
            .values()
            .map(|stop| (haversine_km(origin, stop.location), stop))
            .collect();
        by_distance.sort_by(|a, b| a.0.total_cmp(&b.0));

        by_distance
            .into_iter()
            .take(limit)
            .map(|(_, stop)| stop.clone())
            .collect()
    }

    /// All stops serving `route`, ordered by name. Matching ignores case.
    pub fn query_by_route(&self, route: &str) -> Result<Vec<Stop>> {
        let route = route.to_uppercase();
        let snapshot = self.read();

        let ids = snapshot
            .by_route
            .get(&route)
            .ok_or_else(|| Error::NotFound(format!("route {route} not found")))?;

        Ok(ids.iter().map(|id| snapshot.stops[id].clone()).collect())
    }

    /// The stops among `ids` that exist, in request order. Unknown ids are
    /// skipped; fails only when none match.
    pub fn query_by_ids<S: AsRef<str>>(&self, ids: &[S]) -> Result<Vec<Stop>> {
        let snapshot = self.read();

        let mut seen = HashSet::new();
        let result: Vec<Stop> = ids
            .iter()
            .map(|id| id.as_ref())
            .filter(|id| seen.insert(*id))
            .filter_map(|id| snapshot.stops.get(id).cloned())
            .collect();

        if result.is_empty() {
            return Err(Error::NotFound("no stations found for given IDs".into()));
        }
        Ok(result)
    }

    /// Sorted list of known route codes.
    pub fn list_routes(&self) -> Vec<String> {
        self.read().routes.clone()
    }

    pub fn list_advisories(&self) -> Vec<ServiceAdvisory> {
        self.read().advisories.clone()
    }

    pub fn last_realtime_update(&self) -> Option<DateTime<Utc>> {
        self.read().last_realtime_update
    }

    pub fn last_static_update(&self) -> Option<DateTime<Utc>> {
        self.read().last_static_update
    }

    /// Every stop reachable through the route index, with arrivals cleared.
    ///
    /// This is the base a merge cycle layers fresh arrivals onto.
    pub fn working_copy(&self) -> StopMap {
        let snapshot = self.read();

        let ids: BTreeSet<&String> = snapshot.by_route.values().flatten().collect();
        ids.into_iter()
            .map(|id| (id.clone(), snapshot.stops[id].without_arrivals()))
            .collect()
    }
}
