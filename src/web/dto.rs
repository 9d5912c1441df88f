//! Response bodies.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::models::{Arrival, Coordinate, Stop};

fn rfc3339(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn pair(c: Coordinate) -> [f64; 2] {
    [c.lat, c.lon]
}

/// Freshness of the data a response was built from.
#[derive(Debug, Default, Serialize, PartialEq)]
pub struct ResponseMetadata {
    /// Last real-time merge.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,
    /// Last static catalog load.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub static_data_updated: Option<String>,
}

impl ResponseMetadata {
    pub fn new(updated: Option<DateTime<Utc>>, static_data_updated: Option<DateTime<Utc>>) -> Self {
        Self {
            updated: updated.map(rfc3339),
            static_data_updated: static_data_updated.map(rfc3339),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub data: T,
    #[serde(flatten)]
    pub meta: ResponseMetadata,
}

#[derive(Debug, Serialize)]
pub struct StopResponse {
    pub id: String,
    pub name: String,
    /// `[lat, lon]`
    pub location: [f64; 2],
    pub routes: Vec<String>,
    #[serde(rename = "N")]
    pub north: Vec<Arrival>,
    #[serde(rename = "S")]
    pub south: Vec<Arrival>,
    /// Platform id → `[lat, lon]`
    pub stops: BTreeMap<String, [f64; 2]>,
    pub last_update: DateTime<Utc>,
}

impl From<Stop> for StopResponse {
    fn from(stop: Stop) -> Self {
        Self {
            location: pair(stop.location),
            stops: stop
                .platforms
                .into_iter()
                .map(|(id, c)| (id, pair(c)))
                .collect(),
            north: stop.arrivals.north,
            south: stop.arrivals.south,
            id: stop.id,
            name: stop.name,
            routes: stop.routes,
            last_update: stop.last_update,
        }
    }
}

/// Stop list response; `updated` is the newest stop update when there is one.
pub fn stops_envelope(stops: Vec<Stop>, mut meta: ResponseMetadata) -> Envelope<Vec<StopResponse>> {
    if let Some(newest) = stops.iter().map(|s| s.last_update).max() {
        meta.updated = Some(rfc3339(newest));
    }
    Envelope {
        data: stops.into_iter().map(StopResponse::from).collect(),
        meta,
    }
}

#[derive(Debug, Serialize)]
pub struct IndexData {
    pub title: &'static str,
    pub readme: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
