//! Layers decoded GTFS-RT entities onto a working copy of the stop map.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, trace};
use uuid::Uuid;

use crate::gtfs_rt::trip_update::StopTimeUpdate;
use crate::gtfs_rt::{Alert, FeedMessage, TranslatedString, TripUpdate};
use crate::models::{ActivePeriod, Arrival, Direction, ServiceAdvisory, StopMap};
use crate::normalize::{finalize_arrivals, is_stale, parent_stop_id, route_code, split_platform};

/// Per-feed counters, logged after each endpoint is applied.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FeedSummary {
    pub trip_updates: usize,
    pub arrivals: usize,
    pub skipped: usize,
    pub advisories: usize,
}

/// Applies every trip update and alert in `feed`.
///
/// Arrivals are appended to `stops`; advisories are appended to
/// `advisories`. `now` is the processing instant used for staleness and
/// delay-only predictions.
pub fn apply_feed(
    feed: &FeedMessage,
    stops: &mut StopMap,
    advisories: &mut Vec<ServiceAdvisory>,
    now: DateTime<Utc>,
) -> FeedSummary {
    let mut summary = FeedSummary::default();

    for entity in &feed.entity {
        if let Some(update) = &entity.trip_update {
            summary.trip_updates += 1;
            let (added, skipped) = apply_trip_update(update, stops, now);
            summary.arrivals += added;
            summary.skipped += skipped;
        }
        if let Some(alert) = &entity.alert {
            if let Some(advisory) = advisory_from_alert(alert) {
                advisories.push(advisory);
                summary.advisories += 1;
            }
        }
    }

    summary
}

/// Returns `(added, skipped)` stop-time counts.
fn apply_trip_update(update: &TripUpdate, stops: &mut StopMap, now: DateTime<Utc>) -> (usize, usize) {
    let raw_route = update.trip.route_id.as_deref().unwrap_or_default();
    let route = route_code(raw_route);
    if route.is_empty() {
        debug!(trip_id = ?update.trip.trip_id, "Trip update without a route");
        return (0, update.stop_time_update.len());
    }

    let mut added = 0;
    for stu in &update.stop_time_update {
        match arrival_for(stu, route, stops, now) {
            Some((parent, direction, arrival)) => {
                if let Some(stop) = stops.get_mut(parent) {
                    stop.arrivals.bucket_mut(direction).push(arrival);
                    added += 1;
                }
            }
            None => trace!(stop_id = ?stu.stop_id, route, "Skipping stop time update"),
        }
    }

    (added, update.stop_time_update.len() - added)
}

fn arrival_for<'s>(
    stu: &'s StopTimeUpdate,
    route: &str,
    stops: &StopMap,
    now: DateTime<Utc>,
) -> Option<(&'s str, Direction, Arrival)> {
    let (parent, direction) = split_platform(stu.stop_id.as_deref()?)?;
    let event = stu.arrival.as_ref()?;

    let time = match (event.time, event.delay) {
        (Some(secs), _) => DateTime::from_timestamp(secs, 0)?,
        (None, Some(delay)) => now + Duration::seconds(i64::from(delay)),
        (None, None) => return None,
    };

    if is_stale(time, now) || !stops.contains_key(parent) {
        return None;
    }

    Some((
        parent,
        direction,
        Arrival {
            route: route.to_string(),
            time,
        },
    ))
}

fn first_text(text: Option<&TranslatedString>) -> Option<&str> {
    text?
        .translation
        .iter()
        .map(|t| t.text.as_str())
        .find(|t| !t.is_empty())
}

fn timestamp(secs: Option<u64>) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(i64::try_from(secs?).ok()?, 0)
}

/// Converts a GTFS-RT alert into an advisory with a fresh identifier.
///
/// Alerts without header text are ignored.
pub fn advisory_from_alert(alert: &Alert) -> Option<ServiceAdvisory> {
    let header = first_text(alert.header_text.as_ref())?;
    let description = first_text(alert.description_text.as_ref()).unwrap_or_default();

    let mut routes = Vec::new();
    let mut stops = Vec::new();
    for entity in &alert.informed_entity {
        if let Some(route) = entity.route_id.as_deref().map(route_code) {
            if !route.is_empty() {
                routes.push(route.to_string());
            }
        }
        if let Some(stop_id) = entity.stop_id.as_deref() {
            stops.push(parent_stop_id(stop_id).to_string());
        }
    }

    let active_periods = alert
        .active_period
        .iter()
        .map(|p| ActivePeriod {
            start: timestamp(p.start),
            end: timestamp(p.end),
        })
        .collect();

    Some(ServiceAdvisory {
        id: format!("rt_{}", Uuid::new_v4()),
        header: header.to_string(),
        description: description.to_string(),
        routes,
        stops,
        active_periods,
    })
}

/// Dedupes, sorts and caps both arrival buckets of every stop and stamps
/// `now` as its last update.
pub fn finalize_stops(stops: &mut StopMap, now: DateTime<Utc>) {
    for stop in stops.values_mut() {
        let arrivals = &mut stop.arrivals;
        arrivals.north = finalize_arrivals(std::mem::take(&mut arrivals.north));
        arrivals.south = finalize_arrivals(std::mem::take(&mut arrivals.south));
        stop.last_update = now;
    }
}
