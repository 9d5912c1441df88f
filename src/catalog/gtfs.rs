//! CSV parsing and joining of the four GTFS tables the catalog needs.

use std::collections::{BTreeSet, HashMap};
use std::io::Read;

use chrono::{DateTime, Utc};
use csv::ReaderBuilder;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::models::{Coordinate, Stop, StopMap};
use crate::normalize::parent_stop_id;

pub const STOPS: &str = "stops.txt";
pub const ROUTES: &str = "routes.txt";
pub const TRIPS: &str = "trips.txt";
pub const STOP_TIMES: &str = "stop_times.txt";

/// `location_type` value marking a parent station.
const STATION: &str = "1";

#[derive(Debug, Deserialize)]
struct StopRecord {
    stop_id: String,
    stop_name: String,
    stop_lat: String,
    stop_lon: String,
    #[serde(default)]
    location_type: Option<String>,
    #[serde(default)]
    parent_station: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RouteRecord {
    route_id: String,
    route_short_name: String,
}

#[derive(Debug, Deserialize)]
struct TripRecord {
    route_id: String,
    trip_id: String,
}

#[derive(Debug, Deserialize)]
struct StopTimeRecord {
    trip_id: String,
    stop_id: String,
}

/// Opens a table and checks that every `required` column is present.
fn open_table<R: Read>(reader: R, file: &str, required: &[&str]) -> Result<csv::Reader<R>> {
    let mut rdr = ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers = rdr.headers().map_err(|e| Error::parse(file, e))?;

    if headers.is_empty() {
        return Err(Error::parse(file, "empty file"));
    }
    for column in required {
        if !headers.iter().any(|h| h == *column) {
            return Err(Error::parse(
                file,
                format!("missing required column: {column}"),
            ));
        }
    }

    Ok(rdr)
}

/// Deserialized rows of a table; malformed rows are logged and skipped.
fn rows<'r, R, T>(rdr: &'r mut csv::Reader<R>, file: &'r str) -> impl Iterator<Item = T> + 'r
where
    R: Read + 'r,
    T: DeserializeOwned + 'r,
{
    rdr.deserialize().filter_map(move |row| match row {
        Ok(record) => Some(record),
        Err(e) => {
            warn!(file, error = %e, "Skipping malformed row");
            None
        }
    })
}

fn parse_coordinate(record: &StopRecord) -> Option<Coordinate> {
    let lat = record.stop_lat.trim().parse::<f64>();
    let lon = record.stop_lon.trim().parse::<f64>();
    match (lat, lon) {
        (Ok(lat), Ok(lon)) => Some(Coordinate::new(lat, lon)),
        _ => {
            warn!(stop_id = %record.stop_id, lat = %record.stop_lat, lon = %record.stop_lon, "Invalid coordinates for stop");
            None
        }
    }
}

/// Parent stations from `stops.txt`, with their platforms attached.
///
/// Platforms name their parent through `parent_station`, falling back to
/// the platform id with its direction suffix removed.
pub fn parse_stops<R: Read>(reader: R, now: DateTime<Utc>) -> Result<StopMap> {
    let mut rdr = open_table(
        reader,
        STOPS,
        &["stop_id", "stop_name", "stop_lat", "stop_lon"],
    )?;

    let mut stops = StopMap::new();
    let mut platforms = Vec::new();

    for record in rows::<_, StopRecord>(&mut rdr, STOPS) {
        if record.stop_id.is_empty()
            || record.stop_name.is_empty()
            || record.stop_lat.is_empty()
            || record.stop_lon.is_empty()
        {
            continue;
        }
        let Some(location) = parse_coordinate(&record) else {
            continue;
        };

        if record.location_type.as_deref() == Some(STATION) {
            let stop = Stop::new(record.stop_id.clone(), record.stop_name, location, now);
            stops.insert(record.stop_id, stop);
        } else {
            let parent = match record.parent_station {
                Some(parent) if !parent.is_empty() => parent,
                _ => parent_stop_id(&record.stop_id).to_string(),
            };
            platforms.push((parent, record.stop_id, location));
        }
    }

    for (parent, platform_id, location) in platforms {
        if let Some(stop) = stops.get_mut(&parent) {
            stop.platforms.insert(platform_id, location);
        }
    }

    Ok(stops)
}

/// `route_id` → rider-facing `route_short_name`.
pub fn parse_routes<R: Read>(reader: R) -> Result<HashMap<String, String>> {
    let mut rdr = open_table(reader, ROUTES, &["route_id", "route_short_name"])?;

    Ok(rows::<_, RouteRecord>(&mut rdr, ROUTES)
        .filter(|r| !r.route_id.is_empty() && !r.route_short_name.is_empty())
        .map(|r| (r.route_id, r.route_short_name))
        .collect())
}

/// `trip_id` → route short name, for trips whose route is known.
pub fn parse_trips<R: Read>(
    reader: R,
    route_names: &HashMap<String, String>,
) -> Result<HashMap<String, String>> {
    let mut rdr = open_table(reader, TRIPS, &["route_id", "trip_id"])?;

    Ok(rows::<_, TripRecord>(&mut rdr, TRIPS)
        .filter(|t| !t.trip_id.is_empty())
        .filter_map(|t| {
            let name = route_names.get(&t.route_id)?;
            Some((t.trip_id, name.clone()))
        })
        .collect())
}

/// Parent stop id → route codes of every trip visiting one of its platforms.
///
/// `stop_times.txt` is by far the largest table, so it is streamed.
pub fn parse_stop_times<R: Read>(
    reader: R,
    trip_routes: &HashMap<String, String>,
) -> Result<HashMap<String, BTreeSet<String>>> {
    let mut rdr = open_table(reader, STOP_TIMES, &["trip_id", "stop_id"])?;

    let mut served: HashMap<String, BTreeSet<String>> = HashMap::new();
    for st in rows::<_, StopTimeRecord>(&mut rdr, STOP_TIMES) {
        if st.stop_id.is_empty() {
            continue;
        }
        let Some(route) = trip_routes.get(&st.trip_id) else {
            continue;
        };
        let parent = parent_stop_id(&st.stop_id);
        if let Some(routes) = served.get_mut(parent) {
            if !routes.contains(route) {
                routes.insert(route.clone());
            }
        } else {
            served.insert(parent.to_string(), BTreeSet::from([route.clone()]));
        }
    }

    Ok(served)
}

/// Joins stops with routes → trips → stop_times.
///
/// `open` yields a reader for each table by file name.
pub fn build_catalog<F, R>(mut open: F, now: DateTime<Utc>) -> Result<StopMap>
where
    F: FnMut(&'static str) -> Result<R>,
    R: Read,
{
    let mut stops = parse_stops(open(STOPS)?, now)?;
    let route_names = parse_routes(open(ROUTES)?)?;
    let trip_routes = parse_trips(open(TRIPS)?, &route_names)?;
    let served = parse_stop_times(open(STOP_TIMES)?, &trip_routes)?;

    for stop in stops.values_mut() {
        if let Some(routes) = served.get(&stop.id) {
            stop.routes = routes.iter().cloned().collect();
        }
    }

    info!(
        stations = stops.len(),
        routes = route_names.len(),
        served_stations = served.len(),
        "Loaded stations from GTFS data"
    );
    Ok(stops)
}
