//! Value types for stops, arrivals and service advisories.
//!
//! Everything here is plain data: the store hands out clones, so a caller
//! mutating a returned [`Stop`] never affects the installed snapshot.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stops keyed by their parent-station identifier.
pub type StopMap = HashMap<String, Stop>;

/// A latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// Directional bucket for arrivals, taken from the platform suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    North,
    South,
}

impl Direction {
    /// Maps a platform suffix (`N`/`S`) to its direction.
    pub fn from_suffix(c: char) -> Option<Self> {
        match c {
            'N' => Some(Direction::North),
            'S' => Some(Direction::South),
            _ => None,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::North => write!(f, "North"),
            Direction::South => write!(f, "South"),
        }
    }
}

/// A predicted vehicle visit. Identity is the `(route, time)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Arrival {
    pub route: String,
    pub time: DateTime<Utc>,
}

/// Upcoming arrivals split by direction.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Arrivals {
    pub north: Vec<Arrival>,
    pub south: Vec<Arrival>,
}

impl Arrivals {
    pub fn get(&self, direction: Direction) -> &[Arrival] {
        match direction {
            Direction::North => &self.north,
            Direction::South => &self.south,
        }
    }

    pub fn bucket_mut(&mut self, direction: Direction) -> &mut Vec<Arrival> {
        match direction {
            Direction::North => &mut self.north,
            Direction::South => &mut self.south,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.north.is_empty() && self.south.is_empty()
    }
}

/// A physical station with its platforms, routes and live arrivals.
#[derive(Debug, Clone, PartialEq)]
pub struct Stop {
    pub id: String,
    pub name: String,
    pub location: Coordinate,
    /// Route codes serving this stop, sorted and distinct.
    pub routes: Vec<String>,
    pub arrivals: Arrivals,
    /// Child platform id → platform coordinate.
    pub platforms: BTreeMap<String, Coordinate>,
    pub last_update: DateTime<Utc>,
}

impl Stop {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        location: Coordinate,
        last_update: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            location,
            routes: Vec::new(),
            arrivals: Arrivals::default(),
            platforms: BTreeMap::new(),
            last_update,
        }
    }

    /// Copy of this stop with both arrival buckets emptied.
    pub fn without_arrivals(&self) -> Self {
        Self {
            arrivals: Arrivals::default(),
            ..self.clone()
        }
    }
}

/// Validity window of an advisory; either end may be open.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ActivePeriod {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
}

/// A rider-facing service disruption notice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceAdvisory {
    pub id: String,
    pub header: String,
    pub description: String,
    pub routes: Vec<String>,
    #[serde(rename = "stations")]
    pub stops: Vec<String>,
    pub active_periods: Vec<ActivePeriod>,
}
