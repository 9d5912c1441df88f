//! Small GTFS tables shared by the catalog tests.

use std::io::Write;
use std::path::Path;

use super::gtfs::{ROUTES, STOP_TIMES, STOPS, TRIPS};

pub const STOPS_TXT: &str = "\
stop_id,stop_name,stop_lat,stop_lon,location_type,parent_station
127,Times Sq-42 St,40.755477,-73.987691,1,
127N,Times Sq-42 St,40.755983,-73.986229,,127
127S,Times Sq-42 St,40.75529,-73.987495,,
635,14 St-Union Sq,40.734673,-73.989951,1,
635N,14 St-Union Sq,40.735736,-73.990568,,635
631,Grand Central-42 St,40.751776,-73.976848,1,
BAD,Broken,not-a-number,-73.9,1,
,Nameless,40.0,-73.0,1,
";

pub const ROUTES_TXT: &str = "\
agency_id,route_id,route_short_name,route_long_name
MTA NYCT,N,N,Broadway Express
MTA NYCT,1,1,Broadway - 7 Avenue Local
MTA NYCT,6,6,Lexington Avenue Local
MTA NYCT,X,,Nameless
";

pub const TRIPS_TXT: &str = "\
route_id,trip_id,service_id
N,N-1,Weekday
N,N-2,Weekday
1,1-1,Weekday
6,6-1,Weekday
X,X-1,Weekday
";

pub const STOP_TIMES_TXT: &str = "\
trip_id,stop_id,arrival_time,departure_time,stop_sequence
N-1,127N,08:00:00,08:00:00,1
N-1,635N,08:05:00,08:05:00,2
N-2,635S,09:00:00,09:00:00,1
1-1,127S,08:10:00,08:10:00,1
6-1,631N,08:20:00,08:20:00,1
X-1,631S,08:30:00,08:30:00,1
ghost,631N,08:40:00,08:40:00,1
";

pub fn tables() -> [(&'static str, &'static str); 4] {
    [
        (STOPS, STOPS_TXT),
        (ROUTES, ROUTES_TXT),
        (TRIPS, TRIPS_TXT),
        (STOP_TIMES, STOP_TIMES_TXT),
    ]
}

/// Writes the fixture tables as an extracted GTFS directory.
pub fn write_dir(dir: &Path) {
    for (name, contents) in tables() {
        std::fs::write(dir.join(name), contents).unwrap();
    }
}

/// The fixture tables zipped in memory.
pub fn zip_bytes() -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default();
    for (name, contents) in tables() {
        writer.start_file(name, options).unwrap();
        writer.write_all(contents.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}
