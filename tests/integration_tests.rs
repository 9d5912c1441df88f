use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use prost::Message;
use subway_snapshot::catalog::GtfsDirectory;
use subway_snapshot::client::{Client, LocalClient};
use subway_snapshot::config::EngineConfig;
use subway_snapshot::engine::FeedSource;
use subway_snapshot::gtfs_rt::translated_string::Translation;
use subway_snapshot::gtfs_rt::trip_update::{StopTimeEvent, StopTimeUpdate};
use subway_snapshot::gtfs_rt::{
    Alert, EntitySelector, FeedEntity, FeedHeader, FeedMessage, TranslatedString, TripDescriptor,
    TripUpdate,
};
use subway_snapshot::models::Coordinate;
use subway_snapshot::{Error, Result};

const NQRW: &str = "https://feeds.test/nyct%2Fgtfs-nqrw";
const ACE: &str = "https://feeds.test/nyct%2Fgtfs-ace";

fn write_gtfs(dir: &Path) {
    let tables = [
        (
            "stops.txt",
            "stop_id,stop_name,stop_lat,stop_lon,location_type,parent_station\n\
             R16,Times Sq-42 St,40.754672,-73.986754,1,\n\
             R16N,Times Sq-42 St,40.754672,-73.986754,,R16\n\
             R16S,Times Sq-42 St,40.754672,-73.986754,,R16\n\
             R17,34 St-Herald Sq,40.749567,-73.98795,1,\n\
             R17N,34 St-Herald Sq,40.749567,-73.98795,,R17\n\
             R17S,34 St-Herald Sq,40.749567,-73.98795,,R17\n",
        ),
        (
            "routes.txt",
            "route_id,route_short_name\nN,N\nQ,Q\n",
        ),
        ("trips.txt", "route_id,trip_id\nN,N-1\nQ,Q-1\n"),
        (
            "stop_times.txt",
            "trip_id,stop_id\nN-1,R16S\nN-1,R17S\nQ-1,R16N\n",
        ),
    ];
    for (name, contents) in tables {
        std::fs::write(dir.join(name), contents).unwrap();
    }
}

fn nqrw_feed() -> Vec<u8> {
    let now = Utc::now().timestamp();
    let stop_time = |stop_id: &str, time: i64| StopTimeUpdate {
        stop_id: Some(stop_id.to_string()),
        arrival: Some(StopTimeEvent {
            time: Some(time),
            ..Default::default()
        }),
        ..Default::default()
    };

    FeedMessage {
        header: FeedHeader {
            gtfs_realtime_version: "1.0".into(),
            timestamp: Some(now as u64),
            ..Default::default()
        },
        entity: vec![
            FeedEntity {
                id: "000001N".into(),
                trip_update: Some(TripUpdate {
                    trip: TripDescriptor {
                        trip_id: Some("093150_N..S".into()),
                        route_id: Some("N20241201".into()),
                        ..Default::default()
                    },
                    stop_time_update: vec![
                        stop_time("R16S", now - 120),
                        stop_time("R16S", now + 240),
                        stop_time("R17S", now + 420),
                        stop_time("R99S", now + 600),
                    ],
                    ..Default::default()
                }),
                ..Default::default()
            },
            FeedEntity {
                id: "000002Q".into(),
                trip_update: Some(TripUpdate {
                    trip: TripDescriptor {
                        route_id: Some("Q".into()),
                        ..Default::default()
                    },
                    stop_time_update: vec![stop_time("R16N", now + 60)],
                    ..Default::default()
                }),
                ..Default::default()
            },
            FeedEntity {
                id: "alert:1".into(),
                alert: Some(Alert {
                    header_text: Some(TranslatedString {
                        translation: vec![Translation {
                            text: "Southbound N trains are delayed".into(),
                            language: Some("en".into()),
                        }],
                    }),
                    informed_entity: vec![EntitySelector {
                        route_id: Some("N".into()),
                        ..Default::default()
                    }],
                    ..Default::default()
                }),
                ..Default::default()
            },
        ],
    }
    .encode_to_vec()
}

/// Serves a canned NQRW feed; every other endpoint is down.
struct CannedFeeds;

#[async_trait]
impl FeedSource for CannedFeeds {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        match url {
            NQRW => Ok(nqrw_feed()),
            _ => Err(Error::Fetch(format!("{url}: HTTP 503 Service Unavailable"))),
        }
    }
}

#[tokio::test]
async fn test_full_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    write_gtfs(dir.path());

    let config = EngineConfig::default()
        .with_feed_urls([NQRW, ACE])
        .with_realtime_interval(Duration::from_secs(3600));
    let client = LocalClient::with_feeds(
        config,
        Arc::new(GtfsDirectory::new(dir.path())),
        Arc::new(CannedFeeds),
    );
    assert!(client.wait_for_first_cycle(Duration::from_secs(10)).await);

    assert_eq!(client.routes().unwrap(), vec!["N", "Q"]);

    let n_stops = client.stops_by_route("n").unwrap();
    let names: Vec<&str> = n_stops.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["34 St-Herald Sq", "Times Sq-42 St"]);

    let times_sq = client
        .stops_by_ids(&["R16".to_string(), "unknown".to_string()])
        .unwrap()
        .remove(0);
    assert_eq!(times_sq.arrivals.south.len(), 1, "stale arrival is dropped");
    assert_eq!(times_sq.arrivals.south[0].route, "N");
    assert_eq!(times_sq.arrivals.north[0].route, "Q");
    assert_eq!(times_sq.platforms.len(), 2);

    let nearest = client
        .stops_by_location(Coordinate::new(40.749567, -73.98795), 1)
        .unwrap();
    assert_eq!(nearest[0].id, "R17");
    assert_eq!(nearest[0].arrivals.south.len(), 1);

    let advisories = client.service_advisories().unwrap();
    assert_eq!(advisories.len(), 1);
    assert_eq!(advisories[0].routes, vec!["N"]);

    assert!(client.last_realtime_update() >= client.last_static_update());

    client.close().await;
}

#[tokio::test]
async fn test_missing_catalog_serves_nothing() {
    let config = EngineConfig::default().with_feed_urls([NQRW]);
    let client = LocalClient::with_feeds(
        config,
        Arc::new(GtfsDirectory::new("/nonexistent/gtfs")),
        Arc::new(CannedFeeds),
    );

    assert!(!client.wait_for_first_cycle(Duration::from_secs(10)).await);
    assert!(matches!(client.stops_by_route("N"), Err(Error::NotFound(_))));
    assert!(client.routes().unwrap().is_empty());
    assert_eq!(client.last_static_update(), None);

    client.close().await;
}
