use async_trait::async_trait;
use bus_ingest::config::Config;
use bus_ingest::error::Error;
use bus_ingest::identity::{Document, STOP_COLLECTION, VEHICLE_COLLECTION};
use bus_ingest::pipeline::run_tick;
use bus_ingest::store::{DirStore, MemoryStore};
use bus_ingest::{directory, extract, fetch::HttpClient};
use chrono::{TimeZone, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

const BASE_DATA: &str = include_str!("fixtures/base_data.json");
const PATTERN_PATHS: &str = include_str!("fixtures/pattern_paths.json");

/// Serves canned bodies by URL path and records which paths were hit.
struct Upstream {
    routes: HashMap<&'static str, (u16, &'static str)>,
    hits: Mutex<Vec<String>>,
}

impl Upstream {
    fn new(base: (u16, &'static str), paths: (u16, &'static str)) -> Self {
        Self {
            routes: HashMap::from([("/GetBaseData/", base), ("/GetPatternPaths/", paths)]),
            hits: Mutex::default(),
        }
    }

    fn hits(&self) -> Vec<String> {
        self.hits.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpClient for Upstream {
    async fn execute(&self, req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        let path = req.url().path().to_string();
        self.hits.lock().unwrap().push(path.clone());
        let (status, body) = self.routes.get(path.as_str()).copied().unwrap_or((404, ""));
        let resp = http::Response::builder().status(status).body(body).unwrap();
        Ok(reqwest::Response::from(resp))
    }
}

fn config() -> Config {
    Config {
        base_data_url: "http://upstream.test/GetBaseData/".to_string(),
        pattern_paths_url: "http://upstream.test/GetPatternPaths/".to_string(),
        upsert_concurrency: 4,
        ..Config::default()
    }
}

fn count_pattern_points(body: &Value) -> usize {
    body.as_array()
        .unwrap()
        .iter()
        .flat_map(|r| r["patternPaths"].as_array().unwrap())
        .map(|p| p["patternPoints"].as_array().unwrap().len())
        .sum()
}

fn count_vehicles(body: &Value) -> usize {
    body.as_array()
        .unwrap()
        .iter()
        .flat_map(|r| r["vehiclesByDirections"].as_array().unwrap())
        .map(|d| d["vehicles"].as_array().unwrap().len())
        .sum()
}

#[tokio::test]
async fn test_full_tick() {
    let upstream = Upstream::new((200, BASE_DATA), (200, PATTERN_PATHS));
    let store = MemoryStore::new();
    let tick = Utc.with_ymd_and_hms(2024, 9, 24, 15, 3, 0).unwrap();

    let report = run_tick(&upstream, &store, &config(), tick).await.unwrap();

    assert_eq!(report.routes, 3);
    assert_eq!(report.stops_extracted, 6);
    assert_eq!(report.vehicles_extracted, 3);
    assert_eq!(report.stops_uploaded, 6);
    assert_eq!(report.vehicles_uploaded, 3);
    assert!(!report.is_degraded());
    assert_eq!(upstream.hits(), vec!["/GetBaseData/", "/GetPatternPaths/"]);

    assert_eq!(store.count(STOP_COLLECTION), 6);
    assert_eq!(store.count(VEHICLE_COLLECTION), 3);

    for id in store.ids(VEHICLE_COLLECTION) {
        let doc = store.get(VEHICLE_COLLECTION, &id).unwrap();
        assert_eq!(doc["id"], Value::String(id.clone()));
        assert_eq!(doc["Scheduled Task Time"], "2024-09-24T15:03:00Z");
    }
}

#[tokio::test]
async fn test_record_counts_match_input() {
    let body: Value = serde_json::from_str(PATTERN_PATHS).unwrap();
    let routes = directory::parse_directory(&serde_json::from_str(BASE_DATA).unwrap()).unwrap();

    let telemetry = extract::flatten(&body, &routes).unwrap();

    assert_eq!(telemetry.stops.len(), count_pattern_points(&body));
    assert_eq!(telemetry.vehicles.len(), count_vehicles(&body));

    let ghost = telemetry
        .vehicles
        .iter()
        .find(|v| v.vehicle_name.as_deref() == Some("2210"))
        .unwrap();
    assert_eq!(ghost.route_symbol.as_deref(), Some("Unknown"));
}

#[tokio::test]
async fn test_identity_keys_are_stable_across_flattening() {
    let body: Value = serde_json::from_str(PATTERN_PATHS).unwrap();
    let routes = directory::parse_directory(&serde_json::from_str(BASE_DATA).unwrap()).unwrap();

    let first = extract::flatten(&body, &routes).unwrap();
    let second = extract::flatten(&body, &routes).unwrap();

    let keys = |t: &extract::Telemetry| {
        (
            t.stops.iter().map(Document::identity_key).collect::<Vec<_>>(),
            t.vehicles.iter().map(Document::identity_key).collect::<Vec<_>>(),
        )
    };
    assert_eq!(keys(&first), keys(&second));
}

#[tokio::test]
async fn test_repeated_ticks_dedupe_stops_and_keep_vehicle_history() {
    let store = MemoryStore::new();
    let first = Upstream::new((200, BASE_DATA), (200, PATTERN_PATHS));
    let tick = Utc.with_ymd_and_hms(2024, 9, 24, 15, 3, 0).unwrap();
    run_tick(&first, &store, &config(), tick).await.unwrap();

    let moved = PATTERN_PATHS.replace("2024-09-24T15:02:11Z", "2024-09-24T15:03:09Z");
    let moved: &'static str = Box::leak(moved.into_boxed_str());
    let second = Upstream::new((200, BASE_DATA), (200, moved));
    run_tick(&second, &store, &config(), tick + chrono::TimeDelta::minutes(1))
        .await
        .unwrap();

    assert_eq!(store.count(STOP_COLLECTION), 6);
    // 1401 has a new fix, the other two vehicles repeat their readings
    assert_eq!(store.count(VEHICLE_COLLECTION), 4);
}

#[tokio::test]
async fn test_directory_failure_skips_telemetry() {
    let upstream = Upstream::new((500, "Internal Server Error"), (200, PATTERN_PATHS));
    let store = MemoryStore::new();

    let err = run_tick(&upstream, &store, &config(), Utc::now())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::UpstreamUnavailable(_)));
    assert_eq!(upstream.hits(), vec!["/GetBaseData/"]);
    assert_eq!(store.count(STOP_COLLECTION), 0);
}

#[tokio::test]
async fn test_wrong_shape_directory_skips_telemetry() {
    for body in ["[]", r#""maintenance""#, r#"{"routes": "nope"}"#] {
        let upstream = Upstream::new((200, body), (200, PATTERN_PATHS));
        let store = MemoryStore::new();

        let err = run_tick(&upstream, &store, &config(), Utc::now())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::MalformedResponse(_)), "{body}: {err}");
        assert_eq!(upstream.hits(), vec!["/GetBaseData/"], "{body}");
        assert_eq!(store.count(STOP_COLLECTION), 0);
        assert_eq!(store.count(VEHICLE_COLLECTION), 0);
    }
}

#[tokio::test]
async fn test_malformed_telemetry_writes_nothing() {
    let upstream = Upstream::new((200, BASE_DATA), (200, "<html>Service Unavailable</html>"));
    let store = MemoryStore::new();

    let err = run_tick(&upstream, &store, &config(), Utc::now())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::MalformedResponse(_)));
    assert_eq!(store.count(STOP_COLLECTION), 0);
    assert_eq!(store.count(VEHICLE_COLLECTION), 0);
}

#[tokio::test]
async fn test_tick_into_directory_store() {
    let dir = tempfile::tempdir().unwrap();
    let store = DirStore::new(dir.path(), "bus_data");
    let upstream = Upstream::new((200, BASE_DATA), (200, PATTERN_PATHS));

    let report = run_tick(&upstream, &store, &config(), Utc::now())
        .await
        .unwrap();

    let stops = std::fs::read_dir(dir.path().join("bus_data").join("stop_data"))
        .unwrap()
        .count();
    let vehicles = std::fs::read_dir(dir.path().join("bus_data").join("vehicle_data"))
        .unwrap()
        .count();
    assert_eq!(stops, report.stops_uploaded);
    assert_eq!(vehicles, report.vehicles_uploaded);
}
