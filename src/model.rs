//! Records produced and consumed by the pipeline stages.
//!
//! Stop and vehicle records serialize with the field names stored in the
//! document database (`"Route Key"`, `"Last GPS Date"`, ...).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Number;
use std::collections::HashMap;

/// Form field name the pattern-paths endpoint expects once per route.
pub const ROUTE_KEY_FIELD: &str = "routeKeys[]";

/// Symbol and name used when a telemetry route is absent from the directory.
pub const UNKNOWN: &str = "Unknown";

/// Display metadata for one route from the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteMeta {
    pub route_key: String,
    pub route_symbol: Option<String>,
    pub route_name: Option<String>,
}

/// Ordered `(routeKeys[], key)` pairs, the form body of the telemetry call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutePayload {
    pairs: Vec<(String, String)>,
}

impl RoutePayload {
    pub fn from_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            pairs: keys
                .into_iter()
                .map(|k| (ROUTE_KEY_FIELD.to_string(), k.into()))
                .collect(),
        }
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.pairs.iter().map(|(_, k)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Output of the route directory stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteDirectory {
    pub payload: RoutePayload,
    pub routes: HashMap<String, RouteMeta>,
}

impl RouteDirectory {
    /// Resolves `(symbol, name)` for a telemetry route key. Keys missing from
    /// the directory resolve to the `"Unknown"` pair.
    pub fn labels(&self, route_key: Option<&str>) -> (Option<String>, Option<String>) {
        match route_key.and_then(|k| self.routes.get(k)) {
            Some(meta) => (meta.route_symbol.clone(), meta.route_name.clone()),
            None => (Some(UNKNOWN.to_string()), Some(UNKNOWN.to_string())),
        }
    }
}

/// One point of a route pattern, with its stop when the point is a stop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopRecord {
    #[serde(rename = "Route Key")]
    pub route_key: Option<String>,
    #[serde(rename = "Route Symbol")]
    pub route_symbol: Option<String>,
    #[serde(rename = "Route Name")]
    pub route_name: Option<String>,
    #[serde(rename = "Pattern Key")]
    pub pattern_key: Option<String>,
    #[serde(rename = "Direction Key")]
    pub direction_key: Option<String>,
    #[serde(rename = "Stop Name")]
    pub stop_name: Option<String>,
    #[serde(rename = "Stop Code")]
    pub stop_code: Option<String>,
    /// Kept as the upstream JSON number so identity keys see it as written.
    #[serde(rename = "Latitude")]
    pub latitude: Option<Number>,
    #[serde(rename = "Longitude")]
    pub longitude: Option<Number>,
}

/// A vehicle's live reading at one GPS timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleRecord {
    #[serde(rename = "Route Key")]
    pub route_key: Option<String>,
    #[serde(rename = "Route Symbol")]
    pub route_symbol: Option<String>,
    #[serde(rename = "Route Name")]
    pub route_name: Option<String>,
    #[serde(rename = "Direction Key")]
    pub direction_key: Option<String>,
    #[serde(rename = "Vehicle Name")]
    pub vehicle_name: Option<String>,
    #[serde(rename = "Passenger Capacity")]
    pub passenger_capacity: Option<i64>,
    #[serde(rename = "Passengers Onboard")]
    pub passengers_onboard: Option<i64>,
    #[serde(rename = "Amenities")]
    pub amenities: String,
    #[serde(rename = "Last GPS Date")]
    pub last_gps_date: Option<String>,
    #[serde(rename = "Latitude")]
    pub latitude: Option<f64>,
    #[serde(rename = "Longitude")]
    pub longitude: Option<f64>,
    #[serde(rename = "Speed")]
    pub speed: Option<f64>,
    #[serde(rename = "Heading")]
    pub heading: Option<f64>,
    #[serde(rename = "Is Extra Trip")]
    pub is_extra_trip: Option<bool>,
    /// Logical time of the tick that captured this reading. Set by the
    /// pipeline after extraction, never read from the upstream body.
    #[serde(rename = "Scheduled Task Time")]
    pub scheduled_task_time: Option<DateTime<Utc>>,
}

/// Successful and failed upserts per collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UploadSummary {
    pub stop_count: usize,
    pub vehicle_count: usize,
    pub stop_failures: usize,
    pub vehicle_failures: usize,
}

/// Flat per-tick report, one CSV row per tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TickReport {
    pub scheduled_task_time: DateTime<Utc>,
    pub routes: usize,
    pub stops_extracted: usize,
    pub vehicles_extracted: usize,
    pub stops_uploaded: usize,
    pub vehicles_uploaded: usize,
    pub stop_failures: usize,
    pub vehicle_failures: usize,
}

impl TickReport {
    pub fn new(
        scheduled_task_time: DateTime<Utc>,
        routes: usize,
        stops_extracted: usize,
        vehicles_extracted: usize,
        summary: &UploadSummary,
    ) -> Self {
        Self {
            scheduled_task_time,
            routes,
            stops_extracted,
            vehicles_extracted,
            stops_uploaded: summary.stop_count,
            vehicles_uploaded: summary.vehicle_count,
            stop_failures: summary.stop_failures,
            vehicle_failures: summary.vehicle_failures,
        }
    }

    /// True when some extracted record did not make it into the store.
    pub fn is_degraded(&self) -> bool {
        self.stop_failures + self.vehicle_failures > 0
    }
}
