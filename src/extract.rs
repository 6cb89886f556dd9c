//! Telemetry stage: fetches pattern paths and flattens them into stop and
//! vehicle records.
//!
//! The upstream body is walked as loose JSON. A missing or oddly typed field
//! only nulls that field; it never drops the record or its siblings.

use serde_json::{Number, Value};
use tracing::{debug, info};

use crate::directory::text;
use crate::error::Error;
use crate::fetch::{HttpClient, post_json};
use crate::model::{RouteDirectory, StopRecord, VehicleRecord};

/// Records flattened from one telemetry response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Telemetry {
    pub stops: Vec<StopRecord>,
    pub vehicles: Vec<VehicleRecord>,
}

/// Posts the directory's route payload to the pattern-paths endpoint and
/// flattens the reply.
///
/// # Errors
///
/// [`Error::UpstreamUnavailable`] on transport failure or non-2xx,
/// [`Error::MalformedResponse`] when the body is not a JSON array. Nothing is
/// flattened in either case.
#[tracing::instrument(skip(client, directory), fields(routes = directory.payload.len()))]
pub async fn extract<C: HttpClient + ?Sized>(
    client: &C,
    pattern_paths_url: &str,
    directory: &RouteDirectory,
) -> Result<Telemetry, Error> {
    let body = post_json(client, pattern_paths_url, Some(directory.payload.pairs())).await?;
    let telemetry = flatten(&body, directory)?;
    info!(
        stops = telemetry.stops.len(),
        vehicles = telemetry.vehicles.len(),
        "Flattened telemetry"
    );
    Ok(telemetry)
}

/// Flattens a decoded pattern-paths body.
///
/// Emits one [`StopRecord`] per pattern point and one [`VehicleRecord`] per
/// vehicle, across every route in the body.
pub fn flatten(body: &Value, directory: &RouteDirectory) -> Result<Telemetry, Error> {
    let routes = body.as_array().ok_or_else(|| {
        Error::MalformedResponse(format!(
            "expected an array of routes, got {}",
            json_kind(body)
        ))
    })?;

    let mut telemetry = Telemetry::default();

    for route in routes {
        let route_key = route.get("routeKey").and_then(text);
        let (route_symbol, route_name) = directory.labels(route_key.as_deref());

        for pattern in items(route, "patternPaths") {
            let pattern_key = pattern.get("patternKey").and_then(text);
            let direction_key = pattern.get("directionKey").and_then(text);

            for point in items(pattern, "patternPoints") {
                let stop = point.get("stop").filter(|s| s.is_object());
                telemetry.stops.push(StopRecord {
                    route_key: route_key.clone(),
                    route_symbol: route_symbol.clone(),
                    route_name: route_name.clone(),
                    pattern_key: pattern_key.clone(),
                    direction_key: direction_key.clone(),
                    stop_name: stop.and_then(|s| s.get("name")).and_then(text),
                    stop_code: stop.and_then(|s| s.get("stopCode")).and_then(text),
                    latitude: point.get("latitude").and_then(coordinate),
                    longitude: point.get("longitude").and_then(coordinate),
                });
            }
        }

        for direction in items(route, "vehiclesByDirections") {
            let direction_key = direction.get("directionKey").and_then(text);

            for vehicle in items(direction, "vehicles") {
                let location = vehicle.get("location").filter(|l| l.is_object());
                let located = |field: &str| location.and_then(|l| l.get(field));

                telemetry.vehicles.push(VehicleRecord {
                    route_key: route_key.clone(),
                    route_symbol: route_symbol.clone(),
                    route_name: route_name.clone(),
                    direction_key: direction_key.clone(),
                    vehicle_name: vehicle.get("name").and_then(text),
                    passenger_capacity: vehicle.get("passengerCapacity").and_then(integer),
                    passengers_onboard: vehicle.get("passengersOnboard").and_then(integer),
                    amenities: amenities(vehicle),
                    last_gps_date: located("lastGpsDate").and_then(text),
                    latitude: located("latitude").and_then(number),
                    longitude: located("longitude").and_then(number),
                    speed: located("speed").and_then(number),
                    heading: located("heading").and_then(number),
                    is_extra_trip: vehicle.get("isExtraTrip").and_then(Value::as_bool),
                    scheduled_task_time: None,
                });
            }
        }

        debug!(route_key = route_key.as_deref(), "Flattened route");
    }

    Ok(telemetry)
}

/// Comma-and-space joined amenity names; empty when there are none.
fn amenities(vehicle: &Value) -> String {
    items(vehicle, "amenities")
        .iter()
        .filter_map(|a| a.get("name").and_then(text))
        .collect::<Vec<_>>()
        .join(", ")
}

/// The array under `key`, or an empty slice when absent or not an array.
fn items<'a>(value: &'a Value, key: &str) -> &'a [Value] {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Like [`number`] but keeps the JSON number as written, so `30` and `30.0`
/// stay distinguishable for identity keys.
fn coordinate(value: &Value) -> Option<Number> {
    match value {
        Value::Number(n) => Some(n.clone()),
        Value::String(s) => s.trim().parse().ok().and_then(Number::from_f64),
        _ => None,
    }
}

fn integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Short description of a JSON value's type for error messages.
pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
