//! Identity keys for stored documents.
//!
//! A key is the MD5 hex digest of a few record fields joined with `_`, each
//! field rendered the way the existing `bus_data` documents were keyed:
//! absent values as `None`, floats in shortest round-trip form with a
//! trailing `.0` when integral. Records sharing a key are the same document
//! and overwrite each other.

use md5::{Digest, Md5};
use serde::Serialize;
use serde_json::{Number, Value};

use crate::model::{StopRecord, VehicleRecord};

pub const STOP_COLLECTION: &str = "stop_data";
pub const VEHICLE_COLLECTION: &str = "vehicle_data";

/// Field holding the identity key in a stored document.
pub const ID_FIELD: &str = "id";

const ABSENT: &str = "None";

/// A record that can be upserted into a collection by identity key.
pub trait Document: Serialize {
    const COLLECTION: &'static str;

    /// The unhashed identity string.
    fn identity_source(&self) -> String;

    fn identity_key(&self) -> String {
        digest(&self.identity_source())
    }

    /// The record as a JSON object with its identity key under `"id"`.
    fn to_document(&self) -> serde_json::Result<(String, Value)> {
        let id = self.identity_key();
        let mut value = serde_json::to_value(self)?;
        if let Value::Object(map) = &mut value {
            map.insert(ID_FIELD.to_string(), Value::String(id.clone()));
        }
        Ok((id, value))
    }
}

impl Document for StopRecord {
    const COLLECTION: &'static str = STOP_COLLECTION;

    /// Same physical point on the same pattern of the same route.
    fn identity_source(&self) -> String {
        format!(
            "{}_{}_{}_{}",
            text_part(&self.route_key),
            text_part(&self.pattern_key),
            number_part(&self.latitude),
            number_part(&self.longitude)
        )
    }
}

impl Document for VehicleRecord {
    const COLLECTION: &'static str = VEHICLE_COLLECTION;

    /// One document per vehicle per GPS fix, so history accumulates.
    fn identity_source(&self) -> String {
        format!(
            "{}_{}",
            text_part(&self.vehicle_name),
            text_part(&self.last_gps_date)
        )
    }
}

fn text_part(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or(ABSENT)
}

/// Integers keep their digits; floats go through [`float_text`].
fn number_part(value: &Option<Number>) -> String {
    match value {
        Some(n) if n.is_f64() => n.as_f64().map_or_else(|| n.to_string(), float_text),
        Some(n) => n.to_string(),
        None => ABSENT.to_string(),
    }
}

/// Shortest round-trip text of a float: fixed notation with at least one
/// fractional digit for exponents in `-4..16`, otherwise `<mantissa>e<sign><2+ digits>`.
fn float_text(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }

    let scientific = format!("{value:e}");
    let (mantissa, exponent) = scientific.split_once('e').unwrap_or((&scientific, "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);

    if (-4..16).contains(&exponent) {
        let fixed = value.to_string();
        if fixed.contains('.') {
            fixed
        } else {
            format!("{fixed}.0")
        }
    } else {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{mantissa}e{sign}{:02}", exponent.abs())
    }
}

fn digest(source: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(source.as_bytes());
    format!("{:x}", hasher.finalize())
}
