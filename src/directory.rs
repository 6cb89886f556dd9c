//! Route directory stage: resolves the current route keys and their labels.

use std::collections::HashMap;

use serde_json::Value;
use tracing::{debug, info};

use crate::error::Error;
use crate::extract::json_kind;
use crate::fetch::{HttpClient, post_json};
use crate::model::{RouteDirectory, RouteMeta, RoutePayload};

/// Fetches the base-data endpoint and builds the route directory.
///
/// # Errors
///
/// Fails when the endpoint is unreachable, answers non-2xx, or returns a body
/// that is not a JSON directory. No partial directory is ever returned.
#[tracing::instrument(skip(client))]
pub async fn fetch_route_directory<C: HttpClient + ?Sized>(
    client: &C,
    base_data_url: &str,
) -> Result<RouteDirectory, Error> {
    let body = post_json(client, base_data_url, None).await?;
    info!("Fetched route directory");

    let directory = parse_directory(&body)?;
    info!(routes = directory.payload.len(), "Prepared route payload");
    Ok(directory)
}

/// Builds a [`RouteDirectory`] from a decoded base-data body.
///
/// Routes without a usable key are skipped. A key seen twice keeps its first
/// entry so it appears once in both the payload and the mapping. An object
/// with no `routes` field is an empty directory.
///
/// # Errors
///
/// [`Error::MalformedResponse`] when the body is not an object or its
/// `routes` field is not an array.
pub fn parse_directory(body: &Value) -> Result<RouteDirectory, Error> {
    let Some(fields) = body.as_object() else {
        return Err(Error::MalformedResponse(format!(
            "expected a base data object, got {}",
            json_kind(body)
        )));
    };
    let entries = match fields.get("routes") {
        None => {
            debug!("Base data has no routes field");
            return Ok(RouteDirectory::default());
        }
        Some(Value::Array(entries)) => entries,
        Some(other) => {
            return Err(Error::MalformedResponse(format!(
                "expected routes to be an array, got {}",
                json_kind(other)
            )));
        }
    };

    let mut keys = Vec::with_capacity(entries.len());
    let mut routes = HashMap::with_capacity(entries.len());

    for entry in entries {
        let Some(route_key) = entry.get("key").and_then(text).filter(|k| !k.is_empty()) else {
            debug!("Skipping route entry without a key");
            continue;
        };
        if routes.contains_key(&route_key) {
            debug!(route_key = %route_key, "Skipping duplicate route key");
            continue;
        }

        let meta = RouteMeta {
            route_key: route_key.clone(),
            route_symbol: entry.get("shortName").and_then(text),
            route_name: entry.get("name").and_then(text),
        };
        debug!(
            route_key = %route_key,
            short_name = meta.route_symbol.as_deref(),
            name = meta.route_name.as_deref(),
            "Added route key"
        );
        keys.push(route_key.clone());
        routes.insert(route_key, meta);
    }

    Ok(RouteDirectory {
        payload: RoutePayload::from_keys(keys),
        routes,
    })
}

/// Reads a JSON scalar as text; numbers are rendered, everything else is
/// treated as absent.
pub(crate) fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
