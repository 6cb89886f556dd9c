//! One tick of the ingest pipeline.

use chrono::{DateTime, Utc};
use tracing::info;

use crate::config::Config;
use crate::directory::fetch_route_directory;
use crate::error::Error;
use crate::extract::extract;
use crate::fetch::HttpClient;
use crate::model::{TickReport, VehicleRecord};
use crate::sink::upload;
use crate::store::DocumentStore;

/// Runs directory fetch, telemetry extraction and upload in sequence.
///
/// `scheduled_task_time` is the tick's logical time; every vehicle record is
/// stamped with it before upload.
///
/// # Errors
///
/// Any directory or telemetry failure aborts the tick before anything is
/// written. Write failures do not; they only lower the uploaded counts.
#[tracing::instrument(skip(client, store, config), fields(tick = %scheduled_task_time))]
pub async fn run_tick<C, S>(
    client: &C,
    store: &S,
    config: &Config,
    scheduled_task_time: DateTime<Utc>,
) -> Result<TickReport, Error>
where
    C: HttpClient + ?Sized,
    S: DocumentStore + ?Sized,
{
    let directory = fetch_route_directory(client, &config.base_data_url).await?;
    let mut telemetry = extract(client, &config.pattern_paths_url, &directory).await?;
    stamp_vehicles(&mut telemetry.vehicles, scheduled_task_time);

    let summary = upload(
        store,
        &telemetry.stops,
        &telemetry.vehicles,
        config.upsert_concurrency,
    )
    .await;

    let report = TickReport::new(
        scheduled_task_time,
        directory.payload.len(),
        telemetry.stops.len(),
        telemetry.vehicles.len(),
        &summary,
    );
    info!(degraded = report.is_degraded(), "Tick finished");
    Ok(report)
}

/// Binds each vehicle reading to the tick that captured it.
pub fn stamp_vehicles(vehicles: &mut [VehicleRecord], scheduled_task_time: DateTime<Utc>) {
    for vehicle in vehicles {
        vehicle.scheduled_task_time = Some(scheduled_task_time);
    }
}
