//! Upsert sink: writes flattened records into the document store.
//!
//! Each record is an independent upsert. A failed write is logged and counted
//! but never stops the rest of the batch.

use futures::stream::{self, StreamExt};
use tracing::{debug, error, info};

use crate::error::Error;
use crate::identity::Document;
use crate::model::{StopRecord, UploadSummary, VehicleRecord};
use crate::store::DocumentStore;

/// Per-collection result of a batch.
#[derive(Debug, Default)]
struct BatchOutcome {
    written: usize,
    failures: Vec<Error>,
}

/// Upserts vehicles into `vehicle_data` and stops into `stop_data`, at most
/// `concurrency` writes in flight per collection.
///
/// Counts in the returned summary only include successful writes.
#[tracing::instrument(skip_all, fields(stops = stops.len(), vehicles = vehicles.len()))]
pub async fn upload<S: DocumentStore + ?Sized>(
    store: &S,
    stops: &[StopRecord],
    vehicles: &[VehicleRecord],
    concurrency: usize,
) -> UploadSummary {
    let vehicle_outcome = upsert_all(store, vehicles, concurrency).await;
    let stop_outcome = upsert_all(store, stops, concurrency).await;

    let summary = UploadSummary {
        stop_count: stop_outcome.written,
        vehicle_count: vehicle_outcome.written,
        stop_failures: stop_outcome.failures.len(),
        vehicle_failures: vehicle_outcome.failures.len(),
    };
    info!(
        stop_count = summary.stop_count,
        vehicle_count = summary.vehicle_count,
        stop_failures = summary.stop_failures,
        vehicle_failures = summary.vehicle_failures,
        "Upload complete"
    );
    summary
}

async fn upsert_all<S, D>(store: &S, records: &[D], concurrency: usize) -> BatchOutcome
where
    S: DocumentStore + ?Sized,
    D: Document + Sync,
{
    let results: Vec<Result<(), Error>> = stream::iter(records)
        .map(|record| upsert_one(store, record))
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    let mut outcome = BatchOutcome::default();
    for result in results {
        match result {
            Ok(()) => outcome.written += 1,
            Err(e) => {
                error!(error = %e, "Error upserting document");
                outcome.failures.push(e);
            }
        }
    }

    info!(
        collection = D::COLLECTION,
        written = outcome.written,
        failed = outcome.failures.len(),
        "Uploaded records"
    );
    outcome
}

async fn upsert_one<S, D>(store: &S, record: &D) -> Result<(), Error>
where
    S: DocumentStore + ?Sized,
    D: Document + Sync,
{
    let (id, document) = record.to_document().map_err(|e| Error::RecordWriteFailure {
        collection: D::COLLECTION.to_string(),
        id: record.identity_key(),
        reason: format!("failed to serialize record: {e}"),
    })?;

    match store.upsert(D::COLLECTION, &id, &document).await {
        Ok(()) => {
            debug!(collection = D::COLLECTION, id = %id, "Upserted document");
            Ok(())
        }
        Err(e) => Err(Error::RecordWriteFailure {
            collection: D::COLLECTION.to_string(),
            id,
            reason: format!("{e:#}"),
        }),
    }
}
