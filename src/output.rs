//! Reporting for finished ticks.
//!
//! Supports pretty-printing, JSON logging, and CSV append.

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::model::TickReport;
use csv::WriterBuilder;
use std::fs::OpenOptions;
use std::path::Path;

/// Logs a tick report using Rust's debug pretty-print format.
pub fn print_pretty(report: &TickReport) {
    debug!("{:#?}", report);
}

/// Logs a tick report as a single JSON line, at `warn` when records were lost.
pub fn print_json(report: &TickReport) -> Result<()> {
    let line = serde_json::to_string(report)?;
    if report.is_degraded() {
        warn!(report = %line, "Tick degraded");
    } else {
        info!(report = %line, "Tick report");
    }
    Ok(())
}

/// Appends a [`TickReport`] as a row to a CSV file.
///
/// Creates the file with headers if it does not already exist.
pub fn append_record(path: &str, report: &TickReport) -> Result<()> {
    let file_exists = Path::new(path).exists();
    debug!(path, file_exists, "Appending CSV record");

    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let file = OpenOptions::new().append(true).create(true).open(path)?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists)
        .from_writer(file);

    writer.serialize(report)?;
    writer.flush()?;

    Ok(())
}
