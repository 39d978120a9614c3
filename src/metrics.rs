//! Run counters, recorded with the `metrics` facade.
//!
//! Without an installed recorder every call here is a no-op. When a
//! snapshot path is configured the binary installs a Prometheus recorder and
//! writes its text rendering once the run finishes.

use std::fs;
use std::path::Path;

use ::metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::info;

use crate::error::{EnricherError, Result};

pub const ROWS_LOADED: &str = "zip_enricher_rows_loaded_total";
pub const ROWS_FILTERED: &str = "zip_enricher_rows_filtered_total";
pub const ROWS_DROPPED: &str = "zip_enricher_rows_dropped_total";
pub const GEOCODE_SUCCESS: &str = "zip_enricher_geocode_success_total";
pub const GEOCODE_FAILURE: &str = "zip_enricher_geocode_failure_total";
pub const GEOCODE_DURATION: &str = "zip_enricher_geocode_duration_seconds";

/// Install the global Prometheus recorder.
pub fn init_recorder() -> Result<PrometheusHandle> {
    PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| EnricherError::Config(format!("Failed to install metrics recorder: {e}")))
}

pub fn write_snapshot(handle: &PrometheusHandle, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, handle.render())?;
    info!("Wrote metrics snapshot to {}", path.display());
    Ok(())
}

pub fn rows_loaded(dataset: &str, rows: usize) {
    counter!(ROWS_LOADED, "dataset" => dataset.to_string()).increment(rows as u64);
}

pub fn rows_filtered(dataset: &str, rows: usize) {
    counter!(ROWS_FILTERED, "dataset" => dataset.to_string()).increment(rows as u64);
}

pub fn rows_dropped(dataset: &str, rows: usize) {
    counter!(ROWS_DROPPED, "dataset" => dataset.to_string()).increment(rows as u64);
}

pub fn geocode_success(dataset: &str) {
    counter!(GEOCODE_SUCCESS, "dataset" => dataset.to_string()).increment(1);
}

pub fn geocode_failure(dataset: &str, class: &'static str) {
    counter!(GEOCODE_FAILURE, "dataset" => dataset.to_string(), "class" => class).increment(1);
}

pub fn geocode_duration(dataset: &str, seconds: f64) {
    histogram!(GEOCODE_DURATION, "dataset" => dataset.to_string()).record(seconds);
}
