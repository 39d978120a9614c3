//! Staged processing of one dataset.
//!
//! ```text
//!  input.csv ── load ─ filter ──────────────────────────▶ filtered_output
//!  filtered_output ── load ─ drop missing coords ─ enrich ▶ enriched_output
//!  enriched_output ── load ─ coerce + sort by ZIP ────────▶ sorted_output
//! ```
//!
//! Each stage reads the file the previous one wrote, so any stage can be
//! rerun on its own.

pub mod enrich;
pub mod filter;
pub mod load;
pub mod persist;
pub mod sort;

use std::path::PathBuf;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, instrument};

use crate::config::DatasetSpec;
use crate::constants::ZIP_COLUMN;
use crate::error::{EnricherError, Result};
use crate::metrics;
use enrich::{CoordinateColumns, EnrichStats, Enricher};
use load::TextEncoding;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Extract,
    Enrich,
    Sort,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::Extract, Stage::Enrich, Stage::Sort];
}

/// What happened to one dataset during a run.
#[derive(Debug, Clone, Serialize)]
pub struct DatasetReport {
    pub dataset: String,
    pub started_at: DateTime<Utc>,
    pub duration_secs: f64,
    pub rows_loaded: Option<usize>,
    pub rows_filtered: Option<usize>,
    pub rows_dropped: Option<usize>,
    pub enrich_stats: Option<EnrichStats>,
    pub rows_sorted: Option<usize>,
    pub outputs: Vec<PathBuf>,
}

impl DatasetReport {
    pub(crate) fn new(dataset: &str) -> Self {
        Self {
            dataset: dataset.to_string(),
            started_at: Utc::now(),
            duration_secs: 0.0,
            rows_loaded: None,
            rows_filtered: None,
            rows_dropped: None,
            enrich_stats: None,
            rows_sorted: None,
            outputs: Vec::new(),
        }
    }
}

pub struct Pipeline {
    enricher: Option<Enricher>,
}

impl Pipeline {
    /// A pipeline that can run the enrich stage with `enricher`.
    pub fn new(enricher: Enricher) -> Self {
        Self {
            enricher: Some(enricher),
        }
    }

    /// A pipeline for the stages that need no geocoder.
    pub fn without_geocoder() -> Self {
        Self { enricher: None }
    }

    /// Load the raw input, keep rows matching the filter, write them out.
    #[instrument(skip(spec, report), fields(dataset = %spec.name))]
    fn extract(spec: &DatasetSpec, report: &mut DatasetReport) -> Result<()> {
        info!("📥 Loading {}", spec.input.display());
        let table = load::load_csv(&spec.input, spec.encoding)?;
        metrics::rows_loaded(&spec.name, table.len());

        let filtered = filter::filter_eq(&table, &spec.filter_column, &spec.filter_value)?;
        metrics::rows_filtered(&spec.name, filtered.len());
        info!(
            "Kept {} of {} rows where {} == {:?}",
            filtered.len(),
            table.len(),
            spec.filter_column,
            spec.filter_value
        );

        persist::write_csv(&filtered, &spec.filtered_output)?;
        info!("💾 Saved filtered rows to {}", spec.filtered_output.display());

        report.rows_loaded = Some(table.len());
        report.rows_filtered = Some(filtered.len());
        report.outputs.push(spec.filtered_output.clone());
        Ok(())
    }

    /// Re-read the filtered file, drop rows without coordinates, add ZIPs.
    #[instrument(skip(self, spec, report), fields(dataset = %spec.name))]
    async fn enrich(&self, spec: &DatasetSpec, report: &mut DatasetReport) -> Result<()> {
        let enricher = self.enricher.as_ref().ok_or_else(|| {
            EnricherError::Config("The enrich stage needs a configured geocoder".to_string())
        })?;

        let mut table = load::load_csv(&spec.filtered_output, TextEncoding::Utf8)?;
        let dropped = filter::drop_missing(&mut table, &[spec.lat_column.as_str(), spec.lon_column.as_str()])?;
        metrics::rows_dropped(&spec.name, dropped);
        if dropped > 0 {
            info!("Dropped {} rows with missing coordinates", dropped);
        }

        info!("⏳ Geocoding {} rows...", table.len());
        let columns = CoordinateColumns {
            lat: &spec.lat_column,
            lon: &spec.lon_column,
        };
        let outcome = enricher.enrich(&spec.name, table, columns).await?;

        persist::write_csv(&outcome.table, &spec.enriched_output)?;
        info!("💾 Saved enriched rows to {}", spec.enriched_output.display());

        report.rows_dropped = Some(dropped);
        report.enrich_stats = Some(outcome.stats);
        report.outputs.push(spec.enriched_output.clone());
        Ok(())
    }

    /// Re-read the enriched file and sort it by numeric ZIP.
    #[instrument(skip(spec, report), fields(dataset = %spec.name))]
    fn sort(spec: &DatasetSpec, report: &mut DatasetReport) -> Result<()> {
        let table = load::load_csv(&spec.enriched_output, TextEncoding::Utf8)?;
        let sorted = sort::sort_by_numeric(table, ZIP_COLUMN)?;

        persist::write_csv(&sorted, &spec.sorted_output)?;
        info!(
            "💾 Saved {} rows sorted by {} to {}",
            sorted.len(),
            ZIP_COLUMN,
            spec.sorted_output.display()
        );

        report.rows_sorted = Some(sorted.len());
        report.outputs.push(spec.sorted_output.clone());
        Ok(())
    }

    /// Run `stages` for one dataset, in pipeline order.
    #[instrument(skip(self, spec, stages), fields(dataset = %spec.name))]
    pub async fn run_dataset(&self, spec: &DatasetSpec, stages: &[Stage]) -> Result<DatasetReport> {
        info!("🚀 Starting pipeline for {}", spec.name);
        let started = Instant::now();
        let mut report = DatasetReport::new(&spec.name);

        for stage in Stage::ALL.iter().filter(|s| stages.contains(*s)) {
            match stage {
                Stage::Extract => Self::extract(spec, &mut report)?,
                Stage::Enrich => self.enrich(spec, &mut report).await?,
                Stage::Sort => Self::sort(spec, &mut report)?,
            }
        }

        report.duration_secs = started.elapsed().as_secs_f64();
        info!("✅ Pipeline finished for {} in {:.1}s", spec.name, report.duration_secs);
        Ok(report)
    }

    /// Run `stages` for each dataset in turn, stopping at the first fatal error.
    pub async fn run(&self, specs: &[DatasetSpec], stages: &[Stage]) -> Result<Vec<DatasetReport>> {
        let mut reports = Vec::with_capacity(specs.len());
        for spec in specs {
            reports.push(self.run_dataset(spec, stages).await?);
        }
        Ok(reports)
    }
}
