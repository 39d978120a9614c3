use std::collections::{BTreeMap, HashSet};
use std::pin::pin;
use std::sync::Arc;
use std::time::Instant;

use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::{debug, info, instrument, warn, Level};

use crate::constants::ZIP_COLUMN;
use crate::error::Result;
use crate::geocode::{Coordinates, GeocodeError, ReverseGeocoder};
use crate::metrics;
use crate::table::{Cell, Table};

const PROGRESS_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} rows ({per_sec}) {msg}";

/// Names of the latitude and longitude columns of a table.
#[derive(Debug, Clone, Copy)]
pub struct CoordinateColumns<'a> {
    pub lat: &'a str,
    pub lon: &'a str,
}

/// Counts from one enrichment pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EnrichStats {
    pub rows: usize,
    pub resolved: usize,
    /// Failed lookups keyed by [`GeocodeError::class`].
    pub failed_by_class: BTreeMap<&'static str, usize>,
}

impl EnrichStats {
    pub fn failed(&self) -> usize {
        self.failed_by_class.values().sum()
    }
}

#[derive(Debug, Clone)]
pub struct EnrichOutcome {
    pub table: Table,
    pub stats: EnrichStats,
}

/// Adds a ZIP column by reverse-geocoding every row.
///
/// A failed lookup only blanks that row's ZIP; it never aborts the batch.
pub struct Enricher {
    geocoder: Arc<dyn ReverseGeocoder>,
    concurrency: usize,
    show_progress: bool,
}

impl Enricher {
    pub fn new(geocoder: Arc<dyn ReverseGeocoder>) -> Self {
        Self {
            geocoder,
            concurrency: 1,
            show_progress: false,
        }
    }

    /// Allow up to `n` lookups in flight. Results are still written in row order.
    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    fn progress_bar(&self, len: u64, dataset: &str) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let bar = ProgressBar::new(len);
        let style = ProgressStyle::default_bar()
            .template(PROGRESS_TEMPLATE)
            .map(|s| s.progress_chars("#>-"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        bar.set_style(style);
        bar.set_message(dataset.to_string());
        bar
    }

    /// Look up every row of `table` and append the results as the ZIP column.
    ///
    /// Row count and row order are preserved. Only a missing coordinate column
    /// is an error; everything that goes wrong for a single row becomes a
    /// missing ZIP for that row.
    #[instrument(skip(self, table), fields(rows = table.len()))]
    pub async fn enrich(
        &self,
        dataset: &str,
        mut table: Table,
        columns: CoordinateColumns<'_>,
    ) -> Result<EnrichOutcome> {
        let lat_idx = table.column_index(columns.lat)?;
        let lon_idx = table.column_index(columns.lon)?;

        let coords: Vec<_> = table
            .rows
            .iter()
            .map(|row| Coordinates::parse(row[lat_idx].as_deref(), row[lon_idx].as_deref()))
            .collect();

        info!("Geocoding {} rows with concurrency {}", coords.len(), self.concurrency);
        let progress = self.progress_bar(coords.len() as u64, dataset);

        let geocoder = self.geocoder.as_ref();
        let mut lookups = pin!(stream::iter(coords.into_iter().enumerate())
            .map(|(row, coords)| async move {
                let started = Instant::now();
                let result = match coords {
                    Ok(coords) => geocoder.reverse_geocode(coords).await,
                    Err(e) => Err(e),
                };
                (row, result, started.elapsed())
            })
            .buffered(self.concurrency));

        let mut stats = EnrichStats::default();
        let mut failures = FailureLog::default();
        let mut zips: Vec<Cell> = Vec::with_capacity(table.len());

        while let Some((row, result, elapsed)) = lookups.next().await {
            stats.rows += 1;
            metrics::geocode_duration(dataset, elapsed.as_secs_f64());
            match result {
                Ok(zip) => {
                    stats.resolved += 1;
                    metrics::geocode_success(dataset);
                    zips.push(Some(zip));
                }
                Err(e) => {
                    *stats.failed_by_class.entry(e.class()).or_default() += 1;
                    metrics::geocode_failure(dataset, e.class());
                    failures.log(row, &e);
                    zips.push(None);
                }
            }
            progress.inc(1);
        }
        progress.finish_with_message(format!("{dataset} done"));

        table.push_column(ZIP_COLUMN, zips)?;

        info!(
            "Geocoded {} rows ({} resolved, {} failed)",
            stats.rows,
            stats.resolved,
            stats.failed()
        );
        Ok(EnrichOutcome { table, stats })
    }
}

/// Warns on the first failure of each class and logs repeats at debug.
#[derive(Debug, Default)]
struct FailureLog {
    warned: HashSet<&'static str>,
}

impl FailureLog {
    /// Log a failed row and return the level it was logged at.
    fn log(&mut self, row: usize, error: &GeocodeError) -> Level {
        let class = error.class();
        if self.warned.insert(class) {
            warn!(
                "Geocoding failed for row {} ({}): {}. Further '{}' failures are logged at debug level",
                row, class, error, class
            );
            Level::WARN
        } else {
            debug!("Geocoding failed for row {} ({}): {}", row, class, error);
            Level::DEBUG
        }
    }
}
