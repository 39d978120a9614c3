use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, instrument};

use crate::error::Result;
use crate::pipeline::DatasetReport;
use crate::table::Table;

/// Write `table` as UTF-8 comma-separated text, replacing any existing file.
///
/// Missing cells are written as empty fields and no row index column is
/// added. The write is not atomic: an interrupted run can leave a partial file.
#[instrument(skip(table, path), fields(path = %path.display(), rows = table.len()))]
pub fn write_csv(table: &Table, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(&table.headers)?;
    for row in &table.rows {
        writer.write_record(row.iter().map(|c| c.as_deref().unwrap_or("")))?;
    }
    writer.flush()?;

    debug!("Wrote {} rows", table.len());
    Ok(())
}

/// Save the run's dataset reports as pretty JSON in `output_dir`.
///
/// The file name carries the write time, so earlier reports are kept.
pub fn write_report(reports: &[DatasetReport], output_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(output_dir)?;

    let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
    let path = output_dir.join(format!("run_report_{timestamp}.json"));

    let json = serde_json::to_string_pretty(reports)?;
    fs::write(&path, json)?;
    Ok(path)
}
