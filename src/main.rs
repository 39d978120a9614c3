use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{error, warn};

use zip_enricher::config::Config;
use zip_enricher::constants::DEFAULT_CONFIG_PATH;
use zip_enricher::geocode::GoogleGeocoder;
use zip_enricher::logging;
use zip_enricher::metrics;
use zip_enricher::pipeline::enrich::Enricher;
use zip_enricher::pipeline::persist;
use zip_enricher::pipeline::{DatasetReport, Pipeline, Stage};

#[derive(Parser)]
#[command(name = "zip_enricher")]
#[command(about = "Filter wildfire and homicide datasets, add ZIP codes by reverse geocoding, sort by ZIP")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to the TOML config. Built-in defaults apply when the file is absent.
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Filter each input dataset down to its region
    Extract {
        /// Datasets to process (comma-separated). Defaults to all configured datasets
        #[arg(long)]
        datasets: Option<String>,
    },
    /// Add a ZIP column to the filtered files
    Enrich {
        #[arg(long)]
        datasets: Option<String>,
    },
    /// Sort the enriched files by ZIP
    Sort {
        #[arg(long)]
        datasets: Option<String>,
    },
    /// Run extract, enrich and sort in sequence
    Run {
        #[arg(long)]
        datasets: Option<String>,
    },
}

impl Commands {
    fn stages(&self) -> &'static [Stage] {
        match self {
            Commands::Extract { .. } => &[Stage::Extract],
            Commands::Enrich { .. } => &[Stage::Enrich],
            Commands::Sort { .. } => &[Stage::Sort],
            Commands::Run { .. } => &Stage::ALL,
        }
    }

    fn datasets(&self) -> Option<Vec<String>> {
        let list = match self {
            Commands::Extract { datasets }
            | Commands::Enrich { datasets }
            | Commands::Sort { datasets }
            | Commands::Run { datasets } => datasets.as_deref()?,
        };
        Some(list.split(',').map(|s| s.trim().to_string()).collect())
    }
}

fn print_report(report: &DatasetReport) {
    println!("\n📊 Results for {}:", report.dataset);
    if let (Some(loaded), Some(filtered)) = (report.rows_loaded, report.rows_filtered) {
        println!("   Filtered: {} of {} rows", filtered, loaded);
    }
    if let Some(dropped) = report.rows_dropped {
        println!("   Dropped (missing coordinates): {}", dropped);
    }
    if let Some(stats) = &report.enrich_stats {
        println!("   Geocoded: {} resolved, {} failed", stats.resolved, stats.failed());
        for (class, count) in &stats.failed_by_class {
            println!("     - {}: {}", class, count);
        }
    }
    if let Some(sorted) = report.rows_sorted {
        println!("   Sorted: {} rows", sorted);
    }
    for output in &report.outputs {
        println!("   Output file: {}", output.display());
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let _log_guard = logging::init_logging();

    let cli = Cli::parse();
    let config = Config::load_or_default(&cli.config)
        .with_context(|| format!("loading config from {}", cli.config.display()))?;

    let names = cli.command.datasets();
    let specs = config.select_datasets(names.as_deref())?;
    let stages = cli.command.stages();

    let metrics_handle = match &config.output.metrics_snapshot {
        Some(_) => Some(metrics::init_recorder()?),
        None => None,
    };

    let pipeline = if stages.contains(&Stage::Enrich) {
        let geocoder = GoogleGeocoder::from_config(&config.geocoder)?;
        let enricher = Enricher::new(Arc::new(geocoder))
            .with_concurrency(config.geocoder.concurrency)
            .with_progress(config.output.progress);
        Pipeline::new(enricher)
    } else {
        Pipeline::without_geocoder()
    };

    let result = pipeline.run(&specs, stages).await;

    if let (Some(handle), Some(path)) = (&metrics_handle, &config.output.metrics_snapshot) {
        if let Err(e) = metrics::write_snapshot(handle, path) {
            warn!("Failed to write metrics snapshot: {}", e);
        }
    }

    match result {
        Ok(reports) => {
            reports.iter().for_each(print_report);
            if let Some(dir) = &config.output.report_dir {
                match persist::write_report(&reports, dir) {
                    Ok(path) => println!("\n💾 Saved run report to {}", path.display()),
                    Err(e) => warn!("Failed to write run report: {}", e),
                }
            }
            println!("\n✅ Done");
            Ok(())
        }
        Err(e) => {
            error!("Pipeline failed: {}", e);
            Err(e.into())
        }
    }
}
