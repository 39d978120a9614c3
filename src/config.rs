use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::constants::{
    CRIME_DATASET, DEFAULT_API_KEY_ENV, GOOGLE_GEOCODE_URL, WILDFIRE_DATASET,
};
use crate::error::{EnricherError, Result};
use crate::pipeline::load::TextEncoding;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub geocoder: GeocoderConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default = "default_datasets")]
    pub datasets: Vec<DatasetSpec>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeocoderConfig {
    pub base_url: String,
    /// Inline credential. Takes precedence over `api_key_env`.
    pub api_key: Option<String>,
    pub api_key_env: String,
    /// Per-request timeout. Unset means the HTTP client default.
    pub timeout_seconds: Option<u64>,
    /// Lookups allowed in flight at once.
    pub concurrency: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub progress: bool,
    /// Write a Prometheus text snapshot of the run counters here.
    pub metrics_snapshot: Option<PathBuf>,
    /// Directory for timestamped JSON run reports.
    pub report_dir: Option<PathBuf>,
}

/// One input dataset and the files each stage writes for it.
#[derive(Debug, Clone, Deserialize)]
pub struct DatasetSpec {
    pub name: String,
    pub input: PathBuf,
    #[serde(default)]
    pub encoding: TextEncoding,
    pub filter_column: String,
    pub filter_value: String,
    pub lat_column: String,
    pub lon_column: String,
    pub filtered_output: PathBuf,
    pub enriched_output: PathBuf,
    pub sorted_output: PathBuf,
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            base_url: GOOGLE_GEOCODE_URL.to_string(),
            api_key: None,
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            timeout_seconds: None,
            concurrency: 1,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            progress: true,
            metrics_snapshot: None,
            report_dir: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            geocoder: GeocoderConfig::default(),
            output: OutputConfig::default(),
            datasets: default_datasets(),
        }
    }
}

fn default_datasets() -> Vec<DatasetSpec> {
    vec![
        DatasetSpec {
            name: WILDFIRE_DATASET.to_string(),
            input: "datasets/FW_Veg_Rem_Combined.csv".into(),
            encoding: TextEncoding::Utf8,
            filter_column: "state".to_string(),
            filter_value: "NY".to_string(),
            lat_column: "latitude".to_string(),
            lon_column: "longitude".to_string(),
            filtered_output: "datasets/NY_wildfire.csv".into(),
            enriched_output: "new_data/wildfire_with_zip.csv".into(),
            sorted_output: "new_data/wildfire_sorted_by_zip.csv".into(),
        },
        DatasetSpec {
            name: CRIME_DATASET.to_string(),
            input: "datasets/homicide-data.csv".into(),
            encoding: TextEncoding::Latin1,
            filter_column: "city".to_string(),
            filter_value: "New York".to_string(),
            lat_column: "lat".to_string(),
            lon_column: "lon".to_string(),
            filtered_output: "datasets/ny_crime.csv".into(),
            enriched_output: "new_data/crime_with_zip.csv".into(),
            sorted_output: "new_data/crime_sorted_by_zip.csv".into(),
        },
    ]
}

impl Config {
    /// Load and validate a TOML config file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            EnricherError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml(&content)
    }

    /// Load `path` if it exists, otherwise fall back to the built-in defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.datasets.is_empty() {
            return Err(EnricherError::Config("No datasets configured".to_string()));
        }
        if self.geocoder.concurrency == 0 {
            return Err(EnricherError::Config(
                "geocoder.concurrency must be at least 1".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for dataset in &self.datasets {
            if !seen.insert(dataset.name.as_str()) {
                return Err(EnricherError::Config(format!(
                    "Duplicate dataset name '{}'",
                    dataset.name
                )));
            }
        }
        Ok(())
    }

    /// Datasets to run, in config order. `None` selects all of them.
    pub fn select_datasets(&self, names: Option<&[String]>) -> Result<Vec<DatasetSpec>> {
        let Some(names) = names else {
            return Ok(self.datasets.clone());
        };

        if let Some(unknown) = names
            .iter()
            .find(|n| !self.datasets.iter().any(|d| &d.name == *n))
        {
            return Err(EnricherError::Config(format!("Unknown dataset '{unknown}'")));
        }

        Ok(self
            .datasets
            .iter()
            .filter(|d| names.contains(&d.name))
            .cloned()
            .collect())
    }
}

impl GeocoderConfig {
    /// The credential from config, else from the named environment variable.
    pub fn resolve_api_key(&self) -> Result<String> {
        if let Some(key) = self.api_key.as_deref().filter(|k| !k.trim().is_empty()) {
            return Ok(key.to_string());
        }
        match std::env::var(&self.api_key_env) {
            Ok(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(EnricherError::Config(format!(
                "No geocoder API key: set geocoder.api_key or the {} environment variable",
                self.api_key_env
            ))),
        }
    }
}
