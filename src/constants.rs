//! Defaults shared across the crate.

/// Name of the column the enricher adds.
pub const ZIP_COLUMN: &str = "ZIP";

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

pub const GOOGLE_GEOCODE_URL: &str = "https://maps.googleapis.com/maps/api/geocode/json";
pub const DEFAULT_API_KEY_ENV: &str = "GOOGLE_MAPS_API_KEY";

// Dataset names as used on the command line
pub const WILDFIRE_DATASET: &str = "wildfire";
pub const CRIME_DATASET: &str = "crime";
