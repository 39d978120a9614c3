//! Reverse geocoding: coordinates in, postal code out.
//!
//! Lookups return a typed [`GeocodeError`] so callers can tell failure classes
//! apart for logging, even though the enrichment output only records "missing".

pub mod google;

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

pub use google::GoogleGeocoder;

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Parse from the raw text of two table cells.
    pub fn parse(lat: Option<&str>, lon: Option<&str>) -> Result<Self, GeocodeError> {
        let parse = |v: Option<&str>| {
            v.and_then(|s| s.trim().parse::<f64>().ok())
                .ok_or(GeocodeError::InvalidCoordinates)
        };
        let coords = Self::new(parse(lat)?, parse(lon)?);
        coords.validate()?;
        Ok(coords)
    }

    pub fn validate(&self) -> Result<(), GeocodeError> {
        let in_range = self.lat.is_finite()
            && self.lon.is_finite()
            && self.lat.abs() <= 90.0
            && self.lon.abs() <= 180.0;
        if in_range {
            Ok(())
        } else {
            Err(GeocodeError::InvalidCoordinates)
        }
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.lat, self.lon)
    }
}

#[derive(Error, Debug)]
pub enum GeocodeError {
    #[error("coordinates are missing, unparseable or out of range")]
    InvalidCoordinates,

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("service responded with HTTP status {0}")]
    HttpStatus(u16),

    #[error("response body is not valid geocoding JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("request denied: {0}")]
    Denied(String),

    #[error("quota or rate limit exceeded")]
    RateLimited,

    #[error("service rejected the request as invalid")]
    InvalidRequest,

    #[error("no postal code found for these coordinates")]
    NoMatch,

    #[error("service returned status {status}: {message}")]
    Service { status: String, message: String },
}

impl GeocodeError {
    /// Stable short label for grouping failures in logs and metrics.
    pub fn class(&self) -> &'static str {
        match self {
            GeocodeError::InvalidCoordinates => "invalid_coordinates",
            GeocodeError::Http(_) => "http",
            GeocodeError::HttpStatus(_) => "http_status",
            GeocodeError::Malformed(_) => "malformed",
            GeocodeError::Denied(_) => "denied",
            GeocodeError::RateLimited => "rate_limited",
            GeocodeError::InvalidRequest => "invalid_request",
            GeocodeError::NoMatch => "no_match",
            GeocodeError::Service { .. } => "service",
        }
    }
}

/// Capability to turn coordinates into a postal code.
///
/// One call is one lookup; implementations do not cache or retry.
#[async_trait]
pub trait ReverseGeocoder: Send + Sync {
    async fn reverse_geocode(&self, coords: Coordinates) -> Result<String, GeocodeError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_coordinates() {
        let coords = Coordinates::parse(Some("42.0"), Some(" -76.0 ")).unwrap();
        assert_eq!(coords, Coordinates::new(42.0, -76.0));
        assert_eq!(coords.to_string(), "42,-76");
    }

    #[test]
    fn test_rejects_bad_coordinates() {
        for (lat, lon) in [
            (None, Some("-76.0")),
            (Some("north"), Some("-76.0")),
            (Some("91.0"), Some("0")),
            (Some("0"), Some("-180.5")),
            (Some("NaN"), Some("0")),
        ] {
            let err = Coordinates::parse(lat, lon).unwrap_err();
            assert_eq!(err.class(), "invalid_coordinates");
        }
    }
}
