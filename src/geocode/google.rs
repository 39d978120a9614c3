use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, instrument};

use super::{Coordinates, GeocodeError, ReverseGeocoder};
use crate::config::GeocoderConfig;
use crate::error::Result;

/// Reverse geocoder backed by the Google Maps Geocoding API.
pub struct GoogleGeocoder {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    results: Vec<GeocodeResult>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    #[serde(default)]
    address_components: Vec<AddressComponent>,
}

#[derive(Debug, Deserialize)]
struct AddressComponent {
    long_name: String,
    #[serde(default)]
    types: Vec<String>,
}

impl GoogleGeocoder {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            base_url: base_url.into(),
            api_key: api_key.into(),
        })
    }

    /// Build from configuration, resolving the API key.
    pub fn from_config(config: &GeocoderConfig) -> Result<Self> {
        let api_key = config.resolve_api_key()?;
        Self::new(
            config.base_url.clone(),
            api_key,
            config.timeout_seconds.map(Duration::from_secs),
        )
    }

    /// Extract the postal code of the first (best) result from a raw response body.
    fn postal_code_from_body(body: &[u8]) -> std::result::Result<String, GeocodeError> {
        let response: GeocodeResponse = serde_json::from_slice(body)?;
        let message = response.error_message.unwrap_or_default();

        match response.status.as_str() {
            "OK" => response
                .results
                .first()
                .into_iter()
                .flat_map(|r| r.address_components.iter())
                .find(|c| c.types.iter().any(|t| t == "postal_code"))
                .map(|c| c.long_name.clone())
                .ok_or(GeocodeError::NoMatch),
            "ZERO_RESULTS" => Err(GeocodeError::NoMatch),
            "REQUEST_DENIED" => Err(GeocodeError::Denied(message)),
            "OVER_QUERY_LIMIT" | "OVER_DAILY_LIMIT" => Err(GeocodeError::RateLimited),
            "INVALID_REQUEST" => Err(GeocodeError::InvalidRequest),
            other => Err(GeocodeError::Service {
                status: other.to_string(),
                message,
            }),
        }
    }
}

#[async_trait]
impl ReverseGeocoder for GoogleGeocoder {
    #[instrument(skip(self, coords), fields(coords = %coords))]
    async fn reverse_geocode(&self, coords: Coordinates) -> std::result::Result<String, GeocodeError> {
        coords.validate()?;

        let response = self
            .client
            .get(&self.base_url)
            .query(&[("latlng", coords.to_string()), ("key", self.api_key.clone())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GeocodeError::HttpStatus(status.as_u16()));
        }

        let body = response.bytes().await?;
        let zip = Self::postal_code_from_body(&body)?;
        debug!("Resolved postal code {}", zip);
        Ok(zip)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    const ITHACA: &str = r#"{
        "status": "OK",
        "results": [
            {
                "address_components": [
                    {"long_name": "120", "short_name": "120", "types": ["street_number"]},
                    {"long_name": "Ithaca", "short_name": "Ithaca", "types": ["locality", "political"]},
                    {"long_name": "14850", "short_name": "14850", "types": ["postal_code"]}
                ]
            },
            {
                "address_components": [
                    {"long_name": "14853", "short_name": "14853", "types": ["postal_code"]}
                ]
            }
        ]
    }"#;

    /// Serve exactly one HTTP response and hand back the request line.
    async fn one_shot_server(status_line: &'static str, body: &'static str) -> (String, oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 1024];
            while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
            }
            let request = String::from_utf8_lossy(&buf);
            let request_line = request.lines().next().unwrap_or_default().to_string();
            let _ = tx.send(request_line);

            let response = format!(
                "{status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
        });

        (format!("http://{addr}/maps/api/geocode/json"), rx)
    }

    #[test]
    fn test_first_postal_code_wins() {
        let zip = GoogleGeocoder::postal_code_from_body(ITHACA.as_bytes()).unwrap();
        assert_eq!(zip, "14850");
    }

    #[test]
    fn test_only_the_first_result_is_consulted() {
        let body = r#"{
            "status": "OK",
            "results": [
                {"address_components": [{"long_name": "New York", "types": ["locality"]}]},
                {"address_components": [{"long_name": "10001", "types": ["postal_code"]}]}
            ]
        }"#;
        let err = GoogleGeocoder::postal_code_from_body(body.as_bytes()).unwrap_err();
        assert_eq!(err.class(), "no_match");
    }

    #[test]
    fn test_status_mapping() {
        let cases = [
            (r#"{"status":"ZERO_RESULTS","results":[]}"#, "no_match"),
            (r#"{"status":"REQUEST_DENIED","error_message":"The provided API key is invalid."}"#, "denied"),
            (r#"{"status":"OVER_QUERY_LIMIT"}"#, "rate_limited"),
            (r#"{"status":"INVALID_REQUEST"}"#, "invalid_request"),
            (r#"{"status":"UNKNOWN_ERROR"}"#, "service"),
            (r#"{"status":"OK","results":[{"address_components":[]}]}"#, "no_match"),
            ("<html>not json</html>", "malformed"),
        ];
        for (body, class) in cases {
            let err = GoogleGeocoder::postal_code_from_body(body.as_bytes()).unwrap_err();
            assert_eq!(err.class(), class, "body: {body}");
        }
    }

    #[tokio::test]
    async fn test_lookup_sends_coordinates_and_key() {
        let (url, request_line) = one_shot_server("HTTP/1.1 200 OK", ITHACA).await;
        let geocoder = GoogleGeocoder::new(url, "test-key", Some(Duration::from_secs(5))).unwrap();

        let zip = geocoder
            .reverse_geocode(Coordinates::new(42.0, -76.0))
            .await
            .unwrap();
        assert_eq!(zip, "14850");

        let request_line = request_line.await.unwrap();
        assert!(request_line.starts_with("GET /maps/api/geocode/json?"));
        assert!(request_line.contains("latlng=42%2C-76"));
        assert!(request_line.contains("key=test-key"));
    }

    #[tokio::test]
    async fn test_http_error_status_is_reported() {
        let (url, _rx) = one_shot_server("HTTP/1.1 503 Service Unavailable", "{}").await;
        let geocoder = GoogleGeocoder::new(url, "test-key", Some(Duration::from_secs(5))).unwrap();

        let err = geocoder
            .reverse_geocode(Coordinates::new(42.0, -76.0))
            .await
            .unwrap_err();
        assert!(matches!(err, GeocodeError::HttpStatus(503)));
    }

    #[tokio::test]
    async fn test_invalid_coordinates_skip_the_network() {
        let geocoder = GoogleGeocoder::new("http://127.0.0.1:1/", "k", None).unwrap();
        let err = geocoder
            .reverse_geocode(Coordinates::new(123.0, 0.0))
            .await
            .unwrap_err();
        assert_eq!(err.class(), "invalid_coordinates");
    }

    #[tokio::test]
    async fn test_unreachable_service_is_a_transport_error() {
        let geocoder = GoogleGeocoder::new("http://127.0.0.1:1/", "k", Some(Duration::from_secs(5))).unwrap();
        let err = geocoder
            .reverse_geocode(Coordinates::new(42.0, -76.0))
            .await
            .unwrap_err();
        assert_eq!(err.class(), "http");
    }
}
