//! Fleet backend over its REST API.
//!
//! ## Endpoints
//!
//! - `GET  /api/ships` - ships with nested tanks
//! - `GET  /api/ships/{ship}/tanks/{tank}/live` - live multi-sensor snapshot
//! - `GET  /api/ships/{ship}/tanks/{tank}/thresholds` - threshold record
//! - `PUT  /api/ships/{ship}/acknowledge` - clear the ship's danger status
//! - `POST /api/logs?event=..&details=..` - append to the event timeline
//!
//! ## Example
//!
//! ```rust,no_run
//! use tankwatch::{FleetSource, HttpSource};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let source = HttpSource::builder()
//!         .endpoint("http://localhost:8000")
//!         .timeout(Duration::from_secs(4))
//!         .build()?;
//!
//!     for ship in source.ships().await? {
//!         println!("{}: {} tanks", ship.id, ship.tanks.len());
//!     }
//!
//!     Ok(())
//! }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use tankwatch_types::{AuditRecord, Ship, TankKey, TankLive, ThresholdRecord};

use super::FleetSource;
use crate::error::SourceError;

/// Fleet source backed by the REST API.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: Client,
    endpoint: String,
    description: String,
}

impl HttpSource {
    /// Create a new builder for configuring the source.
    pub fn builder() -> HttpSourceBuilder {
        HttpSourceBuilder::default()
    }

    /// Base URL requests are made against.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn tank_url(&self, key: &TankKey, leaf: &str) -> String {
        format!(
            "{}/api/ships/{}/tanks/{}/{}",
            self.endpoint,
            encode_segment(&key.ship_id),
            key.tank_id,
            leaf
        )
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, SourceError> {
        let response = self.client.get(url).send().await?;
        let response = check_status(response, url)?;
        response
            .json()
            .await
            .map_err(|e| SourceError::Parse(e.to_string()))
    }
}

#[async_trait]
impl FleetSource for HttpSource {
    async fn ships(&self) -> Result<Vec<Ship>, SourceError> {
        let url = format!("{}/api/ships", self.endpoint);
        self.get_json(&url).await
    }

    async fn live(&self, key: &TankKey) -> Result<TankLive, SourceError> {
        self.get_json(&self.tank_url(key, "live")).await
    }

    async fn thresholds(&self, key: &TankKey) -> Result<ThresholdRecord, SourceError> {
        self.get_json(&self.tank_url(key, "thresholds")).await
    }

    async fn acknowledge(&self, ship_id: &str) -> Result<(), SourceError> {
        let url = format!(
            "{}/api/ships/{}/acknowledge",
            self.endpoint,
            encode_segment(ship_id)
        );
        let response = self.client.put(&url).send().await?;
        check_status(response, &url)?;
        Ok(())
    }

    async fn append_log(&self, record: &AuditRecord) -> Result<(), SourceError> {
        let url = format!("{}/api/logs", self.endpoint);
        let fields = [("event", &record.event), ("details", &record.details)];
        // Older backends read query parameters, newer ones the form body
        let response = self
            .client
            .post(&url)
            .query(&fields)
            .form(&fields)
            .send()
            .await?;
        check_status(response, &url)?;
        Ok(())
    }

    fn description(&self) -> &str {
        &self.description
    }
}

fn check_status(response: Response, url: &str) -> Result<Response, SourceError> {
    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        return Err(SourceError::NotFound(url.to_string()));
    }
    if !status.is_success() {
        return Err(SourceError::Http(format!(
            "API returned status {} for {}",
            status, url
        )));
    }
    Ok(response)
}

/// Builder for HttpSource.
#[derive(Debug, Default)]
pub struct HttpSourceBuilder {
    endpoint: Option<String>,
    timeout: Option<Duration>,
}

impl HttpSourceBuilder {
    /// Set the API base URL (e.g., "http://localhost:8000").
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Set the per-request timeout (default: 4 seconds).
    ///
    /// Keep this below the poll interval so one slow tank cannot hold a
    /// scan across several ticks.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the source.
    pub fn build(self) -> Result<HttpSource, SourceError> {
        let timeout = self.timeout.unwrap_or(Duration::from_secs(4));

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SourceError::Connection(e.to_string()))?;

        let endpoint = self
            .endpoint
            .unwrap_or_else(|| "http://localhost:8000".to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(HttpSource {
            client,
            description: format!("api: {}", endpoint),
            endpoint,
        })
    }
}

// Percent-encode a string for use as a single path segment
fn encode_segment(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char)
            }
            _ => out.push_str(&format!("%{:02X}", b)),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let source = HttpSource::builder().build().unwrap();
        assert_eq!(source.endpoint(), "http://localhost:8000");
        assert_eq!(source.description(), "api: http://localhost:8000");
    }

    #[test]
    fn test_builder_trims_trailing_slash() {
        let source = HttpSource::builder()
            .endpoint("http://fleet.local:8000/")
            .build()
            .unwrap();
        assert_eq!(source.endpoint(), "http://fleet.local:8000");
    }

    #[test]
    fn test_encode_segment() {
        assert_eq!(encode_segment("MANTA"), "MANTA");
        assert_eq!(encode_segment("MT Great/Manta"), "MT%20Great%2FManta");
        assert_eq!(encode_segment("a?b#c"), "a%3Fb%23c");
    }

    #[test]
    fn test_tank_url() {
        let source = HttpSource::builder()
            .endpoint("http://fleet.local")
            .build()
            .unwrap();
        let key = TankKey::new("SEA HORSE", 7);
        assert_eq!(
            source.tank_url(&key, "live"),
            "http://fleet.local/api/ships/SEA%20HORSE/tanks/7/live"
        );
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_a_source_error() {
        let source = HttpSource::builder()
            .endpoint("http://127.0.0.1:9")
            .timeout(Duration::from_millis(200))
            .build()
            .unwrap();

        assert!(source.ships().await.is_err());
    }
}
