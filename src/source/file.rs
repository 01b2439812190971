//! File-based fleet source.
//!
//! Reads the whole fleet from a JSON document. Useful for drills and for
//! replaying a captured backend state without the API.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tankwatch_types::{AuditRecord, Ship, TankId, TankKey, TankLive, ThresholdRecord};

use super::FleetSource;
use crate::error::SourceError;

/// Fleet state as stored on disk.
///
/// ```json
/// {
///   "ships": [{ "id": "MANTA", "tanks": [{ "id": 1 }] }],
///   "tanks": [{
///     "ship_id": "MANTA",
///     "tank_id": 1,
///     "live": { "sensors": { "SN-G-001": { "O2": 20.9, "CO": 3 } } },
///     "thresholds": { "danger_co_high": 80 }
///   }]
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FleetDocument {
    #[serde(default)]
    pub ships: Vec<Ship>,
    #[serde(default)]
    pub tanks: Vec<TankDocument>,
}

/// Live snapshot and thresholds for one tank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TankDocument {
    pub ship_id: String,
    pub tank_id: TankId,
    #[serde(default)]
    pub live: TankLive,
    #[serde(default)]
    pub thresholds: ThresholdRecord,
}

impl FleetDocument {
    fn tank(&self, key: &TankKey) -> Option<&TankDocument> {
        self.tanks
            .iter()
            .find(|t| t.ship_id == key.ship_id && t.tank_id == key.tank_id)
    }
}

/// A fleet source that reads a [`FleetDocument`] from a JSON file.
///
/// The file is re-read only when its modification time changes, so edits
/// made while the monitor is running are picked up on the next poll.
/// Acknowledgements and audit records have nowhere to go and are logged.
#[derive(Debug)]
pub struct FileSource {
    path: PathBuf,
    description: String,
    cache: Mutex<Option<(Option<SystemTime>, FleetDocument)>>,
}

impl FileSource {
    /// Create a new file source for the given path.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let description = format!("file: {}", path.display());
        Self {
            path,
            description,
            cache: Mutex::new(None),
        }
    }

    /// Returns the path being read.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn document(&self) -> Result<FleetDocument, SourceError> {
        let modified = tokio::fs::metadata(&self.path)
            .await?
            .modified()
            .ok();

        if let Some((cached_at, doc)) = self.cache.lock().as_ref() {
            if modified.is_some() && *cached_at == modified {
                return Ok(doc.clone());
            }
        }

        let content = tokio::fs::read_to_string(&self.path).await?;
        let doc: FleetDocument = serde_json::from_str(&content)?;
        *self.cache.lock() = Some((modified, doc.clone()));
        Ok(doc)
    }
}

#[async_trait]
impl FleetSource for FileSource {
    async fn ships(&self) -> Result<Vec<Ship>, SourceError> {
        Ok(self.document().await?.ships)
    }

    async fn live(&self, key: &TankKey) -> Result<TankLive, SourceError> {
        self.document()
            .await?
            .tank(key)
            .map(|t| t.live.clone())
            .ok_or_else(|| SourceError::NotFound(key.to_string()))
    }

    async fn thresholds(&self, key: &TankKey) -> Result<ThresholdRecord, SourceError> {
        // A tank without an entry uses defaults for every gas
        Ok(self
            .document()
            .await?
            .tank(key)
            .map(|t| t.thresholds)
            .unwrap_or_default())
    }

    async fn acknowledge(&self, ship_id: &str) -> Result<(), SourceError> {
        tracing::info!(ship_id, "acknowledge (file source, not forwarded)");
        Ok(())
    }

    async fn append_log(&self, record: &AuditRecord) -> Result<(), SourceError> {
        tracing::info!(event = %record.event, details = %record.details, "audit");
        Ok(())
    }

    fn description(&self) -> &str {
        &self.description
    }
}
