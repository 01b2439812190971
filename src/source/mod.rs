//! Fleet backend abstraction.
//!
//! The engine never talks to the network directly. It reads ships, live
//! tank snapshots and thresholds through the [`FleetSource`] trait, and
//! pushes acknowledgements and audit records back through it.

mod file;
mod http;
mod memory;

pub use file::{FileSource, FleetDocument, TankDocument};
pub use http::{HttpSource, HttpSourceBuilder};
pub use memory::MemorySource;

use std::fmt::Debug;

use async_trait::async_trait;
use tankwatch_types::{AuditRecord, Ship, TankKey, TankLive, ThresholdRecord};

use crate::error::SourceError;

/// Trait for reaching the fleet backend.
///
/// Implementations provide ship listings, live snapshots and thresholds
/// from different backends - the REST API, a JSON document on disk, or an
/// in-memory fleet.
///
/// # Example
///
/// ```
/// use tankwatch::{FleetSource, MemorySource};
/// use tankwatch_types::{Ship, Tank};
///
/// # tokio_test::block_on(async {
/// let source = MemorySource::new();
/// source.add_ship(Ship::new("MANTA").with_tank(Tank::new(1)));
///
/// let ships = source.ships().await.unwrap();
/// assert_eq!(ships.len(), 1);
/// # });
/// ```
#[async_trait]
pub trait FleetSource: Send + Sync + Debug {
    /// List ships with their nested tanks.
    async fn ships(&self) -> Result<Vec<Ship>, SourceError>;

    /// Latest multi-sensor snapshot for one tank.
    async fn live(&self, key: &TankKey) -> Result<TankLive, SourceError>;

    /// Threshold record for one tank.
    async fn thresholds(&self, key: &TankKey) -> Result<ThresholdRecord, SourceError>;

    /// Clear a ship's danger status upstream.
    async fn acknowledge(&self, ship_id: &str) -> Result<(), SourceError>;

    /// Append an entry to the backend's event timeline.
    async fn append_log(&self, record: &AuditRecord) -> Result<(), SourceError>;

    /// Returns a human-readable description of the source.
    fn description(&self) -> &str;
}
