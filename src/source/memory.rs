//! In-memory fleet source.
//!
//! Holds the fleet in process memory. The monitor's tests drive it by
//! changing live readings between polls and by injecting failures.

use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::Mutex;
use tankwatch_types::{AuditRecord, Ship, TankKey, TankLive, ThresholdRecord};

use super::FleetSource;
use crate::error::SourceError;

#[derive(Debug, Default)]
struct Fleet {
    ships: BTreeMap<String, Ship>,
    live: HashMap<TankKey, TankLive>,
    thresholds: HashMap<TankKey, ThresholdRecord>,
    failing_tanks: HashSet<TankKey>,
    ships_failing: bool,
    acknowledgements: Vec<String>,
    audit_log: Vec<AuditRecord>,
}

/// A fleet source held in memory.
///
/// Cloning is not supported; share it behind an `Arc`.
///
/// # Example
///
/// ```
/// use tankwatch::{FleetSource, MemorySource};
/// use tankwatch_types::{Gas, GasReadings, Ship, Tank, TankKey, TankLive};
///
/// # tokio_test::block_on(async {
/// let source = MemorySource::new();
/// source.add_ship(Ship::new("MANTA").with_tank(Tank::new(1)));
///
/// let key = TankKey::new("MANTA", 1);
/// source.set_live(&key, TankLive::default().with_sensor(
///     "SN-G-001",
///     GasReadings::new().with(Gas::CO, 12.0),
/// ));
///
/// let live = source.live(&key).await.unwrap();
/// assert_eq!(live.sensors.len(), 1);
/// # });
/// ```
#[derive(Debug, Default)]
pub struct MemorySource {
    fleet: Mutex<Fleet>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a ship.
    pub fn add_ship(&self, ship: Ship) {
        self.fleet.lock().ships.insert(ship.id.clone(), ship);
    }

    /// Replace the live snapshot for a tank.
    pub fn set_live(&self, key: &TankKey, live: TankLive) {
        self.fleet.lock().live.insert(key.clone(), live);
    }

    /// Replace the threshold record for a tank.
    pub fn set_thresholds(&self, key: &TankKey, record: ThresholdRecord) {
        self.fleet.lock().thresholds.insert(key.clone(), record);
    }

    /// Make live and threshold fetches for a tank fail (or succeed again).
    pub fn fail_tank(&self, key: &TankKey, failing: bool) {
        let mut fleet = self.fleet.lock();
        if failing {
            fleet.failing_tanks.insert(key.clone());
        } else {
            fleet.failing_tanks.remove(key);
        }
    }

    /// Make the ship listing fail (or succeed again).
    pub fn fail_ships(&self, failing: bool) {
        self.fleet.lock().ships_failing = failing;
    }

    /// Ship ids acknowledged so far, in call order.
    pub fn acknowledgements(&self) -> Vec<String> {
        self.fleet.lock().acknowledgements.clone()
    }

    /// Audit records appended so far, in call order.
    pub fn audit_log(&self) -> Vec<AuditRecord> {
        self.fleet.lock().audit_log.clone()
    }

    fn check_tank(fleet: &Fleet, key: &TankKey) -> Result<(), SourceError> {
        if fleet.failing_tanks.contains(key) {
            return Err(SourceError::Unavailable(key.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl FleetSource for MemorySource {
    async fn ships(&self) -> Result<Vec<Ship>, SourceError> {
        let fleet = self.fleet.lock();
        if fleet.ships_failing {
            return Err(SourceError::Unavailable("ship listing".to_string()));
        }
        Ok(fleet.ships.values().cloned().collect())
    }

    async fn live(&self, key: &TankKey) -> Result<TankLive, SourceError> {
        let fleet = self.fleet.lock();
        Self::check_tank(&fleet, key)?;
        Ok(fleet.live.get(key).cloned().unwrap_or_default())
    }

    async fn thresholds(&self, key: &TankKey) -> Result<ThresholdRecord, SourceError> {
        let fleet = self.fleet.lock();
        Self::check_tank(&fleet, key)?;
        Ok(fleet.thresholds.get(key).copied().unwrap_or_default())
    }

    async fn acknowledge(&self, ship_id: &str) -> Result<(), SourceError> {
        self.fleet.lock().acknowledgements.push(ship_id.to_string());
        Ok(())
    }

    async fn append_log(&self, record: &AuditRecord) -> Result<(), SourceError> {
        self.fleet.lock().audit_log.push(record.clone());
        Ok(())
    }

    fn description(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tankwatch_types::Tank;

    #[tokio::test]
    async fn test_ships_are_listed_in_id_order() {
        let source = MemorySource::new();
        source.add_ship(Ship::new("SEAHORSE").with_tank(Tank::new(1)));
        source.add_ship(Ship::new("MANTA").with_tank(Tank::new(3)));

        let ids: Vec<_> = source
            .ships()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, vec!["MANTA", "SEAHORSE"]);
    }

    #[tokio::test]
    async fn test_unknown_tank_reads_as_no_sensors() {
        let source = MemorySource::new();
        let key = TankKey::new("MANTA", 9);

        let live = source.live(&key).await.unwrap();
        assert!(live.sensors.is_empty());
        assert_eq!(
            source.thresholds(&key).await.unwrap(),
            ThresholdRecord::default()
        );
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let source = MemorySource::new();
        let key = TankKey::new("MANTA", 1);

        source.fail_tank(&key, true);
        assert!(source.live(&key).await.is_err());
        assert!(source.thresholds(&key).await.is_err());

        source.fail_tank(&key, false);
        assert!(source.live(&key).await.is_ok());

        source.fail_ships(true);
        assert!(matches!(
            source.ships().await,
            Err(SourceError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_records_acks_and_audit() {
        let source = MemorySource::new();
        source.acknowledge("MANTA").await.unwrap();
        source
            .append_log(&AuditRecord::new("Danger", "[ship MANTA tank 1] CO=140"))
            .await
            .unwrap();

        assert_eq!(source.acknowledgements(), vec!["MANTA"]);
        assert_eq!(source.audit_log()[0].event, "Danger");
    }
}
