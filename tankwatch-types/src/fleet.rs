//! Ship and tank listings, tank keys and audit records.

use std::fmt;

/// Numeric tank identifier, unique within the backend.
pub type TankId = u64;

/// A tank as listed under its ship.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Tank {
    pub id: TankId,

    /// Human name for the tank on this ship (e.g. "Cargo Tank 1").
    #[cfg_attr(feature = "serde", serde(default))]
    pub ship_specific_id: Option<String>,

    /// Sensors currently assigned to the tank.
    #[cfg_attr(feature = "serde", serde(default))]
    pub sensors: Vec<AssignedSensor>,
}

impl Tank {
    pub fn new(id: TankId) -> Self {
        Self {
            id,
            ship_specific_id: None,
            sensors: Vec::new(),
        }
    }

    /// Label for operator messages: the ship-specific name if present.
    pub fn label(&self) -> String {
        match &self.ship_specific_id {
            Some(name) => name.clone(),
            None => self.id.to_string(),
        }
    }
}

/// A sensor assignment on a tank.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AssignedSensor {
    pub sensor_id: String,
}

/// A ship with its nested tanks.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Ship {
    pub id: String,

    #[cfg_attr(feature = "serde", serde(default))]
    pub name: String,

    #[cfg_attr(feature = "serde", serde(default))]
    pub tanks: Vec<Tank>,
}

impl Ship {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            tanks: Vec::new(),
        }
    }

    pub fn with_tank(mut self, tank: Tank) -> Self {
        self.tanks.push(tank);
        self
    }

    /// Keys for every tank on this ship, in listing order.
    pub fn tank_keys(&self) -> impl Iterator<Item = TankKey> + '_ {
        self.tanks.iter().map(|t| TankKey::new(self.id.clone(), t.id))
    }
}

/// Identifies one tank on one ship.
///
/// Ordering is by ship id, then tank id. This is the order in which tanks
/// are scanned, so the lowest key wins when several tanks are in danger.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TankKey {
    pub ship_id: String,
    pub tank_id: TankId,
}

impl TankKey {
    pub fn new(ship_id: impl Into<String>, tank_id: TankId) -> Self {
        Self {
            ship_id: ship_id.into(),
            tank_id,
        }
    }
}

impl fmt::Display for TankKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ship {} tank {}", self.ship_id, self.tank_id)
    }
}

/// A fire-and-forget entry for the backend's event timeline.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AuditRecord {
    pub event: String,
    pub details: String,
}

impl AuditRecord {
    pub fn new(event: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            details: details.into(),
        }
    }

    /// Record scoped to a tank; details are prefixed so the timeline can
    /// filter by ship and tank.
    pub fn for_tank(event: impl Into<String>, key: &TankKey, details: impl AsRef<str>) -> Self {
        Self::new(event, format!("[{}] {}", key, details.as_ref()))
    }
}
