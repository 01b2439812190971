//! Live multi-sensor snapshots for a single tank.

use std::collections::BTreeMap;

use crate::GasReadings;

/// Sensor identifier as assigned in the sensor inventory (e.g. "SN-G-002").
pub type SensorId = String;

/// Latest readings from every sensor assigned to a tank, keyed by sensor.
pub type SensorSnapshot = BTreeMap<SensorId, GasReadings>;

/// Aggregates a backend may precompute alongside the raw sensor readings.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Aggregates {
    /// Representative values for operators.
    #[cfg_attr(feature = "serde", serde(default))]
    pub display: GasReadings,
    /// Most hazardous value per gas.
    #[cfg_attr(feature = "serde", serde(default))]
    pub worst: GasReadings,
}

/// Body of the live endpoint for one (ship, tank).
///
/// A tank with no reporting sensors yields an empty `sensors` map and
/// all-absent aggregates.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TankLive {
    /// Backend timestamp of the last update, if any.
    #[cfg_attr(feature = "serde", serde(default))]
    pub updated_at: Option<String>,

    #[cfg_attr(feature = "serde", serde(default))]
    pub sensors: SensorSnapshot,

    /// Precomputed aggregates, when the backend provides them.
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub aggregates: Option<Aggregates>,
}

impl TankLive {
    /// Add or replace one sensor's readings.
    pub fn with_sensor(mut self, id: impl Into<SensorId>, readings: GasReadings) -> Self {
        self.sensors.insert(id.into(), readings);
        self
    }

    /// Attach backend-precomputed aggregates.
    pub fn with_aggregates(mut self, aggregates: Aggregates) -> Self {
        self.aggregates = Some(aggregates);
        self
    }

    /// Number of sensors reporting anything.
    pub fn reporting_sensors(&self) -> usize {
        self.sensors.values().filter(|r| !r.is_empty()).count()
    }
}
