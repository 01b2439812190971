//! Per-tank aggregation of multi-sensor readings.
//!
//! Two summaries are produced for every tank. `display` is the typical value
//! operators see; `worst` is the most hazardous single value per gas and is
//! the only input escalation decisions may use, so that averaging can never
//! hide one failing sensor.

use tankwatch_types::{Gas, GasReadings, SensorSnapshot, TankLive};

/// Display and worst-case summaries for one tank.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TankAggregate {
    /// Mean of reporting sensors, per gas.
    pub display: GasReadings,
    /// Minimum (low-is-bad) or maximum (high-is-bad) across reporting sensors.
    pub worst: GasReadings,
}

impl TankAggregate {
    /// Aggregate a live snapshot.
    ///
    /// The worst value is recomputed from the raw sensors and merged with
    /// any backend-provided worst value, keeping the more hazardous of the
    /// two per gas. Backend display values are preferred when present.
    pub fn from_live(live: &TankLive) -> Self {
        let computed = aggregate(&live.sensors);
        let Some(provided) = &live.aggregates else {
            return computed;
        };

        let mut merged = computed;
        for gas in Gas::ALL {
            let polarity = gas.polarity();
            merged.worst.set(
                gas,
                polarity.worse_of(computed.worst.get(gas), usable(provided.worst.get(gas))),
            );
            if let Some(v) = usable(provided.display.get(gas)) {
                merged.display.set(gas, Some(v));
            }
        }
        merged
    }
}

/// Aggregate the readings of every sensor assigned to a tank.
///
/// A gas no sensor reports is absent in both summaries. Non-finite values
/// are treated as not reported.
pub fn aggregate(sensors: &SensorSnapshot) -> TankAggregate {
    let mut result = TankAggregate::default();

    for gas in Gas::ALL {
        let polarity = gas.polarity();
        let mut worst: Option<f64> = None;
        let mut sum = 0.0;
        let mut count = 0usize;

        for value in sensors.values().filter_map(|r| usable(r.get(gas))) {
            worst = polarity.worse_of(worst, Some(value));
            sum += value;
            count += 1;
        }

        result.worst.set(gas, worst);
        result.display.set(gas, (count > 0).then(|| sum / count as f64));
    }

    result
}

fn usable(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}
