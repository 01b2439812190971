//! Threshold classification of gas values.

use std::fmt;

use tankwatch_types::{Gas, GasReadings, Polarity};

use super::thresholds::{GasBand, ThresholdSet};

/// Severity of a single gas value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Ok,
    Warn,
    Danger,
}

impl Level {
    /// Returns a short symbol for display.
    pub fn symbol(&self) -> &'static str {
        match self {
            Level::Ok => "OK",
            Level::Warn => "WARN",
            Level::Danger => "DANGER",
        }
    }
}

/// Classify a value against its warn/danger pair.
///
/// Low-is-bad: danger at or below `danger`, warn at or below `warn`.
/// High-is-bad: danger at or above `danger`, warn at or above `warn`.
pub fn classify(value: f64, warn: f64, danger: f64, polarity: Polarity) -> Level {
    match polarity {
        Polarity::LowIsBad if value <= danger => Level::Danger,
        Polarity::LowIsBad if value <= warn => Level::Warn,
        Polarity::HighIsBad if value >= danger => Level::Danger,
        Polarity::HighIsBad if value >= warn => Level::Warn,
        _ => Level::Ok,
    }
}

/// Classification that keeps "no data" distinct from "ok".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GasState {
    NoData,
    Level(Level),
}

impl GasState {
    /// Severity used for decisions: missing data cannot assert a state.
    pub fn level(self) -> Level {
        match self {
            GasState::NoData => Level::Ok,
            GasState::Level(level) => level,
        }
    }

    pub fn is_danger(self) -> bool {
        self == GasState::Level(Level::Danger)
    }
}

impl fmt::Display for GasState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GasState::NoData => f.write_str("NO DATA"),
            GasState::Level(level) => f.write_str(level.symbol()),
        }
    }
}

/// Classify an optional value against a band.
pub fn assess(value: Option<f64>, band: &GasBand) -> GasState {
    match value {
        Some(v) if v.is_finite() => {
            GasState::Level(classify(v, band.warn, band.danger, band.polarity))
        }
        _ => GasState::NoData,
    }
}

/// Per-gas classification of one tank's readings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TankAssessment {
    states: [GasState; 4],
}

impl TankAssessment {
    pub fn new(readings: &GasReadings, thresholds: &ThresholdSet) -> Self {
        let states = Gas::ALL.map(|gas| assess(readings.get(gas), &thresholds.band(gas)));
        Self { states }
    }

    pub fn state(&self, gas: Gas) -> GasState {
        self.states[gas_index(gas)]
    }

    /// The worst level across gases.
    pub fn overall(&self) -> Level {
        self.states
            .iter()
            .map(|s| s.level())
            .max()
            .unwrap_or(Level::Ok)
    }

    /// Gases currently classified as danger.
    pub fn danger_gases(&self) -> Vec<Gas> {
        Gas::ALL
            .into_iter()
            .filter(|&gas| self.state(gas).is_danger())
            .collect()
    }

    pub fn is_danger(&self) -> bool {
        self.states.iter().any(|s| s.is_danger())
    }
}

fn gas_index(gas: Gas) -> usize {
    match gas {
        Gas::O2 => 0,
        Gas::CO => 1,
        Gas::LEL => 2,
        Gas::H2S => 3,
    }
}

/// True iff any gas in `worst` classifies as danger.
pub fn is_danger(worst: &GasReadings, thresholds: &ThresholdSet) -> bool {
    TankAssessment::new(worst, thresholds).is_danger()
}
