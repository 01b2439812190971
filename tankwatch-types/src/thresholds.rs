//! Per-tank threshold records as stored by the backend.

use crate::Gas;

/// Warn/danger thresholds for one tank, as named fields.
///
/// Every field is optional: a backend may store only some overrides, and
/// older records carry six fields (no H2S). Missing fields are filled from
/// defaults when the record is resolved into a threshold set.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ThresholdRecord {
    pub warn_o2_low: Option<f64>,
    pub danger_o2_low: Option<f64>,
    pub warn_co_high: Option<f64>,
    pub danger_co_high: Option<f64>,
    pub warn_lel_high: Option<f64>,
    pub danger_lel_high: Option<f64>,
    pub warn_h2s_high: Option<f64>,
    pub danger_h2s_high: Option<f64>,
}

impl ThresholdRecord {
    /// The (warn, danger) pair recorded for a gas.
    pub fn pair(&self, gas: Gas) -> (Option<f64>, Option<f64>) {
        match gas {
            Gas::O2 => (self.warn_o2_low, self.danger_o2_low),
            Gas::CO => (self.warn_co_high, self.danger_co_high),
            Gas::LEL => (self.warn_lel_high, self.danger_lel_high),
            Gas::H2S => (self.warn_h2s_high, self.danger_h2s_high),
        }
    }

    /// Set the (warn, danger) pair for a gas.
    pub fn with_pair(mut self, gas: Gas, warn: f64, danger: f64) -> Self {
        let (w, d) = match gas {
            Gas::O2 => (&mut self.warn_o2_low, &mut self.danger_o2_low),
            Gas::CO => (&mut self.warn_co_high, &mut self.danger_co_high),
            Gas::LEL => (&mut self.warn_lel_high, &mut self.danger_lel_high),
            Gas::H2S => (&mut self.warn_h2s_high, &mut self.danger_h2s_high),
        };
        *w = Some(warn);
        *d = Some(danger);
        self
    }
}
