//! Gases, polarity and per-gas readings.

use std::fmt;

/// A monitored gas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Gas {
    /// Oxygen, percent by volume.
    O2,
    /// Carbon monoxide, ppm.
    CO,
    /// Lower explosive limit, percent.
    LEL,
    /// Hydrogen sulphide.
    H2S,
}

impl Gas {
    /// Every gas, in reporting order.
    pub const ALL: [Gas; 4] = [Gas::O2, Gas::CO, Gas::LEL, Gas::H2S];

    /// Which direction of travel is hazardous for this gas.
    pub fn polarity(self) -> Polarity {
        match self {
            Gas::O2 => Polarity::LowIsBad,
            Gas::CO | Gas::LEL | Gas::H2S => Polarity::HighIsBad,
        }
    }

    /// Name used on the wire and in operator messages.
    pub fn name(self) -> &'static str {
        match self {
            Gas::O2 => "O2",
            Gas::CO => "CO",
            Gas::LEL => "LEL",
            Gas::H2S => "H2S",
        }
    }
}

impl fmt::Display for Gas {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Whether a gas is hazardous when its value is too low or too high.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Polarity {
    /// Hazardous below a threshold (oxygen depletion).
    LowIsBad,
    /// Hazardous above a threshold (toxic or flammable gases).
    HighIsBad,
}

impl Polarity {
    /// Returns true if `a` is more hazardous than `b` under this polarity.
    pub fn is_worse(self, a: f64, b: f64) -> bool {
        match self {
            Polarity::LowIsBad => a < b,
            Polarity::HighIsBad => a > b,
        }
    }

    /// Pick the more hazardous of two optional values.
    ///
    /// An absent value never wins over a present one.
    pub fn worse_of(self, a: Option<f64>, b: Option<f64>) -> Option<f64> {
        match (a, b) {
            (Some(a), Some(b)) => Some(if self.is_worse(b, a) { b } else { a }),
            (a, None) => a,
            (None, b) => b,
        }
    }
}

/// One value per gas, each of which may be absent.
///
/// Absent means "no data": no sensor reported the gas. It is never
/// coerced to zero.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GasReadings {
    #[cfg_attr(feature = "serde", serde(rename = "O2", default))]
    pub o2: Option<f64>,
    #[cfg_attr(feature = "serde", serde(rename = "CO", default))]
    pub co: Option<f64>,
    #[cfg_attr(feature = "serde", serde(rename = "LEL", default))]
    pub lel: Option<f64>,
    #[cfg_attr(feature = "serde", serde(rename = "H2S", default))]
    pub h2s: Option<f64>,
}

impl GasReadings {
    /// Readings with every gas absent.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter.
    pub fn with(mut self, gas: Gas, value: f64) -> Self {
        self.set(gas, Some(value));
        self
    }

    pub fn get(&self, gas: Gas) -> Option<f64> {
        match gas {
            Gas::O2 => self.o2,
            Gas::CO => self.co,
            Gas::LEL => self.lel,
            Gas::H2S => self.h2s,
        }
    }

    pub fn set(&mut self, gas: Gas, value: Option<f64>) {
        let slot = match gas {
            Gas::O2 => &mut self.o2,
            Gas::CO => &mut self.co,
            Gas::LEL => &mut self.lel,
            Gas::H2S => &mut self.h2s,
        };
        *slot = value;
    }

    /// Iterate over every gas with its (possibly absent) value.
    pub fn iter(&self) -> impl Iterator<Item = (Gas, Option<f64>)> + '_ {
        Gas::ALL.into_iter().map(move |gas| (gas, self.get(gas)))
    }

    /// True if no gas has a value.
    pub fn is_empty(&self) -> bool {
        self.iter().all(|(_, v)| v.is_none())
    }
}

impl fmt::Display for GasReadings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (gas, value) in self.iter() {
            if !first {
                f.write_str(", ")?;
            }
            first = false;
            match value {
                Some(v) => write!(f, "{}={}", gas, v)?,
                None => write!(f, "{}=-", gas)?,
            }
        }
        Ok(())
    }
}
