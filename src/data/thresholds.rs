//! Per-tank threshold sets and the store that caches them between polls.

use std::collections::HashMap;

use tankwatch_types::{Gas, Polarity, TankKey, ThresholdRecord};

/// Warn/danger pair for one gas, with the gas's polarity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GasBand {
    pub warn: f64,
    pub danger: f64,
    pub polarity: Polarity,
}

/// Thresholds for every gas on one tank.
///
/// A set is resolved once per poll. The active incident keeps its own copy,
/// so later threshold edits never affect an incident already escalating.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdSet {
    o2: GasBand,
    co: GasBand,
    lel: GasBand,
    h2s: GasBand,
}

impl Default for ThresholdSet {
    fn default() -> Self {
        Self {
            o2: GasBand {
                warn: 19.5,
                danger: 18.0,
                polarity: Polarity::LowIsBad,
            },
            co: GasBand {
                warn: 35.0,
                danger: 100.0,
                polarity: Polarity::HighIsBad,
            },
            lel: GasBand {
                warn: 5.0,
                danger: 10.0,
                polarity: Polarity::HighIsBad,
            },
            h2s: GasBand {
                warn: 10.0,
                danger: 15.0,
                polarity: Polarity::HighIsBad,
            },
        }
    }
}

impl ThresholdSet {
    /// Resolve a backend record, filling absent fields from `defaults`.
    pub fn resolve(record: &ThresholdRecord, defaults: &ThresholdSet) -> Self {
        let mut set = *defaults;
        for gas in Gas::ALL {
            let fallback = defaults.band(gas);
            let (warn, danger) = record.pair(gas);
            set.set_band(
                gas,
                GasBand {
                    warn: warn.unwrap_or(fallback.warn),
                    danger: danger.unwrap_or(fallback.danger),
                    polarity: gas.polarity(),
                },
            );
        }
        set
    }

    pub fn band(&self, gas: Gas) -> GasBand {
        match gas {
            Gas::O2 => self.o2,
            Gas::CO => self.co,
            Gas::LEL => self.lel,
            Gas::H2S => self.h2s,
        }
    }

    fn set_band(&mut self, gas: Gas, band: GasBand) {
        match gas {
            Gas::O2 => self.o2 = band,
            Gas::CO => self.co = band,
            Gas::LEL => self.lel = band,
            Gas::H2S => self.h2s = band,
        }
    }

    /// Override one gas's pair, keeping its polarity.
    pub fn with(mut self, gas: Gas, warn: f64, danger: f64) -> Self {
        self.set_band(
            gas,
            GasBand {
                warn,
                danger,
                polarity: gas.polarity(),
            },
        );
        self
    }

    /// The set as a fully-populated backend record.
    pub fn to_record(&self) -> ThresholdRecord {
        Gas::ALL.iter().fold(ThresholdRecord::default(), |record, &gas| {
            let band = self.band(gas);
            record.with_pair(gas, band.warn, band.danger)
        })
    }
}

/// Last known thresholds per tank.
///
/// Thresholds may change between polls; `update` replaces the cached set.
/// Fields a record leaves out are filled from the store's defaults.
#[derive(Debug, Clone, Default)]
pub struct ThresholdStore {
    defaults: ThresholdSet,
    sets: HashMap<TankKey, ThresholdSet>,
}

impl ThresholdStore {
    pub fn new(defaults: ThresholdSet) -> Self {
        Self {
            defaults,
            sets: HashMap::new(),
        }
    }

    /// Resolve and cache a freshly fetched record, returning the resolved set.
    pub fn update(&mut self, key: &TankKey, record: &ThresholdRecord) -> ThresholdSet {
        let set = ThresholdSet::resolve(record, &self.defaults);
        self.sets.insert(key.clone(), set);
        set
    }

    /// Drop cached sets for tanks no longer listed.
    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&TankKey) -> bool,
    {
        self.sets.retain(|key, _| keep(key));
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_fills_missing_fields_from_defaults() {
        let record = ThresholdRecord::default().with_pair(Gas::CO, 50.0, 120.0);
        let set = ThresholdSet::resolve(&record, &ThresholdSet::default());

        assert_eq!(set.band(Gas::CO).warn, 50.0);
        assert_eq!(set.band(Gas::CO).danger, 120.0);
        assert_eq!(set.band(Gas::O2).danger, 18.0);
        assert_eq!(set.band(Gas::H2S).danger, 15.0);
        assert_eq!(set.band(Gas::O2).polarity, Polarity::LowIsBad);
    }

    #[test]
    fn test_store_resolves_against_its_defaults() {
        let defaults = ThresholdSet::default().with(Gas::CO, 20.0, 40.0);
        let mut store = ThresholdStore::new(defaults);
        let key = TankKey::new("MANTA", 1);
        assert!(store.is_empty());

        let record = ThresholdRecord::default().with_pair(Gas::LEL, 2.0, 4.0);
        let set = store.update(&key, &record);
        assert_eq!(set.band(Gas::LEL).danger, 4.0);
        assert_eq!(set.band(Gas::CO).danger, 40.0);
        assert_eq!(store.len(), 1);

        store.retain(|k| k.ship_id != "MANTA");
        assert!(store.is_empty());
    }

    #[test]
    fn test_to_record_round_trips_through_resolve() {
        let set = ThresholdSet::default().with(Gas::H2S, 4.0, 8.0);
        let resolved = ThresholdSet::resolve(&set.to_record(), &ThresholdSet::default());
        assert_eq!(resolved, set);
    }
}
