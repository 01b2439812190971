//! One pass over the fleet looking for a tank in danger.

use std::collections::HashSet;

use tankwatch_types::{Gas, TankKey};

use crate::data::{TankAggregate, TankAssessment, ThresholdSet, ThresholdStore};
use crate::source::FleetSource;

/// A tank found in danger.
#[derive(Debug, Clone, PartialEq)]
pub struct Finding {
    pub key: TankKey,
    pub aggregate: TankAggregate,
    pub thresholds: ThresholdSet,
    pub danger_gases: Vec<Gas>,
}

/// Result of a scan.
#[derive(Debug, Clone)]
pub struct ScanReport {
    /// First tank in danger, in scan order.
    pub finding: Option<Finding>,
    /// Tanks evaluated.
    pub checked: usize,
    /// Tanks whose fetch failed and were skipped.
    pub failed: usize,
    /// True if the ship listing itself could not be fetched.
    pub listing_failed: bool,
    /// Threshold cache with this scan's fetches applied.
    pub store: ThresholdStore,
}

/// Scan ships by id, then tanks by id, stopping at the first danger.
///
/// Tanks in `skip` are not fetched. A failed fetch skips only that tank.
pub async fn scan(
    source: &dyn FleetSource,
    skip: &HashSet<TankKey>,
    mut store: ThresholdStore,
) -> ScanReport {
    let mut report = ScanReport {
        finding: None,
        checked: 0,
        failed: 0,
        listing_failed: false,
        store: ThresholdStore::default(),
    };

    let ships = match source.ships().await {
        Ok(ships) => ships,
        Err(e) => {
            tracing::warn!(source = source.description(), error = %e, "failed to list ships");
            report.listing_failed = true;
            report.store = store;
            return report;
        }
    };

    let mut keys: Vec<TankKey> = ships.iter().flat_map(|s| s.tank_keys()).collect();
    keys.sort();
    keys.dedup();

    let listed: HashSet<&TankKey> = keys.iter().collect();
    store.retain(|key| listed.contains(key));

    for key in &keys {
        if skip.contains(key) {
            tracing::trace!(ship = %key.ship_id, tank = key.tank_id, "skipped");
            continue;
        }

        let (live, record) = tokio::join!(source.live(key), source.thresholds(key));
        let (live, record) = match (live, record) {
            (Ok(live), Ok(record)) => (live, record),
            (Err(e), _) | (_, Err(e)) => {
                tracing::debug!(ship = %key.ship_id, tank = key.tank_id, error = %e, "fetch failed, skipping tank");
                report.failed += 1;
                continue;
            }
        };

        let thresholds = store.update(key, &record);
        let aggregate = TankAggregate::from_live(&live);
        let assessment = TankAssessment::new(&aggregate.worst, &thresholds);
        report.checked += 1;

        if assessment.is_danger() {
            report.finding = Some(Finding {
                key: key.clone(),
                aggregate,
                thresholds,
                danger_gases: assessment.danger_gases(),
            });
            break;
        }
    }

    report.store = store;
    report
}
