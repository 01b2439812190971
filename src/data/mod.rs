//! Reading aggregation, threshold classification and threshold storage.
//!
//! This module turns raw per-sensor readings into the values the escalation
//! engine decides on.
//!
//! ## Submodules
//!
//! - [`aggregate`]: Per-tank display and worst-case summaries ([`TankAggregate`])
//! - [`classify`]: Gas classification against thresholds ([`Level`], [`is_danger`])
//! - [`duration`]: Parsing and formatting of duration strings (e.g., "30s", "2m")
//! - [`thresholds`]: Threshold sets and the per-tank [`ThresholdStore`]
//!
//! ## Data Flow
//!
//! ```text
//! TankLive (raw JSON)
//!        │
//!        ▼
//! TankAggregate::from_live()
//!        │
//!        ├──▶ display (shown to operators, never decides anything)
//!        │
//!        └──▶ worst ──▶ is_danger(worst, ThresholdStore::update(key, record))
//! ```

pub mod aggregate;
pub mod classify;
pub mod duration;
pub mod thresholds;

pub use aggregate::{aggregate, TankAggregate};
pub use classify::{assess, classify, is_danger, GasState, Level, TankAssessment};
pub use thresholds::{GasBand, ThresholdSet, ThresholdStore};
