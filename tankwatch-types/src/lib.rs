//! # tankwatch-types
//!
//! Core types for tank gas monitoring. This crate defines the data that flows
//! between a fleet backend (ship and tank listings, live multi-sensor
//! snapshots, per-tank thresholds) and the tankwatch alarm engine.
//!
//! ## Design Goals
//!
//! - **Zero required dependencies**: Core types work without any serialization framework
//! - **Optional serialization**: Enable the `serde` feature to read the backend's JSON
//! - **Absent is not zero**: A gas with no reporting sensor is `None`, never `0.0`
//!
//! ## Features
//!
//! - `serde`: JSON serialization via serde, matching the backend's wire names
//!
//! ## Example
//!
//! ```rust
//! use tankwatch_types::{Gas, GasReadings, Polarity};
//!
//! let readings = GasReadings::new().with(Gas::O2, 20.9).with(Gas::CO, 12.0);
//!
//! assert_eq!(readings.get(Gas::O2), Some(20.9));
//! assert_eq!(readings.get(Gas::LEL), None);
//! assert_eq!(Gas::O2.polarity(), Polarity::LowIsBad);
//! ```

mod fleet;
mod gas;
mod live;
mod thresholds;

pub use fleet::*;
pub use gas::*;
pub use live::*;
pub use thresholds::*;
