//! # tankwatch
//!
//! Escalating gas-danger alarms for ship tanks.
//!
//! Every tank carries several gas sensors (O2, CO, LEL, H2S). `tankwatch`
//! polls their live readings, reduces each tank to its most hazardous value
//! per gas, classifies that against the tank's thresholds, and drives one
//! incident at a time through a timed escalation until a person
//! acknowledges it.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                            Monitor                               │
//! │  ┌─────────┐   ┌──────────┐   ┌──────────┐   ┌───────────────┐   │
//! │  │  scan   │──▶│   data   │──▶│  engine  │──▶│    events     │──▶ subscribers
//! │  │ (poll)  │   │(aggregate│   │ (stages, │   │ (broadcast)   │   │
//! │  └────┬────┘   │ classify)│   │ cooldown)│   └───────────────┘   │
//! │       │        └──────────┘   └────┬─────┘                       │
//! │       ▼                            ▼                             │
//! │  ┌─────────┐                 ┌──────────┐                        │
//! │  │ source  │◀────────────────│ dispatch │  acknowledge, audit    │
//! │  └─────────┘                 └──────────┘                        │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! - **[`data`]**: Aggregation ([`TankAggregate`]), classification ([`is_danger`])
//!   and per-tank thresholds ([`ThresholdStore`])
//! - **[`engine`]**: The escalation state machine ([`Engine`])
//! - **[`app`]**: The running [`Monitor`] and its [`MonitorHandle`]
//! - **[`source`]**: Backend access through the [`FleetSource`] trait
//! - **[`dispatch`]**: Best-effort outbound acknowledgements and audit records
//!
//! ## Escalation
//!
//! | Stage             | Entered when                          | Effect                         |
//! |-------------------|---------------------------------------|--------------------------------|
//! | `Detected`        | a tank's worst reading is in danger   | operator asked to acknowledge  |
//! | `Escalated`       | 30s pass without acknowledgment       | responsible authority notified |
//! | `EmergencyRaised` | another 30s pass                      | emergency state switched on    |
//!
//! Acknowledging clears the incident at any stage and suppresses the same
//! tank for two minutes. Operators can also raise and clear an emergency
//! by hand through [`MonitorHandle::raise_emergency`] and
//! [`MonitorHandle::clear_emergency`].
//!
//! ## Usage
//!
//! ```
//! use std::sync::Arc;
//! use tankwatch::{AlarmEvent, MemorySource, Monitor};
//! use tankwatch_types::{Gas, GasReadings, Ship, Tank, TankKey, TankLive};
//!
//! # tokio_test::block_on(async {
//! let source = Arc::new(MemorySource::new());
//! source.add_ship(Ship::new("MANTA").with_tank(Tank::new(1)));
//! source.set_live(
//!     &TankKey::new("MANTA", 1),
//!     TankLive::default().with_sensor("SN-G-001", GasReadings::new().with(Gas::CO, 140.0)),
//! );
//!
//! let handle = Monitor::builder(source).build().unwrap().start();
//! let mut events = handle.subscribe();
//!
//! if let Ok(AlarmEvent::IncidentChanged { title, .. }) = events.recv().await {
//!     assert_eq!(title, "Danger Alarm");
//! }
//!
//! handle.acknowledge().await;
//! handle.shutdown().await;
//! # });
//! ```

pub mod app;
pub mod data;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod events;
pub mod scan;
pub mod settings;
pub mod source;

// Re-export main types for convenience
pub use app::{AckOutcome, Monitor, MonitorBuilder, MonitorHandle, MonitorStatus};
pub use data::{is_danger, GasState, Level, TankAggregate, TankAssessment, ThresholdSet, ThresholdStore};
pub use dispatch::{Dispatcher, Outbound, RetryPolicy};
pub use engine::{Engine, Incident, IncidentView, Rejected, Stage, Timings};
pub use error::SourceError;
pub use events::AlarmEvent;
pub use settings::Settings;
pub use source::{FileSource, FleetSource, HttpSource, MemorySource};
