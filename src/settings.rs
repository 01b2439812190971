//! Runtime settings.
//!
//! Settings are layered: built-in defaults, then an optional config file
//! (TOML, YAML or JSON, picked by extension), then environment variables.
//! The binary applies command-line overrides last.
//!
//! ```toml
//! [api]
//! endpoint = "http://localhost:8000"
//! timeout = "4s"
//!
//! [poll]
//! interval = "5s"
//! countdown_tick = "250ms"
//!
//! [escalation]
//! stage_window = "30s"
//! cooldown = "2m"
//!
//! [dispatch]
//! queue_capacity = 64
//! max_attempts = 3
//! initial_backoff = "500ms"
//! max_backoff = "5s"
//!
//! [thresholds]
//! danger_co_high = 100
//!
//! [events]
//! capacity = 256
//! ```
//!
//! Environment variables use the `TANKWATCH` prefix with `__` between
//! sections, e.g. `TANKWATCH__ESCALATION__COOLDOWN=90s`.

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use tankwatch_types::ThresholdRecord;

use crate::data::ThresholdSet;
use crate::dispatch::RetryPolicy;
use crate::engine::Timings;

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "TANKWATCH";

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub api: ApiSettings,
    pub poll: PollSettings,
    pub escalation: EscalationSettings,
    pub dispatch: DispatchSettings,
    /// Defaults for any threshold field a tank's record leaves out.
    pub thresholds: ThresholdRecord,
    pub events: EventSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    pub endpoint: String,
    #[serde(with = "duration_str")]
    pub timeout: Duration,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8000".to_string(),
            timeout: Duration::from_secs(4),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollSettings {
    /// How often the fleet is scanned for danger.
    #[serde(with = "duration_str")]
    pub interval: Duration,
    /// How often the active countdown is re-evaluated.
    #[serde(with = "duration_str")]
    pub countdown_tick: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            countdown_tick: Duration::from_millis(250),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EscalationSettings {
    #[serde(with = "duration_str")]
    pub stage_window: Duration,
    #[serde(with = "duration_str")]
    pub cooldown: Duration,
}

impl Default for EscalationSettings {
    fn default() -> Self {
        let timings = Timings::default();
        Self {
            stage_window: timings.stage_window,
            cooldown: timings.cooldown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchSettings {
    pub queue_capacity: usize,
    pub max_attempts: u32,
    #[serde(with = "duration_str")]
    pub initial_backoff: Duration,
    #[serde(with = "duration_str")]
    pub max_backoff: Duration,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            queue_capacity: 64,
            max_attempts: policy.max_attempts,
            initial_backoff: policy.initial_backoff,
            max_backoff: policy.max_backoff,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventSettings {
    /// Broadcast buffer; slow subscribers lose the oldest events.
    pub capacity: usize,
}

impl Default for EventSettings {
    fn default() -> Self {
        Self { capacity: 256 }
    }
}

impl Settings {
    /// Load defaults, then `path` if given, then `TANKWATCH__*` variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_prefix(path, ENV_PREFIX)
    }

    fn load_with_prefix(path: Option<&Path>, prefix: &str) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        builder = builder.add_source(
            Environment::with_prefix(prefix)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let settings: Settings = builder
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Invalid configuration")?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject values the runtime cannot work with.
    pub fn validate(&self) -> Result<()> {
        let non_zero = [
            ("poll.interval", self.poll.interval),
            ("poll.countdown_tick", self.poll.countdown_tick),
            ("escalation.stage_window", self.escalation.stage_window),
            ("api.timeout", self.api.timeout),
        ];
        for (key, value) in non_zero {
            if value.is_zero() {
                bail!("{} must be greater than zero", key);
            }
        }
        if self.dispatch.queue_capacity == 0 {
            bail!("dispatch.queue_capacity must be greater than zero");
        }
        if self.events.capacity == 0 {
            bail!("events.capacity must be greater than zero");
        }
        if self.dispatch.max_backoff < self.dispatch.initial_backoff {
            bail!("dispatch.max_backoff must not be below dispatch.initial_backoff");
        }
        Ok(())
    }

    pub fn timings(&self) -> Timings {
        Timings {
            stage_window: self.escalation.stage_window,
            cooldown: self.escalation.cooldown,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.dispatch.max_attempts,
            initial_backoff: self.dispatch.initial_backoff,
            max_backoff: self.dispatch.max_backoff,
        }
    }

    /// Fallback thresholds with configured overrides applied.
    pub fn threshold_defaults(&self) -> ThresholdSet {
        ThresholdSet::resolve(&self.thresholds, &ThresholdSet::default())
    }
}

/// Durations as human strings ("250ms", "5s", "2m").
mod duration_str {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    use crate::data::duration::{format_duration, parse_duration};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format_duration(*d))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let s = String::deserialize(d)?;
        parse_duration(&s).map_err(serde::de::Error::custom)
    }
}
