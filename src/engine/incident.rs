//! Incident records, stages and escalation timings.

use std::fmt;
use std::time::Duration;

use tankwatch_types::{Gas, GasReadings, TankKey};
use thiserror::Error;
use tokio::time::Instant;

use crate::data::ThresholdSet;

/// Phase of the escalation timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    /// Danger observed, waiting for acknowledgment.
    Detected,
    /// Authority notified, still waiting for acknowledgment.
    Escalated,
    /// Emergency declared. No timer runs in this stage.
    EmergencyRaised,
}

impl Stage {
    /// The stage entered when this one's countdown expires.
    pub fn next(self) -> Option<Stage> {
        match self {
            Stage::Detected => Some(Stage::Escalated),
            Stage::Escalated => Some(Stage::EmergencyRaised),
            Stage::EmergencyRaised => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        self == Stage::EmergencyRaised
    }

    /// Operator-facing title for the stage.
    pub fn title(self) -> &'static str {
        match self {
            Stage::Detected => "Danger Alarm",
            Stage::Escalated => "Escalation",
            Stage::EmergencyRaised => "Emergency",
        }
    }

    /// Event name used on the backend timeline.
    pub fn audit_event(self) -> &'static str {
        match self {
            Stage::Detected => "Danger",
            Stage::Escalated => "Escalation",
            Stage::EmergencyRaised => "Emergency",
        }
    }

    /// Operator-facing message for an incident on `key` in this stage.
    pub fn message(self, key: &TankKey) -> String {
        match self {
            Stage::Detected => format!(
                "Danger threshold reached on Ship {}, Tank {}. Please acknowledge.",
                key.ship_id, key.tank_id
            ),
            Stage::Escalated => format!(
                "No response. A warning has been sent to the responsible authority \
                 for Ship {}, Tank {}. Please acknowledge to stop escalation.",
                key.ship_id, key.tank_id
            ),
            Stage::EmergencyRaised => format!(
                "Emergency auto-raised for Ship {}, Tank {} due to no acknowledgment.",
                key.ship_id, key.tank_id
            ),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Detected => "detected",
            Stage::Escalated => "escalated",
            Stage::EmergencyRaised => "emergency",
        };
        f.write_str(s)
    }
}

/// Fixed windows driving escalation and suppression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    /// Time allowed in each non-terminal stage before escalating.
    pub stage_window: Duration,
    /// Suppression window after an acknowledgment.
    pub cooldown: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            stage_window: Duration::from_secs(30),
            cooldown: Duration::from_secs(120),
        }
    }
}

/// The single active incident.
#[derive(Debug, Clone, PartialEq)]
pub struct Incident {
    /// Monotonic per-engine identifier.
    pub id: u64,
    pub key: TankKey,
    pub stage: Stage,
    /// When the current stage expires. `None` in the terminal stage.
    pub deadline: Option<Instant>,
    pub detected_at: Instant,
    /// Thresholds in force when the incident began.
    pub thresholds: ThresholdSet,
    /// Worst readings that triggered the incident.
    pub worst: GasReadings,
    pub danger_gases: Vec<Gas>,
    /// Last whole-second value published for the countdown.
    pub(crate) shown_secs: Option<u64>,
}

impl Incident {
    /// Whole seconds until the deadline, rounded up and never negative.
    pub fn remaining(&self, now: Instant) -> Option<u64> {
        self.deadline.map(|deadline| ceil_secs(deadline.saturating_duration_since(now)))
    }

    /// Snapshot of the incident for status consumers.
    pub fn view(&self, now: Instant) -> IncidentView {
        IncidentView {
            id: self.id,
            key: self.key.clone(),
            stage: self.stage,
            title: self.stage.title().to_string(),
            message: self.stage.message(&self.key),
            remaining_secs: self.remaining(now),
            worst: self.worst,
            danger_gases: self.danger_gases.clone(),
        }
    }
}

pub(crate) fn ceil_secs(d: Duration) -> u64 {
    d.as_secs() + u64::from(d.subsec_nanos() > 0)
}

/// Read-only view of the active incident.
#[derive(Debug, Clone, PartialEq)]
pub struct IncidentView {
    pub id: u64,
    pub key: TankKey,
    pub stage: Stage,
    pub title: String,
    pub message: String,
    /// `None` once the emergency is raised.
    pub remaining_secs: Option<u64>,
    pub worst: GasReadings,
    pub danger_gases: Vec<Gas>,
}

impl fmt::Display for IncidentView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {} [{}] worst: {}", self.id, self.key, self.stage, self.worst)?;
        if let Some(secs) = self.remaining_secs {
            write!(f, ", {}s to acknowledge", secs)?;
        }
        Ok(())
    }
}

/// Why a danger observation did not start an incident.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejected {
    #[error("incident already active on {active} ({stage})")]
    Busy { active: TankKey, stage: Stage },

    #[error("{key} is in cooldown for another {remaining_secs}s")]
    CoolingDown { key: TankKey, remaining_secs: u64 },

    #[error("no gas is in danger")]
    NotDangerous,
}

/// Outcome of acknowledging the active incident.
#[derive(Debug, Clone, PartialEq)]
pub struct Acknowledged {
    pub incident: Incident,
    /// Stage the incident was in when acknowledged.
    pub stage: Stage,
    pub events: Vec<crate::events::AlarmEvent>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stages_advance_to_terminal() {
        assert_eq!(Stage::Detected.next(), Some(Stage::Escalated));
        assert_eq!(Stage::Escalated.next(), Some(Stage::EmergencyRaised));
        assert_eq!(Stage::EmergencyRaised.next(), None);
        assert!(Stage::EmergencyRaised.is_terminal());
        assert!(!Stage::Escalated.is_terminal());
    }

    #[test]
    fn test_messages_name_ship_and_tank() {
        let key = TankKey::new("MANTA", 4);
        assert_eq!(
            Stage::Detected.message(&key),
            "Danger threshold reached on Ship MANTA, Tank 4. Please acknowledge."
        );
        assert!(Stage::Escalated
            .message(&key)
            .contains("responsible authority for Ship MANTA, Tank 4"));
    }

    #[test]
    fn test_ceil_secs_rounds_up() {
        assert_eq!(ceil_secs(Duration::ZERO), 0);
        assert_eq!(ceil_secs(Duration::from_millis(1)), 1);
        assert_eq!(ceil_secs(Duration::from_millis(29_250)), 30);
        assert_eq!(ceil_secs(Duration::from_secs(30)), 30);
    }
}
