//! Notifications published by the alarm engine.
//!
//! Consumers subscribe through [`MonitorHandle::subscribe`](crate::MonitorHandle::subscribe)
//! and render however they like; the engine does not know who listens.

use std::fmt;

use tankwatch_types::{AuditRecord, Gas, TankKey};

use crate::engine::Stage;

/// An event on the alarm broadcast channel.
#[derive(Debug, Clone, PartialEq)]
pub enum AlarmEvent {
    /// A new incident started or the active one moved to another stage.
    IncidentChanged {
        key: TankKey,
        stage: Stage,
        title: String,
        message: String,
        remaining_secs: u64,
    },
    /// The whole-second countdown of the active stage changed.
    Countdown {
        key: TankKey,
        stage: Stage,
        remaining_secs: u64,
    },
    /// Global emergency state switched on or off.
    EmergencyActive(bool),
    /// Short transient notice for operators.
    Toast(String),
    /// The active incident was acknowledged and cleared.
    Acknowledged { key: TankKey, stage: Stage },
    /// Another tank is in danger while the active incident sits in its
    /// terminal stage. No incident is created for it.
    DangerDeferred { key: TankKey, gases: Vec<Gas> },
}

impl AlarmEvent {
    /// Timeline entry to append upstream for this event, if any.
    pub fn audit_record(&self) -> Option<AuditRecord> {
        match self {
            AlarmEvent::IncidentChanged {
                key, stage, message, ..
            } => Some(AuditRecord::for_tank(stage.audit_event(), key, message)),
            AlarmEvent::Acknowledged { key, stage } => Some(AuditRecord::for_tank(
                "acknowledge",
                key,
                format!("Alarm acknowledged at stage {}", stage),
            )),
            _ => None,
        }
    }
}

impl fmt::Display for AlarmEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlarmEvent::IncidentChanged {
                title,
                message,
                remaining_secs,
                stage,
                ..
            } => {
                if stage.is_terminal() {
                    write!(f, "[{}] {}", title, message)
                } else {
                    write!(f, "[{}] {} ({}s)", title, message, remaining_secs)
                }
            }
            AlarmEvent::Countdown {
                key,
                remaining_secs,
                ..
            } => write!(f, "{}: {}s left to acknowledge", key, remaining_secs),
            AlarmEvent::EmergencyActive(true) => f.write_str("EMERGENCY ACTIVE"),
            AlarmEvent::EmergencyActive(false) => f.write_str("Emergency cleared"),
            AlarmEvent::Toast(text) => f.write_str(text),
            AlarmEvent::Acknowledged { key, stage } => {
                write!(f, "Acknowledged {} at stage {}", key, stage)
            }
            AlarmEvent::DangerDeferred { key, gases } => {
                write!(f, "{} in danger (", key)?;
                for (i, gas) in gases.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", gas)?;
                }
                f.write_str("), deferred behind active emergency")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_changes_and_acks_are_audited() {
        let key = TankKey::new("MANTA", 3);
        let changed = AlarmEvent::IncidentChanged {
            key: key.clone(),
            stage: Stage::Escalated,
            title: "Escalation".into(),
            message: "No response.".into(),
            remaining_secs: 30,
        };
        let record = changed.audit_record().unwrap();
        assert_eq!(record.event, "Escalation");
        assert_eq!(record.details, "[ship MANTA tank 3] No response.");

        let acked = AlarmEvent::Acknowledged {
            key,
            stage: Stage::Detected,
        };
        assert_eq!(acked.audit_record().unwrap().event, "acknowledge");

        assert!(AlarmEvent::EmergencyActive(true).audit_record().is_none());
        assert!(AlarmEvent::Toast("hi".into()).audit_record().is_none());
    }

    #[test]
    fn test_display_deferred() {
        let event = AlarmEvent::DangerDeferred {
            key: TankKey::new("MANTA", 2),
            gases: vec![Gas::O2, Gas::CO],
        };
        assert_eq!(
            event.to_string(),
            "ship MANTA tank 2 in danger (O2, CO), deferred behind active emergency"
        );
    }
}
