//! The escalation state machine.
//!
//! [`Engine`] owns the single active [`Incident`] and the cooldown map. It
//! never looks at a clock itself: every operation takes `now`, and stage
//! transitions happen only when [`Engine::tick`] observes that a stored
//! deadline has passed. An acknowledged incident is gone from the engine,
//! so no later tick can advance it.
//!
//! ```text
//!            begin()            deadline            deadline
//!   Idle ─────────────▶ Detected ───────▶ Escalated ───────▶ EmergencyRaised
//!    ▲                     │                  │                    │
//!    └─────────────────────┴──── acknowledge() ┴────────────────────┘
//! ```

mod incident;

pub use incident::{Acknowledged, Incident, IncidentView, Rejected, Stage, Timings};

use std::collections::HashMap;

use tankwatch_types::{GasReadings, TankKey};
use tokio::time::Instant;

use crate::data::{TankAssessment, ThresholdSet};
use crate::events::AlarmEvent;
use incident::ceil_secs;

/// Incident and cooldown owner.
#[derive(Debug)]
pub struct Engine {
    active: Option<Incident>,
    cooldowns: HashMap<TankKey, Instant>,
    timings: Timings,
    next_incident_id: u64,
}

impl Engine {
    pub fn new(timings: Timings) -> Self {
        Self {
            active: None,
            cooldowns: HashMap::new(),
            timings,
            next_incident_id: 1,
        }
    }

    pub fn timings(&self) -> &Timings {
        &self.timings
    }

    pub fn active(&self) -> Option<&Incident> {
        self.active.as_ref()
    }

    /// True while an incident is active and still counting down.
    ///
    /// Scans are skipped while busy. Once the emergency is raised the engine
    /// is no longer busy, but it still refuses new incidents.
    pub fn is_busy(&self) -> bool {
        self.active.as_ref().is_some_and(|i| !i.stage.is_terminal())
    }

    /// True if `key` was acknowledged less than one cooldown window ago.
    pub fn suppressed(&self, key: &TankKey, now: Instant) -> bool {
        self.cooldown_left(key, now).is_some()
    }

    /// Keys still inside their cooldown window.
    pub fn suppressed_keys(&self, now: Instant) -> impl Iterator<Item = &TankKey> + '_ {
        self.cooldowns
            .keys()
            .filter(move |key| self.suppressed(key, now))
    }

    fn cooldown_left(&self, key: &TankKey, now: Instant) -> Option<u64> {
        let acked_at = self.cooldowns.get(key)?;
        let elapsed = now.saturating_duration_since(*acked_at);
        (elapsed < self.timings.cooldown).then(|| ceil_secs(self.timings.cooldown - elapsed))
    }

    /// Start an incident for `key` if the engine is idle, the pair is not in
    /// cooldown and `worst` is in danger under `thresholds`.
    pub fn begin(
        &mut self,
        key: &TankKey,
        worst: &GasReadings,
        thresholds: &ThresholdSet,
        now: Instant,
    ) -> Result<Vec<AlarmEvent>, Rejected> {
        if let Some(active) = &self.active {
            return Err(Rejected::Busy {
                active: active.key.clone(),
                stage: active.stage,
            });
        }
        if let Some(remaining_secs) = self.cooldown_left(key, now) {
            return Err(Rejected::CoolingDown {
                key: key.clone(),
                remaining_secs,
            });
        }

        let assessment = TankAssessment::new(worst, thresholds);
        if !assessment.is_danger() {
            return Err(Rejected::NotDangerous);
        }

        let window = self.timings.stage_window;
        let incident = Incident {
            id: self.next_incident_id,
            key: key.clone(),
            stage: Stage::Detected,
            deadline: Some(now + window),
            detected_at: now,
            thresholds: *thresholds,
            worst: *worst,
            danger_gases: assessment.danger_gases(),
            shown_secs: Some(ceil_secs(window)),
        };
        self.next_incident_id += 1;

        tracing::warn!(
            incident = incident.id,
            ship = %key.ship_id,
            tank = key.tank_id,
            worst = %worst,
            "danger detected"
        );

        let event = stage_event(&incident, now);
        self.active = Some(incident);
        Ok(vec![event])
    }

    /// Advance the active incident against `now`.
    ///
    /// At most one stage transition happens per call, so a host that was
    /// suspended across several windows still walks through every stage.
    pub fn tick(&mut self, now: Instant) -> Vec<AlarmEvent> {
        let window = self.timings.stage_window;
        let Some(incident) = self.active.as_mut() else {
            return Vec::new();
        };
        let Some(deadline) = incident.deadline else {
            return Vec::new();
        };

        if now < deadline {
            let remaining = ceil_secs(deadline - now);
            if incident.shown_secs == Some(remaining) {
                return Vec::new();
            }
            incident.shown_secs = Some(remaining);
            return vec![AlarmEvent::Countdown {
                key: incident.key.clone(),
                stage: incident.stage,
                remaining_secs: remaining,
            }];
        }

        let Some(next) = incident.stage.next() else {
            return Vec::new();
        };
        incident.stage = next;

        if next.is_terminal() {
            incident.deadline = None;
            incident.shown_secs = None;
            tracing::error!(
                incident = incident.id,
                ship = %incident.key.ship_id,
                tank = incident.key.tank_id,
                "emergency raised, no acknowledgment"
            );
            vec![
                stage_event(incident, now),
                AlarmEvent::EmergencyActive(true),
                AlarmEvent::Toast("🚨 Emergency auto-raised due to no acknowledgment".to_string()),
            ]
        } else {
            incident.deadline = Some(now + window);
            incident.shown_secs = Some(ceil_secs(window));
            tracing::warn!(
                incident = incident.id,
                ship = %incident.key.ship_id,
                tank = incident.key.tank_id,
                stage = %next,
                "escalated, authority notified"
            );
            vec![stage_event(incident, now)]
        }
    }

    /// Clear the active incident and start its cooldown.
    ///
    /// Returns `None` when there is nothing to acknowledge.
    pub fn acknowledge(&mut self, now: Instant) -> Option<Acknowledged> {
        let incident = self.active.take()?;
        let stage = incident.stage;
        self.cooldowns.insert(incident.key.clone(), now);

        tracing::info!(
            incident = incident.id,
            ship = %incident.key.ship_id,
            tank = incident.key.tank_id,
            stage = %stage,
            "acknowledged"
        );

        let mut events = Vec::with_capacity(2);
        if stage.is_terminal() {
            events.push(AlarmEvent::EmergencyActive(false));
        }
        events.push(AlarmEvent::Acknowledged {
            key: incident.key.clone(),
            stage,
        });

        Some(Acknowledged {
            incident,
            stage,
            events,
        })
    }

    /// Whole seconds left in the active stage.
    pub fn remaining(&self, now: Instant) -> Option<u64> {
        self.active.as_ref()?.remaining(now)
    }

    /// Forget cooldowns whose window has elapsed.
    pub fn prune_cooldowns(&mut self, now: Instant) {
        let cooldown = self.timings.cooldown;
        self.cooldowns
            .retain(|_, acked_at| now.saturating_duration_since(*acked_at) < cooldown);
    }

    pub fn cooldown_count(&self) -> usize {
        self.cooldowns.len()
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(Timings::default())
    }
}

fn stage_event(incident: &Incident, now: Instant) -> AlarmEvent {
    AlarmEvent::IncidentChanged {
        key: incident.key.clone(),
        stage: incident.stage,
        title: incident.stage.title().to_string(),
        message: incident.stage.message(&incident.key),
        remaining_secs: incident.remaining(now).unwrap_or(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tankwatch_types::Gas;

    fn danger() -> GasReadings {
        GasReadings::new().with(Gas::O2, 20.9).with(Gas::CO, 150.0)
    }

    fn started(now: Instant) -> (Engine, TankKey) {
        let mut engine = Engine::default();
        let key = TankKey::new("MANTA", 1);
        engine
            .begin(&key, &danger(), &ThresholdSet::default(), now)
            .unwrap();
        (engine, key)
    }

    fn stage_of(events: &[AlarmEvent]) -> Option<Stage> {
        events.iter().find_map(|e| match e {
            AlarmEvent::IncidentChanged { stage, .. } => Some(*stage),
            _ => None,
        })
    }

    #[test]
    fn test_begin_opens_detected_incident() {
        let t0 = Instant::now();
        let mut engine = Engine::default();
        let key = TankKey::new("MANTA", 1);

        let events = engine
            .begin(&key, &danger(), &ThresholdSet::default(), t0)
            .unwrap();

        assert_eq!(stage_of(&events), Some(Stage::Detected));
        match &events[0] {
            AlarmEvent::IncidentChanged {
                title,
                remaining_secs,
                ..
            } => {
                assert_eq!(title, "Danger Alarm");
                assert_eq!(*remaining_secs, 30);
            }
            other => panic!("unexpected event {:?}", other),
        }

        let incident = engine.active().unwrap();
        assert_eq!(incident.id, 1);
        assert_eq!(incident.danger_gases, vec![Gas::CO]);
        assert!(engine.is_busy());
    }

    #[test]
    fn test_begin_rejects_safe_readings() {
        let mut engine = Engine::default();
        let safe = GasReadings::new().with(Gas::O2, 20.9).with(Gas::CO, 80.0);
        let result = engine.begin(
            &TankKey::new("MANTA", 1),
            &safe,
            &ThresholdSet::default(),
            Instant::now(),
        );
        assert_eq!(result, Err(Rejected::NotDangerous));
        assert!(engine.active().is_none());
    }

    #[test]
    fn test_only_one_incident_at_a_time() {
        let t0 = Instant::now();
        let (mut engine, key) = started(t0);

        let other = TankKey::new("SEAHORSE", 2);
        let result = engine.begin(&other, &danger(), &ThresholdSet::default(), t0);
        assert_eq!(
            result,
            Err(Rejected::Busy {
                active: key,
                stage: Stage::Detected
            })
        );
    }

    #[test]
    fn test_escalates_at_each_deadline() {
        let t0 = Instant::now();
        let (mut engine, _) = started(t0);

        assert_eq!(stage_of(&engine.tick(t0 + Duration::from_millis(29_999))), None);

        let events = engine.tick(t0 + Duration::from_secs(30));
        assert_eq!(stage_of(&events), Some(Stage::Escalated));
        assert_eq!(engine.remaining(t0 + Duration::from_secs(30)), Some(30));

        let events = engine.tick(t0 + Duration::from_secs(60));
        assert_eq!(stage_of(&events), Some(Stage::EmergencyRaised));
        assert!(events.contains(&AlarmEvent::EmergencyActive(true)));
        assert!(events.iter().any(|e| matches!(e, AlarmEvent::Toast(_))));

        assert!(!engine.is_busy());
        assert_eq!(engine.remaining(t0 + Duration::from_secs(61)), None);
        assert!(engine.tick(t0 + Duration::from_secs(600)).is_empty());
    }

    #[test]
    fn test_late_tick_advances_one_stage_and_resets_deadline() {
        let t0 = Instant::now();
        let (mut engine, _) = started(t0);

        // Host paused for well past both windows
        let late = t0 + Duration::from_secs(95);
        let events = engine.tick(late);
        assert_eq!(stage_of(&events), Some(Stage::Escalated));
        assert_eq!(engine.remaining(late), Some(30));

        assert_eq!(
            stage_of(&engine.tick(late + Duration::from_secs(30))),
            Some(Stage::EmergencyRaised)
        );
    }

    #[test]
    fn test_countdown_emits_once_per_whole_second() {
        let t0 = Instant::now();
        let (mut engine, _) = started(t0);

        let mut shown = Vec::new();
        let mut t = t0;
        for _ in 0..12 {
            t += Duration::from_millis(250);
            for event in engine.tick(t) {
                if let AlarmEvent::Countdown { remaining_secs, .. } = event {
                    shown.push(remaining_secs);
                }
            }
        }
        // 0.25s..3.0s elapsed
        assert_eq!(shown, vec![29, 28, 27]);
    }

    #[test]
    fn test_acknowledge_cancels_pending_transitions() {
        let t0 = Instant::now();
        let (mut engine, key) = started(t0);

        let ack = engine.acknowledge(t0 + Duration::from_secs(10)).unwrap();
        assert_eq!(ack.stage, Stage::Detected);
        assert_eq!(ack.incident.key, key);
        assert_eq!(
            ack.events,
            vec![AlarmEvent::Acknowledged {
                key: key.clone(),
                stage: Stage::Detected
            }]
        );

        assert!(engine.tick(t0 + Duration::from_secs(30)).is_empty());
        assert!(engine.tick(t0 + Duration::from_secs(60)).is_empty());
        assert!(engine.active().is_none());
    }

    #[test]
    fn test_acknowledge_while_escalated_stops_emergency() {
        let t0 = Instant::now();
        let (mut engine, key) = started(t0);
        engine.tick(t0 + Duration::from_secs(30));

        let ack = engine.acknowledge(t0 + Duration::from_secs(45)).unwrap();
        assert_eq!(ack.stage, Stage::Escalated);
        assert_eq!(
            ack.events,
            vec![AlarmEvent::Acknowledged {
                key: key.clone(),
                stage: Stage::Escalated
            }]
        );

        assert!(engine.tick(t0 + Duration::from_secs(60)).is_empty());
        assert!(engine.tick(t0 + Duration::from_secs(90)).is_empty());
        assert!(engine.active().is_none());
        assert!(engine.suppressed(&key, t0 + Duration::from_secs(60)));
    }

    #[test]
    fn test_acknowledge_clears_emergency() {
        let t0 = Instant::now();
        let (mut engine, _) = started(t0);
        engine.tick(t0 + Duration::from_secs(30));
        engine.tick(t0 + Duration::from_secs(60));

        let ack = engine.acknowledge(t0 + Duration::from_secs(70)).unwrap();
        assert_eq!(ack.stage, Stage::EmergencyRaised);
        assert_eq!(ack.events[0], AlarmEvent::EmergencyActive(false));
    }

    #[test]
    fn test_acknowledge_while_idle_is_noop() {
        let mut engine = Engine::default();
        assert!(engine.acknowledge(Instant::now()).is_none());
        assert_eq!(engine.cooldown_count(), 0);
    }

    #[test]
    fn test_cooldown_suppresses_then_expires() {
        let t0 = Instant::now();
        let (mut engine, key) = started(t0);
        let acked_at = t0 + Duration::from_secs(5);
        engine.acknowledge(acked_at);

        let inside = acked_at + Duration::from_secs(119);
        assert!(engine.suppressed(&key, inside));
        assert_eq!(
            engine.begin(&key, &danger(), &ThresholdSet::default(), inside),
            Err(Rejected::CoolingDown {
                key: key.clone(),
                remaining_secs: 1
            })
        );

        // Other tanks are not affected
        let other = TankKey::new("MANTA", 2);
        assert!(!engine.suppressed(&other, inside));
        assert_eq!(engine.suppressed_keys(inside).collect::<Vec<_>>(), vec![&key]);

        let after = acked_at + Duration::from_secs(120);
        assert!(!engine.suppressed(&key, after));
        let events = engine
            .begin(&key, &danger(), &ThresholdSet::default(), after)
            .unwrap();
        assert_eq!(stage_of(&events), Some(Stage::Detected));
        assert_eq!(engine.active().unwrap().id, 2);
    }

    #[test]
    fn test_prune_drops_expired_cooldowns() {
        let t0 = Instant::now();
        let (mut engine, _) = started(t0);
        engine.acknowledge(t0);

        engine.prune_cooldowns(t0 + Duration::from_secs(60));
        assert_eq!(engine.cooldown_count(), 1);

        engine.prune_cooldowns(t0 + Duration::from_secs(120));
        assert_eq!(engine.cooldown_count(), 0);
    }

    #[test]
    fn test_incident_keeps_thresholds_it_started_with() {
        let t0 = Instant::now();
        let strict = ThresholdSet::default().with(Gas::CO, 10.0, 20.0);
        let mut engine = Engine::default();
        let key = TankKey::new("MANTA", 1);
        let worst = GasReadings::new().with(Gas::CO, 25.0);

        engine.begin(&key, &worst, &strict, t0).unwrap();
        assert_eq!(engine.active().unwrap().thresholds, strict);
    }
}
