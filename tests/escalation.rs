//! End-to-end escalation against an in-memory fleet, on paused time.

use std::sync::Arc;
use std::time::Duration;

use tankwatch::{AlarmEvent, MemorySource, Monitor, MonitorHandle, Stage};
use tankwatch_types::{Gas, GasReadings, Ship, Tank, TankKey, TankLive};
use tokio::sync::broadcast;
use tokio::time::sleep;

fn live(gas: Gas, value: f64) -> TankLive {
    TankLive::default()
        .with_sensor("SN-G-001", GasReadings::new().with(Gas::O2, 20.9))
        .with_sensor("SN-G-002", GasReadings::new().with(gas, value))
}

fn fleet(tanks: u64) -> Arc<MemorySource> {
    let source = Arc::new(MemorySource::new());
    let mut ship = Ship::new("MANTA");
    for id in 1..=tanks {
        ship = ship.with_tank(Tank::new(id));
    }
    source.add_ship(ship);
    source
}

fn start(source: &Arc<MemorySource>) -> (MonitorHandle, broadcast::Receiver<AlarmEvent>) {
    let handle = Monitor::builder(source.clone()).build().unwrap().start();
    let events = handle.subscribe();
    (handle, events)
}

fn drain(events: &mut broadcast::Receiver<AlarmEvent>) -> Vec<AlarmEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

fn stages(events: &[AlarmEvent]) -> Vec<(TankKey, Stage)> {
    events
        .iter()
        .filter_map(|e| match e {
            AlarmEvent::IncidentChanged { key, stage, .. } => Some((key.clone(), *stage)),
            _ => None,
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_unacknowledged_danger_escalates_to_emergency() {
    let source = fleet(1);
    let key = TankKey::new("MANTA", 1);
    source.set_live(&key, live(Gas::CO, 120.0));
    let (handle, mut events) = start(&source);

    sleep(Duration::from_millis(100)).await;
    assert_eq!(stages(&drain(&mut events)), vec![(key.clone(), Stage::Detected)]);

    sleep(Duration::from_millis(29_800)).await;
    assert!(stages(&drain(&mut events)).is_empty());

    sleep(Duration::from_millis(200)).await;
    assert_eq!(stages(&drain(&mut events)), vec![(key.clone(), Stage::Escalated)]);

    sleep(Duration::from_secs(30)).await;
    let seen = drain(&mut events);
    assert_eq!(stages(&seen), vec![(key.clone(), Stage::EmergencyRaised)]);
    assert!(seen.contains(&AlarmEvent::EmergencyActive(true)));
    assert!(handle.status().emergency_active);

    // Terminal stage stays put until acknowledged
    sleep(Duration::from_secs(120)).await;
    assert!(stages(&drain(&mut events)).is_empty());

    let ack = handle.acknowledge().await.unwrap();
    assert_eq!(ack.stage, Stage::EmergencyRaised);
    let seen = drain(&mut events);
    assert!(seen.contains(&AlarmEvent::EmergencyActive(false)));
    assert!(!handle.status().emergency_active);

    handle.shutdown().await;

    let audit: Vec<_> = source.audit_log().into_iter().map(|r| r.event).collect();
    assert_eq!(audit, vec!["Danger", "Escalation", "Emergency", "acknowledge"]);
    assert_eq!(source.acknowledgements(), vec!["MANTA"]);
}

#[tokio::test(start_paused = true)]
async fn test_acknowledgment_cancels_pending_transitions() {
    let source = fleet(1);
    let key = TankKey::new("MANTA", 1);
    source.set_live(&key, live(Gas::H2S, 20.0));
    let (handle, mut events) = start(&source);

    sleep(Duration::from_secs(12)).await;
    let ack = handle.acknowledge().await.unwrap();
    assert_eq!(ack.key, key);
    assert_eq!(ack.stage, Stage::Detected);
    drain(&mut events);

    // Past both stage deadlines, still in danger but cooling down
    sleep(Duration::from_secs(60)).await;
    let seen = drain(&mut events);
    assert!(stages(&seen).is_empty());
    assert!(handle.status().incident.is_none());

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_cooldown_suppresses_then_reopens() {
    let source = fleet(1);
    let key = TankKey::new("MANTA", 1);
    source.set_live(&key, live(Gas::LEL, 15.0));
    let (handle, mut events) = start(&source);

    sleep(Duration::from_secs(1)).await;
    handle.acknowledge().await.unwrap();
    drain(&mut events);

    // Polls at 5s intervals keep seeing danger inside the window
    sleep(Duration::from_secs(115)).await;
    assert!(stages(&drain(&mut events)).is_empty());
    assert_eq!(handle.status().cooldowns, 1);

    // First poll after the two-minute window opens a new incident
    sleep(Duration::from_secs(10)).await;
    assert_eq!(stages(&drain(&mut events)), vec![(key, Stage::Detected)]);
    assert_eq!(handle.status().incident.unwrap().id, 2);

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_one_incident_across_many_dangerous_tanks() {
    let source = fleet(5);
    for id in [2, 3, 5] {
        source.set_live(&TankKey::new("MANTA", id), live(Gas::CO, 300.0));
    }
    let (handle, mut events) = start(&source);

    sleep(Duration::from_secs(45)).await;
    let seen = stages(&drain(&mut events));
    assert_eq!(
        seen,
        vec![
            (TankKey::new("MANTA", 2), Stage::Detected),
            (TankKey::new("MANTA", 2), Stage::Escalated),
        ]
    );

    // Acknowledge: the next poll picks the next lowest tank
    handle.acknowledge().await.unwrap();
    sleep(Duration::from_secs(6)).await;
    assert_eq!(
        stages(&drain(&mut events)),
        vec![(TankKey::new("MANTA", 3), Stage::Detected)]
    );

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_danger_elsewhere_during_emergency_is_deferred() {
    let source = fleet(2);
    source.set_live(&TankKey::new("MANTA", 1), live(Gas::CO, 300.0));
    let (handle, mut events) = start(&source);

    sleep(Duration::from_secs(61)).await;
    assert!(handle.status().emergency_active);
    drain(&mut events);

    source.set_live(&TankKey::new("MANTA", 2), live(Gas::O2, 16.0));
    sleep(Duration::from_secs(20)).await;

    let deferred: Vec<_> = drain(&mut events)
        .into_iter()
        .filter(|e| matches!(e, AlarmEvent::DangerDeferred { .. }))
        .collect();
    assert_eq!(
        deferred,
        vec![AlarmEvent::DangerDeferred {
            key: TankKey::new("MANTA", 2),
            gases: vec![Gas::O2],
        }]
    );
    assert_eq!(
        handle.status().incident.unwrap().key,
        TankKey::new("MANTA", 1)
    );

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_missing_gas_does_not_alarm_but_others_do() {
    let source = fleet(2);
    // Tank 1: no sensor reports O2 at all, CO fine
    source.set_live(
        &TankKey::new("MANTA", 1),
        TankLive::default().with_sensor("SN-1", GasReadings::new().with(Gas::CO, 4.0)),
    );
    // Tank 2: O2 absent, H2S in danger on one of two sensors
    source.set_live(
        &TankKey::new("MANTA", 2),
        TankLive::default()
            .with_sensor("SN-2", GasReadings::new().with(Gas::H2S, 1.0))
            .with_sensor("SN-3", GasReadings::new().with(Gas::H2S, 18.0)),
    );
    let (handle, mut events) = start(&source);

    sleep(Duration::from_secs(1)).await;
    assert_eq!(
        stages(&drain(&mut events)),
        vec![(TankKey::new("MANTA", 2), Stage::Detected)]
    );
    assert_eq!(
        handle.status().incident.unwrap().danger_gases,
        vec![Gas::H2S]
    );

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_failing_tank_is_skipped_and_polling_continues() {
    let source = fleet(2);
    let broken = TankKey::new("MANTA", 1);
    source.set_live(&broken, live(Gas::CO, 500.0));
    source.fail_tank(&broken, true);
    let (handle, mut events) = start(&source);

    sleep(Duration::from_secs(11)).await;
    assert!(stages(&drain(&mut events)).is_empty());
    assert!(handle.status().scans >= 3);

    source.fail_tank(&broken, false);
    sleep(Duration::from_secs(5)).await;
    assert_eq!(stages(&drain(&mut events)), vec![(broken, Stage::Detected)]);

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_countdown_counts_down_from_deadline() {
    let source = fleet(1);
    source.set_live(&TankKey::new("MANTA", 1), live(Gas::CO, 150.0));
    let (handle, mut events) = start(&source);

    sleep(Duration::from_millis(5_100)).await;
    let remaining: Vec<u64> = drain(&mut events)
        .into_iter()
        .filter_map(|e| match e {
            AlarmEvent::Countdown { remaining_secs, .. } => Some(remaining_secs),
            _ => None,
        })
        .collect();
    assert_eq!(remaining, vec![29, 28, 27, 26, 25]);
    assert_eq!(handle.status().incident.unwrap().remaining_secs, Some(25));

    handle.shutdown().await;
}
