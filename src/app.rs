//! The running monitor: poll loop, countdown and acknowledgment handling.
//!
//! A single owner task holds the [`Engine`]. Everything that touches the
//! incident goes through it:
//!
//! ```text
//!  poll interval ──▶ spawn scan ──▶ scan result ─┐
//!  countdown interval ───────────────────────────┼──▶ Engine ──▶ AlarmEvent ──▶ broadcast
//!  MonitorHandle commands ───────────────────────┘                   │
//!                                                                   └──▶ Dispatcher ──▶ backend
//! ```
//!
//! Scans run in their own task so a slow backend never delays the
//! countdown. At most one scan is in flight, and its result is checked
//! against the engine again when it arrives. A scan task that panics is
//! logged and the next poll starts over.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tankwatch_types::{AuditRecord, TankKey};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{Instant, MissedTickBehavior};

use crate::data::ThresholdStore;
use crate::dispatch::{Dispatcher, Outbound};
use crate::engine::{Engine, IncidentView, Rejected, Stage};
use crate::events::AlarmEvent;
use crate::scan::{scan, ScanReport};
use crate::settings::Settings;
use crate::source::FleetSource;

/// How long shutdown waits for queued outbound calls.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

/// Result of acknowledging the active incident.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AckOutcome {
    pub incident_id: u64,
    pub key: TankKey,
    /// Stage the incident was in when acknowledged.
    pub stage: Stage,
    /// Whether the upstream acknowledge call was queued.
    pub forwarded: bool,
}

/// Current state, as seen through [`MonitorHandle::status`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MonitorStatus {
    pub incident: Option<IncidentView>,
    pub emergency_active: bool,
    /// Completed scans since start.
    pub scans: u64,
    /// Tanks currently in cooldown.
    pub cooldowns: usize,
}

/// A monitor ready to start.
#[derive(Debug)]
pub struct Monitor {
    source: Arc<dyn FleetSource>,
    settings: Settings,
}

impl Monitor {
    pub fn builder(source: Arc<dyn FleetSource>) -> MonitorBuilder {
        MonitorBuilder {
            source,
            settings: Settings::default(),
        }
    }

    /// Spawn the owner task. Must be called inside a tokio runtime.
    ///
    /// The first scan starts immediately.
    pub fn start(self) -> MonitorHandle {
        let (command_tx, command_rx) = mpsc::channel(16);
        let (events_tx, _) = broadcast::channel(self.settings.events.capacity.max(1));
        let (status_tx, status_rx) = watch::channel(MonitorStatus::default());

        let (dispatcher, dispatch_worker) = Dispatcher::spawn(
            self.source.clone(),
            self.settings.dispatch.queue_capacity,
            self.settings.retry_policy(),
        );

        tracing::info!(
            source = self.source.description(),
            poll = ?self.settings.poll.interval,
            window = ?self.settings.escalation.stage_window,
            cooldown = ?self.settings.escalation.cooldown,
            "monitor starting"
        );

        let owner = Owner {
            engine: Engine::new(self.settings.timings()),
            store: ThresholdStore::new(self.settings.threshold_defaults()),
            source: self.source,
            dispatcher,
            events: events_tx.clone(),
            status: status_tx,
            scans: 0,
            deferred: None,
            manual_emergency: false,
            emergency_shown: false,
        };

        let task = tokio::spawn(owner.run(self.settings, command_rx, dispatch_worker));

        MonitorHandle {
            commands: command_tx,
            events: events_tx,
            status: status_rx,
            task,
        }
    }
}

/// Builder for [`Monitor`].
#[derive(Debug)]
pub struct MonitorBuilder {
    source: Arc<dyn FleetSource>,
    settings: Settings,
}

impl MonitorBuilder {
    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.settings.poll.interval = interval;
        self
    }

    pub fn stage_window(mut self, window: Duration) -> Self {
        self.settings.escalation.stage_window = window;
        self
    }

    pub fn cooldown(mut self, cooldown: Duration) -> Self {
        self.settings.escalation.cooldown = cooldown;
        self
    }

    pub fn build(self) -> anyhow::Result<Monitor> {
        self.settings.validate()?;
        Ok(Monitor {
            source: self.source,
            settings: self.settings,
        })
    }
}

#[derive(Debug)]
enum Command {
    Acknowledge(oneshot::Sender<Option<AckOutcome>>),
    RaiseEmergency(oneshot::Sender<bool>),
    ClearEmergency(oneshot::Sender<bool>),
    Shutdown,
}

/// Handle to a running monitor.
#[derive(Debug)]
pub struct MonitorHandle {
    commands: mpsc::Sender<Command>,
    events: broadcast::Sender<AlarmEvent>,
    status: watch::Receiver<MonitorStatus>,
    task: JoinHandle<()>,
}

impl MonitorHandle {
    /// Acknowledge the active incident, whatever its stage.
    ///
    /// Returns `None` if nothing was active or the monitor has stopped.
    pub async fn acknowledge(&self) -> Option<AckOutcome> {
        self.request(Command::Acknowledge).await.flatten()
    }

    /// Switch the global emergency on by hand.
    ///
    /// Returns `false` if an emergency is already active.
    pub async fn raise_emergency(&self) -> bool {
        self.request(Command::RaiseEmergency).await.unwrap_or(false)
    }

    /// Switch a manually raised emergency off.
    ///
    /// Returns `false` if nothing was active, or if an unacknowledged
    /// incident holds the emergency. Acknowledge that incident instead.
    pub async fn clear_emergency(&self) -> bool {
        self.request(Command::ClearEmergency).await.unwrap_or(false)
    }

    async fn request<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> Command) -> Option<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands.send(command(reply_tx)).await.ok()?;
        reply_rx.await.ok()
    }

    /// Receive alarm events from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<AlarmEvent> {
        self.events.subscribe()
    }

    /// Snapshot of the current state.
    pub fn status(&self) -> MonitorStatus {
        self.status.borrow().clone()
    }

    /// Watch state changes.
    pub fn watch_status(&self) -> watch::Receiver<MonitorStatus> {
        self.status.clone()
    }

    /// Stop the owner task and wait for queued outbound calls to flush.
    pub async fn shutdown(self) {
        let _ = self.commands.send(Command::Shutdown).await;
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "monitor task failed");
        }
    }
}

struct Owner {
    engine: Engine,
    /// Threshold cache; each scan works on a copy and hands it back.
    store: ThresholdStore,
    source: Arc<dyn FleetSource>,
    dispatcher: Dispatcher,
    events: broadcast::Sender<AlarmEvent>,
    status: watch::Sender<MonitorStatus>,
    scans: u64,
    /// Last tank reported as deferred, so it is reported once.
    deferred: Option<TankKey>,
    /// Emergency raised by an operator rather than by an incident.
    manual_emergency: bool,
    /// Emergency state last published as `EmergencyActive`.
    emergency_shown: bool,
}

impl Owner {
    async fn run(
        mut self,
        settings: Settings,
        mut commands: mpsc::Receiver<Command>,
        dispatch_worker: JoinHandle<()>,
    ) {
        let mut poll = tokio::time::interval(settings.poll.interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut countdown = tokio::time::interval(settings.poll.countdown_tick);
        countdown.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut scan_task: Option<JoinHandle<ScanReport>> = None;

        loop {
            tokio::select! {
                _ = poll.tick() => {
                    if scan_task.is_some() {
                        tracing::debug!("previous scan still running, poll skipped");
                    } else {
                        scan_task = self.start_scan();
                    }
                }
                _ = countdown.tick() => {
                    let events = self.engine.tick(Instant::now());
                    self.publish(events);
                }
                joined = join_scan(&mut scan_task), if scan_task.is_some() => {
                    scan_task = None;
                    match joined {
                        Ok(report) => self.finish_scan(report),
                        Err(e) => tracing::error!(error = %e, "scan task failed, next poll rescans"),
                    }
                }
                command = commands.recv() => match command {
                    Some(Command::Acknowledge(reply)) => {
                        let _ = reply.send(self.acknowledge());
                    }
                    Some(Command::RaiseEmergency(reply)) => {
                        let _ = reply.send(self.raise_emergency());
                    }
                    Some(Command::ClearEmergency(reply)) => {
                        let _ = reply.send(self.clear_emergency());
                    }
                    Some(Command::Shutdown) | None => break,
                },
            }
            self.update_status();
        }

        if let Some(task) = scan_task {
            task.abort();
        }
        tracing::info!("monitor stopping");

        drop(self.dispatcher);
        if tokio::time::timeout(FLUSH_TIMEOUT, dispatch_worker)
            .await
            .is_err()
        {
            tracing::warn!("outbound queue not flushed before shutdown");
        }
    }

    fn start_scan(&mut self) -> Option<JoinHandle<ScanReport>> {
        let now = Instant::now();
        self.engine.prune_cooldowns(now);

        if self.engine.is_busy() {
            tracing::trace!("incident active, poll skipped");
            return None;
        }

        let mut skip: HashSet<TankKey> = self.engine.suppressed_keys(now).cloned().collect();
        if let Some(active) = self.engine.active() {
            skip.insert(active.key.clone());
        }

        let source = self.source.clone();
        let store = self.store.clone();
        Some(tokio::spawn(async move {
            scan(source.as_ref(), &skip, store).await
        }))
    }

    fn finish_scan(&mut self, report: ScanReport) {
        self.store = report.store;
        self.scans += 1;
        tracing::debug!(
            checked = report.checked,
            failed = report.failed,
            listing_failed = report.listing_failed,
            "scan complete"
        );

        let Some(finding) = report.finding else {
            return;
        };

        // The engine may have moved on while the scan ran
        let now = Instant::now();
        match self
            .engine
            .begin(&finding.key, &finding.aggregate.worst, &finding.thresholds, now)
        {
            Ok(events) => {
                self.deferred = None;
                self.publish(events);
            }
            Err(Rejected::Busy { stage, .. }) if stage.is_terminal() => {
                if self.deferred.as_ref() != Some(&finding.key) {
                    tracing::warn!(
                        ship = %finding.key.ship_id,
                        tank = finding.key.tank_id,
                        "danger on another tank during emergency, deferred"
                    );
                    self.deferred = Some(finding.key.clone());
                    self.publish(vec![AlarmEvent::DangerDeferred {
                        key: finding.key,
                        gases: finding.danger_gases,
                    }]);
                }
            }
            Err(reason) => {
                tracing::trace!(ship = %finding.key.ship_id, tank = finding.key.tank_id, %reason, "stale scan result discarded");
            }
        }
    }

    fn acknowledge(&mut self) -> Option<AckOutcome> {
        let Some(ack) = self.engine.acknowledge(Instant::now()) else {
            tracing::debug!("acknowledge with no active incident");
            return None;
        };
        self.deferred = None;

        let forwarded = self.dispatcher.send(Outbound::Acknowledge {
            ship_id: ack.incident.key.ship_id.clone(),
        });
        self.publish(ack.events);

        Some(AckOutcome {
            incident_id: ack.incident.id,
            key: ack.incident.key,
            stage: ack.stage,
            forwarded,
        })
    }

    fn incident_emergency(&self) -> bool {
        self.engine.active().is_some_and(|i| i.stage.is_terminal())
    }

    fn emergency_active(&self) -> bool {
        self.manual_emergency || self.incident_emergency()
    }

    fn raise_emergency(&mut self) -> bool {
        if self.emergency_active() {
            tracing::debug!("emergency already active, raise ignored");
            return false;
        }
        self.manual_emergency = true;
        tracing::error!("emergency raised by operator");

        self.dispatcher.send(Outbound::Audit(AuditRecord::new(
            "Emergency",
            "Dockyard emergency raised by operator",
        )));
        self.publish(vec![
            AlarmEvent::EmergencyActive(true),
            AlarmEvent::Toast("🚨 Emergency alarm raised".to_string()),
        ]);
        true
    }

    fn clear_emergency(&mut self) -> bool {
        if self.incident_emergency() {
            tracing::warn!("emergency held by an unacknowledged incident, clear refused");
            return false;
        }
        if !self.manual_emergency {
            tracing::debug!("no emergency to clear");
            return false;
        }
        self.manual_emergency = false;
        tracing::info!("emergency cleared by operator");

        self.dispatcher.send(Outbound::Audit(AuditRecord::new(
            "EmergencyClear",
            "Dockyard emergency cleared by operator",
        )));
        self.publish(vec![
            AlarmEvent::EmergencyActive(false),
            AlarmEvent::Toast("✅ Emergency cleared".to_string()),
        ]);
        true
    }

    fn publish(&mut self, events: Vec<AlarmEvent>) {
        for event in events {
            let event = match event {
                // Manual and incident emergencies share one published state
                AlarmEvent::EmergencyActive(_) => {
                    let active = self.emergency_active();
                    if active == self.emergency_shown {
                        continue;
                    }
                    self.emergency_shown = active;
                    AlarmEvent::EmergencyActive(active)
                }
                event => event,
            };
            if let Some(record) = event.audit_record() {
                self.dispatcher.send(Outbound::Audit(record));
            }
            // No subscribers is fine
            let _ = self.events.send(event);
        }
    }

    fn update_status(&self) {
        let now = Instant::now();
        let next = MonitorStatus {
            incident: self.engine.active().map(|i| i.view(now)),
            emergency_active: self.emergency_active(),
            scans: self.scans,
            cooldowns: self.engine.cooldown_count(),
        };
        self.status.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
    }
}

async fn join_scan(task: &mut Option<JoinHandle<ScanReport>>) -> Result<ScanReport, JoinError> {
    match task {
        Some(task) => task.await,
        None => std::future::pending().await,
    }
}
