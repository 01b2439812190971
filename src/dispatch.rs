//! Best-effort outbound calls to the fleet backend.
//!
//! Acknowledgements and audit records must never hold up the engine. They
//! are queued on a bounded channel and delivered by a background task with
//! a bounded retry. A full queue drops the job; so does running out of
//! attempts. Both are logged at `warn`.

use std::sync::Arc;
use std::time::Duration;

use tankwatch_types::AuditRecord;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::SourceError;
use crate::source::FleetSource;

/// A call to make against the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Clear the ship's danger status upstream.
    Acknowledge { ship_id: String },
    /// Append to the event timeline.
    Audit(AuditRecord),
}

impl Outbound {
    fn kind(&self) -> &'static str {
        match self {
            Outbound::Acknowledge { .. } => "acknowledge",
            Outbound::Audit(_) => "audit",
        }
    }
}

/// Retry schedule for outbound calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Delay before the attempt following `failed_attempt` (1-based).
    pub fn backoff(&self, failed_attempt: u32) -> Duration {
        let exp = failed_attempt.saturating_sub(1).min(16);
        self.initial_backoff
            .saturating_mul(1u32 << exp)
            .min(self.max_backoff)
    }
}

/// Handle to the outbound queue.
///
/// Dropping every clone closes the queue; the worker drains what is left
/// and exits.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    tx: mpsc::Sender<Outbound>,
}

impl Dispatcher {
    /// Spawn the delivery worker.
    pub fn spawn(
        source: Arc<dyn FleetSource>,
        capacity: usize,
        policy: RetryPolicy,
    ) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<Outbound>(capacity.max(1));

        let worker = tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                deliver(source.as_ref(), &job, &policy).await;
            }
            tracing::debug!("outbound queue closed");
        });

        (Self { tx }, worker)
    }

    /// Queue a job without waiting. Returns false if it was dropped.
    pub fn send(&self, job: Outbound) -> bool {
        match self.tx.try_send(job) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(job)) => {
                tracing::warn!(kind = job.kind(), "outbound queue full, dropping job");
                false
            }
            Err(mpsc::error::TrySendError::Closed(job)) => {
                tracing::warn!(kind = job.kind(), "outbound queue closed, dropping job");
                false
            }
        }
    }
}

async fn deliver(source: &dyn FleetSource, job: &Outbound, policy: &RetryPolicy) -> bool {
    let attempts = policy.max_attempts.max(1);

    for attempt in 1..=attempts {
        match call(source, job).await {
            Ok(()) => {
                tracing::trace!(kind = job.kind(), attempt, "outbound delivered");
                return true;
            }
            Err(e) if attempt < attempts => {
                let delay = policy.backoff(attempt);
                tracing::debug!(kind = job.kind(), attempt, error = %e, ?delay, "outbound failed, retrying");
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                tracing::warn!(kind = job.kind(), attempts, error = %e, "outbound failed, dropping job");
            }
        }
    }
    false
}

async fn call(source: &dyn FleetSource, job: &Outbound) -> Result<(), SourceError> {
    match job {
        Outbound::Acknowledge { ship_id } => source.acknowledge(ship_id).await,
        Outbound::Audit(record) => source.append_log(record).await,
    }
}
