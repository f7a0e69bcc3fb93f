//! # Idle Supervisor
//!
//! Decides, on every tick of a periodic timer, whether the service has been
//! idle long enough to stop itself.
//!
//! Shutdown needs all three signals at once:
//!
//! | Signal | Source |
//! |--------|--------|
//! | `now - last_active > threshold` (strict) | `ExecutionBackend::last_active_ms` |
//! | nothing executing | `ExecutionBackend::is_busy` |
//! | nothing queued | `TransactionQueue::is_empty` |
//!
//! A positive decision is only a request: `TransactionQueue::try_stop`
//! re-checks under the queue lock and refuses if work slipped in. The timer
//! keeps ticking whatever the decision was.

use std::sync::Arc;

use tracing::{debug, info};

use super::queue::TransactionQueue;
use crate::ports::outbound::{ExecutionBackend, TimeSource};

/// Default idle threshold (ms).
pub const DEFAULT_IDLE_TIMEOUT_MS: u64 = 30_000;

/// Outcome of one idle check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleDecision {
    /// A transaction is executing.
    Busy,
    /// Transactions are waiting.
    Pending,
    /// The backend was active too recently.
    Recent { idle_ms: u64 },
    /// Idle, but the stop was refused because work arrived meanwhile.
    Deferred { idle_ms: u64 },
    /// The queue stopped and the backend was asked to quit.
    Shutdown { idle_ms: u64 },
}

impl IdleDecision {
    /// Stable lowercase name, used for log fields and metric labels.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            IdleDecision::Busy => "busy",
            IdleDecision::Pending => "pending",
            IdleDecision::Recent { .. } => "recent",
            IdleDecision::Deferred { .. } => "deferred",
            IdleDecision::Shutdown { .. } => "shutdown",
        }
    }

    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        matches!(self, IdleDecision::Shutdown { .. })
    }
}

/// Periodic idle evaluation over the queue and its backend.
pub struct IdleSupervisor {
    queue: Arc<TransactionQueue>,
    backend: Arc<dyn ExecutionBackend>,
    time: Arc<dyn TimeSource>,
    threshold_ms: u64,
}

impl IdleSupervisor {
    pub fn new(
        queue: Arc<TransactionQueue>,
        backend: Arc<dyn ExecutionBackend>,
        time: Arc<dyn TimeSource>,
        threshold_ms: u64,
    ) -> Self {
        Self {
            queue,
            backend,
            time,
            threshold_ms,
        }
    }

    pub fn threshold_ms(&self) -> u64 {
        self.threshold_ms
    }

    /// Computes the decision without acting on it.
    ///
    /// Never returns `Deferred`; only `check()` can observe a refused stop.
    pub fn evaluate(&self) -> IdleDecision {
        if self.backend.is_busy() {
            return IdleDecision::Busy;
        }
        if !self.queue.is_empty() {
            return IdleDecision::Pending;
        }

        let idle_ms = self
            .time
            .now()
            .saturating_sub(self.backend.last_active_ms());
        if idle_ms > self.threshold_ms {
            IdleDecision::Shutdown { idle_ms }
        } else {
            IdleDecision::Recent { idle_ms }
        }
    }

    /// Runs one check and, if everything is idle, asks the queue to stop.
    pub fn check(&self) -> IdleDecision {
        let decision = match self.evaluate() {
            IdleDecision::Shutdown { idle_ms } => {
                if self.queue.try_stop() {
                    info!(idle_ms, threshold_ms = self.threshold_ms, "Idle timeout reached, stopping");
                    IdleDecision::Shutdown { idle_ms }
                } else {
                    IdleDecision::Deferred { idle_ms }
                }
            }
            other => other,
        };

        debug!(decision = decision.as_str(), "Idle check");
        decision
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{QueueConfig, Transaction};
    use crate::ports::testing::{FakeBackend, MockTimeSource, RecordingNotifier};
    use shared_types::{CallerIdentity, ExecutionOutcome, SessionId, TransactionRequest};

    const T: u64 = 1_000_000;

    struct Harness {
        supervisor: IdleSupervisor,
        queue: Arc<TransactionQueue>,
        backend: Arc<FakeBackend>,
        time: Arc<MockTimeSource>,
    }

    fn harness() -> Harness {
        let backend = Arc::new(FakeBackend::new());
        backend.set_last_active(T);
        let time = Arc::new(MockTimeSource::new(T));
        let queue = Arc::new(TransactionQueue::new(
            QueueConfig::default(),
            backend.clone(),
            Arc::new(RecordingNotifier::new()),
            time.clone(),
        ));
        let supervisor = IdleSupervisor::new(
            queue.clone(),
            backend.clone(),
            time.clone(),
            DEFAULT_IDLE_TIMEOUT_MS,
        );
        Harness {
            supervisor,
            queue,
            backend,
            time,
        }
    }

    fn create_tx() -> Transaction {
        let caller = CallerIdentity::new(1000, SessionId::new("s1"));
        Transaction::new(caller, TransactionRequest::UpdateCache, T)
    }

    #[test]
    fn test_below_threshold_does_not_shut_down() {
        let h = harness();
        h.time.set(T + 29_999);

        assert_eq!(h.supervisor.check(), IdleDecision::Recent { idle_ms: 29_999 });
        assert!(!h.backend.quit_requested());
    }

    #[test]
    fn test_threshold_itself_does_not_shut_down() {
        let h = harness();
        h.time.set(T + 30_000);

        assert!(!h.supervisor.check().is_shutdown());
    }

    #[test]
    fn test_past_threshold_shuts_down() {
        let h = harness();
        h.time.set(T + 30_001);

        assert_eq!(h.supervisor.check(), IdleDecision::Shutdown { idle_ms: 30_001 });
        assert!(h.backend.quit_requested());
        assert!(h.queue.is_stopped());
    }

    #[test]
    fn test_enqueue_before_check_suppresses_shutdown() {
        let h = harness();
        h.queue.enqueue(create_tx());
        h.time.set(T + 30_001);

        // The fake backend does not flip its busy flag; the queue alone vetoes
        assert_eq!(h.supervisor.check(), IdleDecision::Pending);
        assert!(!h.backend.quit_requested());
        assert!(!h.queue.is_stopped());
    }

    #[test]
    fn test_busy_backend_suppresses_shutdown() {
        let h = harness();
        h.backend.set_busy(true);
        h.time.set(T + 60_000);

        assert_eq!(h.supervisor.check(), IdleDecision::Busy);
    }

    #[test]
    fn test_check_is_rearmed_after_refusal() {
        let h = harness();
        let id = h.queue.enqueue(create_tx());
        h.time.set(T + 30_001);
        assert_eq!(h.supervisor.check(), IdleDecision::Pending);

        h.queue
            .on_transaction_finished(id, ExecutionOutcome::Succeeded)
            .unwrap();
        // Completion counts as activity
        h.backend.set_last_active(T + 30_001);
        h.time.set(T + 45_000);
        assert!(matches!(h.supervisor.check(), IdleDecision::Recent { .. }));

        h.time.set(T + 60_002);
        assert!(h.supervisor.check().is_shutdown());
    }

    #[test]
    fn test_clock_behind_last_active_counts_as_recent() {
        let h = harness();
        h.time.set(T - 5);

        assert_eq!(h.supervisor.evaluate(), IdleDecision::Recent { idle_ms: 0 });
    }

    #[test]
    fn test_decision_labels() {
        assert_eq!(IdleDecision::Busy.as_str(), "busy");
        assert_eq!(IdleDecision::Deferred { idle_ms: 1 }.as_str(), "deferred");
    }
}
