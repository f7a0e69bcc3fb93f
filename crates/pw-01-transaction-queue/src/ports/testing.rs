//! In-memory test doubles for the outbound ports.
//!
//! Compiled for this crate's tests and, with the `test-utils` feature, for
//! other crates' tests.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use shared_bus::WorkerEvent;
use shared_types::{
    CallerIdentity, ExecutionJob, Timestamp, TransactionId, TransactionStatus, Uid,
};

use super::outbound::{Authorizer, ExecutionBackend, QueueNotifier, TimeSource};
use crate::domain::BackendUnavailable;

// =============================================================================
// NOTIFIER
// =============================================================================

/// Records every notification in emission order.
#[derive(Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<WorkerEvent>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<WorkerEvent> {
        self.events.lock().clone()
    }

    /// The `queue` list of every queue-changed notification, in order.
    pub fn queue_snapshots(&self) -> Vec<Vec<TransactionId>> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                WorkerEvent::QueueChanged(snapshot) => Some(snapshot.queue.clone()),
                _ => None,
            })
            .collect()
    }

    /// Every status notified for `id`, in order.
    pub fn statuses_for(&self, id: &TransactionId) -> Vec<TransactionStatus> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                WorkerEvent::TransactionStatusChanged { id: tx, status, .. } if tx == id => {
                    Some(*status)
                }
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl QueueNotifier for RecordingNotifier {
    fn notify(&self, event: WorkerEvent) {
        self.events.lock().push(event);
    }
}

// =============================================================================
// BACKEND
// =============================================================================

/// Backend that records what it is asked to do and never executes anything.
///
/// The busy flag and last-active timestamp are set explicitly by tests.
#[derive(Default)]
pub struct FakeBackend {
    dispatched: Mutex<Vec<ExecutionJob>>,
    cancelled: Mutex<Vec<TransactionId>>,
    busy: AtomicBool,
    unavailable: AtomicBool,
    last_active: AtomicU64,
    quit_requested: AtomicBool,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dispatched_ids(&self) -> Vec<TransactionId> {
        self.dispatched.lock().iter().map(|job| job.id).collect()
    }

    pub fn dispatched_jobs(&self) -> Vec<ExecutionJob> {
        self.dispatched.lock().clone()
    }

    pub fn cancelled_ids(&self) -> Vec<TransactionId> {
        self.cancelled.lock().clone()
    }

    pub fn set_busy(&self, busy: bool) {
        self.busy.store(busy, Ordering::SeqCst);
    }

    /// Make `dispatch` fail as if the execution thread had died.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn set_last_active(&self, ms: Timestamp) {
        self.last_active.store(ms, Ordering::SeqCst);
    }

    pub fn quit_requested(&self) -> bool {
        self.quit_requested.load(Ordering::SeqCst)
    }
}

impl ExecutionBackend for FakeBackend {
    fn dispatch(&self, job: ExecutionJob) -> Result<(), BackendUnavailable> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(BackendUnavailable);
        }
        self.dispatched.lock().push(job);
        Ok(())
    }

    fn cancel(&self, id: TransactionId) {
        self.cancelled.lock().push(id);
    }

    fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    fn last_active_ms(&self) -> Timestamp {
        self.last_active.load(Ordering::SeqCst)
    }

    fn request_quit(&self) {
        self.quit_requested.store(true, Ordering::SeqCst);
    }
}

// =============================================================================
// AUTHORIZER
// =============================================================================

/// Authorizer with a fixed answer that records every question.
pub struct FakeAuthorizer {
    allow: AtomicBool,
    calls: Mutex<Vec<(Uid, String)>>,
}

impl FakeAuthorizer {
    pub fn allowing() -> Self {
        Self {
            allow: AtomicBool::new(true),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn denying() -> Self {
        Self {
            allow: AtomicBool::new(false),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn set_allow(&self, allow: bool) {
        self.allow.store(allow, Ordering::SeqCst);
    }

    /// `(uid, action)` of every authorization request, in order.
    pub fn calls(&self) -> Vec<(Uid, String)> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl Authorizer for FakeAuthorizer {
    async fn authorize(&self, caller: &CallerIdentity, action: &str) -> bool {
        self.calls.lock().push((caller.uid, action.to_string()));
        self.allow.load(Ordering::SeqCst)
    }
}

// =============================================================================
// TIME
// =============================================================================

/// Mock time source for testing.
pub struct MockTimeSource {
    time: AtomicU64,
}

impl MockTimeSource {
    pub fn new(initial: Timestamp) -> Self {
        Self {
            time: AtomicU64::new(initial),
        }
    }

    pub fn advance(&self, ms: u64) {
        self.time.fetch_add(ms, Ordering::SeqCst);
    }

    pub fn set(&self, time: Timestamp) {
        self.time.store(time, Ordering::SeqCst);
    }
}

impl TimeSource for MockTimeSource {
    fn now(&self) -> Timestamp {
        self.time.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_time_source() {
        let source = MockTimeSource::new(1000);
        assert_eq!(source.now(), 1000);

        source.advance(500);
        assert_eq!(source.now(), 1500);

        source.set(3000);
        assert_eq!(source.now(), 3000);
    }

    #[tokio::test]
    async fn test_fake_authorizer_records_calls() {
        let authorizer = FakeAuthorizer::denying();
        let caller = CallerIdentity::new(7, shared_types::SessionId::new("s"));

        assert!(!authorizer.authorize(&caller, "a.b").await);
        authorizer.set_allow(true);
        assert!(authorizer.authorize(&caller, "a.c").await);

        assert_eq!(
            authorizer.calls(),
            vec![(7, "a.b".to_string()), (7, "a.c".to_string())]
        );
    }
}
