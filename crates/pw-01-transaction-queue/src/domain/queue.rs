//! # Transaction Queue - FIFO Admission and Single-Slot Dispatch
//!
//! ## Data Structures
//!
//! - `order`: arrival order of every non-terminal transaction
//! - `live`: O(1) lookup of non-terminal transactions by id
//! - `running`: the transaction holding the execution slot, always the head
//!   of `order`
//! - `history`: bounded snapshots of terminal transactions for status queries
//!
//! ## Invariants Enforced
//!
//! - At most one transaction is Running (`running` is an `Option`, set only
//!   by `dispatch_next()` when it is `None`)
//! - Membership of `order` is exactly the set of non-terminal transactions
//! - Every path that frees the slot or admits work ends in `dispatch_next()`,
//!   so queued work never waits behind an idle backend
//!
//! ## Locking
//!
//! All state sits behind one mutex. Each public operation is a single
//! critical section that mutates, dispatches and notifies, so observers see
//! notifications in mutation order. Each operation emits at most one
//! queue-changed notification, after the dispatch step it triggered.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use shared_bus::WorkerEvent;
use shared_types::{
    ExecutionError, ExecutionErrorKind, ExecutionOutcome, QueueSnapshot, Timestamp,
    TransactionId, TransactionProgress, TransactionSnapshot, TransactionStatus,
};
use tracing::{debug, error, info, warn};

use super::entities::Transaction;
use super::errors::QueueError;
use crate::ports::outbound::{ExecutionBackend, QueueNotifier, TimeSource};

/// Default number of terminal transactions kept for status queries.
pub const DEFAULT_FINISHED_HISTORY: usize = 64;

/// Queue configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    /// Terminal transactions retained for `get()`, oldest evicted first.
    pub finished_history: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            finished_history: DEFAULT_FINISHED_HISTORY,
        }
    }
}

/// Result of a successful `remove()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// The transaction was queued and has been cancelled and removed.
    Removed,
    /// The transaction is running; cancellation was forwarded to the
    /// backend and completes through `on_transaction_finished()`.
    Requested,
}

#[derive(Debug, Default)]
struct QueueState {
    order: VecDeque<TransactionId>,
    live: HashMap<TransactionId, Transaction>,
    running: Option<TransactionId>,
    history: VecDeque<TransactionSnapshot>,
    stopped: bool,
}

impl QueueState {
    fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            active: self.running,
            queue: self.order.iter().copied().collect(),
        }
    }

    fn finished(&self, id: &TransactionId) -> Option<&TransactionSnapshot> {
        self.history.iter().rev().find(|s| s.id == *id)
    }

    /// The error for an id that is not live.
    fn missing(&self, id: TransactionId) -> QueueError {
        match self.finished(&id) {
            Some(snapshot) => QueueError::AlreadyTerminal {
                id,
                status: snapshot.status,
            },
            None => QueueError::NotFound(id),
        }
    }
}

/// The ordered admission/dispatch structure in front of the execution
/// backend.
pub struct TransactionQueue {
    config: QueueConfig,
    state: Mutex<QueueState>,
    backend: Arc<dyn ExecutionBackend>,
    notifier: Arc<dyn QueueNotifier>,
    time: Arc<dyn TimeSource>,
}

impl TransactionQueue {
    /// Creates an empty queue in front of `backend`.
    pub fn new(
        config: QueueConfig,
        backend: Arc<dyn ExecutionBackend>,
        notifier: Arc<dyn QueueNotifier>,
        time: Arc<dyn TimeSource>,
    ) -> Self {
        Self {
            config,
            state: Mutex::new(QueueState::default()),
            backend,
            notifier,
            time,
        }
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    // =========================================================================
    // ADMISSION AND DISPATCH
    // =========================================================================

    /// Appends a transaction and dispatches it at once if the slot is free.
    ///
    /// Never fails. After the queue has been stopped the transaction is
    /// failed with `ServiceStopping` instead of being queued.
    pub fn enqueue(&self, mut tx: Transaction) -> TransactionId {
        let id = tx.id();
        let now = self.time.now();
        let mut guard = self.state.lock();
        let state = &mut *guard;

        if state.stopped {
            warn!(tx_id = %id, "Queue stopped, failing late admission");
            let stopping =
                ExecutionError::new(ExecutionErrorKind::ServiceStopping, "service is stopping");
            if let Err(e) = tx.abort(stopping, now) {
                error!(tx_id = %id, error = %e, "Failed to abort late admission");
            }
            self.notify_status(&tx);
            self.retire(state, tx);
            return id;
        }

        debug!(tx_id = %id, role = %tx.role(), uid = tx.caller().uid, "Transaction queued");
        self.notify_status(&tx);
        state.order.push_back(id);
        state.live.insert(id, tx);

        self.dispatch_next(state, now);
        self.notify_queue(state);
        id
    }

    /// Promotes the head to Running and hands it to the backend, if the slot
    /// is free and work is waiting.
    ///
    /// A head that the backend refuses is failed and the next one is tried.
    fn dispatch_next(&self, state: &mut QueueState, now: Timestamp) {
        while state.running.is_none() {
            let Some(&head) = state.order.front() else {
                return;
            };
            let Some(tx) = state.live.get_mut(&head) else {
                error!(tx_id = %head, "Queued id has no transaction, dropping it");
                state.order.pop_front();
                continue;
            };

            if let Err(e) = tx.start(now) {
                // A Running head with a free slot means the slot bookkeeping
                // is broken
                error!(tx_id = %head, error = %e, "Invariant violation on dispatch");
                state.order.pop_front();
                if let Some(tx) = state.live.remove(&head) {
                    self.retire(state, tx);
                }
                continue;
            }

            let job = tx.job();
            self.notify_status(tx);
            state.running = Some(head);

            match self.backend.dispatch(job) {
                Ok(()) => {
                    info!(tx_id = %head, "Transaction dispatched");
                }
                Err(e) => {
                    error!(tx_id = %head, error = %e, "Dispatch failed");
                    state.running = None;
                    state.order.pop_front();
                    if let Some(mut tx) = state.live.remove(&head) {
                        let outcome = ExecutionOutcome::Failed(ExecutionError::internal(e.to_string()));
                        if tx.finish(outcome, now).is_ok() {
                            self.notify_status(&tx);
                        }
                        self.retire(state, tx);
                    }
                }
            }
        }
    }

    // =========================================================================
    // BACKEND REPORTS
    // =========================================================================

    /// Completes the running transaction, frees the slot and dispatches the
    /// next one.
    ///
    /// # Errors
    /// - `NotRunning` if `id` is live but does not hold the slot
    /// - `AlreadyTerminal` / `NotFound` if `id` is not live
    pub fn on_transaction_finished(
        &self,
        id: TransactionId,
        outcome: ExecutionOutcome,
    ) -> Result<TransactionStatus, QueueError> {
        let now = self.time.now();
        let mut guard = self.state.lock();
        let state = &mut *guard;

        if state.running != Some(id) {
            return Err(if state.live.contains_key(&id) {
                QueueError::NotRunning(id)
            } else {
                state.missing(id)
            });
        }

        let tx = state.live.get_mut(&id).ok_or(QueueError::NotFound(id))?;
        let status = tx.finish(outcome, now)?;
        self.notify_status(tx);
        info!(tx_id = %id, status = %status, "Transaction finished");

        state.running = None;
        state.order.retain(|queued| *queued != id);
        if let Some(tx) = state.live.remove(&id) {
            self.retire(state, tx);
        }

        self.dispatch_next(state, now);
        self.notify_queue(state);
        Ok(status)
    }

    /// Records progress of the running transaction and forwards it to the
    /// originating session.
    pub fn on_progress(
        &self,
        id: TransactionId,
        progress: TransactionProgress,
    ) -> Result<(), QueueError> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let Some(tx) = state.live.get_mut(&id) else {
            return Err(state.missing(id));
        };
        tx.update_progress(progress.clone())?;

        self.notifier.notify(WorkerEvent::TransactionProgress {
            id,
            session: tx.session().clone(),
            progress,
        });
        Ok(())
    }

    // =========================================================================
    // CANCELLATION
    // =========================================================================

    /// Cancellation path.
    ///
    /// A queued transaction is cancelled and removed at once. A running one
    /// is only asked to stop; it leaves the queue when the backend reports
    /// back.
    pub fn remove(&self, id: TransactionId) -> Result<CancelOutcome, QueueError> {
        let now = self.time.now();
        let mut guard = self.state.lock();
        let state = &mut *guard;

        if state.running == Some(id) {
            info!(tx_id = %id, "Forwarding cancellation to backend");
            self.backend.cancel(id);
            return Ok(CancelOutcome::Requested);
        }

        let Some(tx) = state.live.get_mut(&id) else {
            return Err(state.missing(id));
        };
        tx.cancel(now)?;
        self.notify_status(tx);
        info!(tx_id = %id, "Queued transaction cancelled");

        state.order.retain(|queued| *queued != id);
        if let Some(tx) = state.live.remove(&id) {
            self.retire(state, tx);
        }

        self.notify_queue(state);
        Ok(CancelOutcome::Removed)
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    /// True iff nothing is queued or running.
    pub fn is_empty(&self) -> bool {
        self.state.lock().order.is_empty()
    }

    /// Number of queued plus running transactions.
    pub fn len(&self) -> usize {
        self.state.lock().order.len()
    }

    /// The transaction holding the execution slot.
    pub fn running(&self) -> Option<TransactionId> {
        self.state.lock().running
    }

    /// Current membership, as carried by queue-changed notifications.
    pub fn snapshot(&self) -> QueueSnapshot {
        self.state.lock().snapshot()
    }

    /// Live snapshot of a transaction, or its final snapshot if it finished
    /// recently.
    pub fn get(&self, id: &TransactionId) -> Option<TransactionSnapshot> {
        let state = self.state.lock();
        state
            .live
            .get(id)
            .map(Transaction::snapshot)
            .or_else(|| state.finished(id).cloned())
    }

    // =========================================================================
    // SHUTDOWN
    // =========================================================================

    /// Stops the queue if, and only if, it is idle right now.
    ///
    /// Re-checks emptiness and backend activity under the lock, so work
    /// admitted after an idle decision was made vetoes the stop. Once
    /// stopped, the backend is asked to quit and later admissions fail.
    pub fn try_stop(&self) -> bool {
        let mut state = self.state.lock();
        if state.stopped {
            return true;
        }
        if !state.order.is_empty() || state.running.is_some() || self.backend.is_busy() {
            debug!(depth = state.order.len(), "Stop refused, work pending");
            return false;
        }

        state.stopped = true;
        info!("Queue stopped, requesting backend quit");
        self.backend.request_quit();
        true
    }

    /// True once `try_stop()` succeeded.
    pub fn is_stopped(&self) -> bool {
        self.state.lock().stopped
    }

    // =========================================================================
    // HELPERS
    // =========================================================================

    fn retire(&self, state: &mut QueueState, tx: Transaction) {
        if self.config.finished_history == 0 {
            return;
        }
        while state.history.len() >= self.config.finished_history {
            state.history.pop_front();
        }
        state.history.push_back(tx.snapshot());
    }

    fn notify_status(&self, tx: &Transaction) {
        self.notifier.notify(WorkerEvent::TransactionStatusChanged {
            id: tx.id(),
            session: tx.session().clone(),
            status: tx.status(),
            error: tx.error().cloned(),
        });
    }

    fn notify_queue(&self, state: &QueueState) {
        self.notifier
            .notify(WorkerEvent::QueueChanged(state.snapshot()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::testing::{FakeBackend, MockTimeSource, RecordingNotifier};
    use shared_types::{CallerIdentity, SessionId, TransactionRequest};

    struct Harness {
        queue: TransactionQueue,
        backend: Arc<FakeBackend>,
        notifier: Arc<RecordingNotifier>,
        time: Arc<MockTimeSource>,
    }

    fn harness_with(config: QueueConfig) -> Harness {
        let backend = Arc::new(FakeBackend::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let time = Arc::new(MockTimeSource::new(1_000));
        let queue = TransactionQueue::new(config, backend.clone(), notifier.clone(), time.clone());
        Harness {
            queue,
            backend,
            notifier,
            time,
        }
    }

    fn harness() -> Harness {
        harness_with(QueueConfig::default())
    }

    fn create_tx(session: &str) -> Transaction {
        let caller = CallerIdentity::new(1000, SessionId::new(session));
        Transaction::new(caller, TransactionRequest::UpdateCache, 1_000)
    }

    fn running_count(h: &Harness, ids: &[TransactionId]) -> usize {
        ids.iter()
            .filter_map(|id| h.queue.get(id))
            .filter(|s| s.status == TransactionStatus::Running)
            .count()
    }

    // =========================================================================
    // DISPATCH TESTS
    // =========================================================================

    #[test]
    fn test_enqueue_on_idle_backend_dispatches_immediately() {
        let h = harness();
        let a = h.queue.enqueue(create_tx("s1"));

        assert_eq!(h.queue.running(), Some(a));
        assert_eq!(h.backend.dispatched_ids(), vec![a]);
        assert_eq!(h.queue.get(&a).unwrap().status, TransactionStatus::Running);
    }

    #[test]
    fn test_fifo_dispatch() {
        let h = harness();
        let a = h.queue.enqueue(create_tx("s1"));
        let b = h.queue.enqueue(create_tx("s2"));
        let c = h.queue.enqueue(create_tx("s3"));

        assert_eq!(h.backend.dispatched_ids(), vec![a]);
        assert_eq!(h.queue.get(&b).unwrap().status, TransactionStatus::Queued);

        h.queue
            .on_transaction_finished(a, ExecutionOutcome::Succeeded)
            .unwrap();
        assert_eq!(h.backend.dispatched_ids(), vec![a, b]);

        h.queue
            .on_transaction_finished(b, ExecutionOutcome::Succeeded)
            .unwrap();
        assert_eq!(h.backend.dispatched_ids(), vec![a, b, c]);
    }

    #[test]
    fn test_at_most_one_running() {
        let h = harness();
        let mut ids = Vec::new();

        for round in 0..5 {
            ids.push(h.queue.enqueue(create_tx("s1")));
            ids.push(h.queue.enqueue(create_tx("s2")));
            assert!(running_count(&h, &ids) <= 1, "round {round}");

            let running = h.queue.running().unwrap();
            h.queue
                .on_transaction_finished(running, ExecutionOutcome::Succeeded)
                .unwrap();
            assert!(running_count(&h, &ids) <= 1, "round {round}");
        }
    }

    #[test]
    fn test_no_stranded_queue_after_failure() {
        let h = harness();
        let a = h.queue.enqueue(create_tx("s1"));
        let b = h.queue.enqueue(create_tx("s1"));

        let status = h
            .queue
            .on_transaction_finished(
                a,
                ExecutionOutcome::Failed(ExecutionError::new(
                    ExecutionErrorKind::LockFailed,
                    "dpkg lock held",
                )),
            )
            .unwrap();

        assert_eq!(status, TransactionStatus::Failed);
        assert_eq!(h.queue.running(), Some(b));
        let failed = h.queue.get(&a).unwrap();
        assert_eq!(failed.error.unwrap().kind, ExecutionErrorKind::LockFailed);
    }

    #[test]
    fn test_backend_refusal_fails_head_and_tries_next() {
        let h = harness();
        let a = h.queue.enqueue(create_tx("s1"));
        let b = h.queue.enqueue(create_tx("s1"));

        h.backend.set_unavailable(true);
        h.queue
            .on_transaction_finished(a, ExecutionOutcome::Succeeded)
            .unwrap();

        assert_eq!(h.queue.get(&b).unwrap().status, TransactionStatus::Failed);
        assert!(h.queue.is_empty());
        assert_eq!(h.queue.running(), None);
    }

    // =========================================================================
    // NOTIFICATION TESTS
    // =========================================================================

    #[test]
    fn test_queue_changed_snapshots_in_order() {
        let h = harness();
        let a = h.queue.enqueue(create_tx("s1"));
        let b = h.queue.enqueue(create_tx("s2"));
        h.queue
            .on_transaction_finished(a, ExecutionOutcome::Succeeded)
            .unwrap();

        assert_eq!(
            h.notifier.queue_snapshots(),
            vec![vec![a], vec![a, b], vec![b]]
        );
    }

    #[test]
    fn test_status_notifications_follow_transitions() {
        let h = harness();
        let a = h.queue.enqueue(create_tx("s1"));
        h.queue
            .on_transaction_finished(a, ExecutionOutcome::Succeeded)
            .unwrap();

        assert_eq!(
            h.notifier.statuses_for(&a),
            vec![
                TransactionStatus::Queued,
                TransactionStatus::Running,
                TransactionStatus::Finished,
            ]
        );
    }

    #[test]
    fn test_progress_routed_to_origin_session() {
        let h = harness();
        let a = h.queue.enqueue(create_tx("origin"));

        h.queue
            .on_progress(a, TransactionProgress::new(55))
            .unwrap();

        let progress = h.notifier.events().into_iter().find_map(|e| match e {
            WorkerEvent::TransactionProgress { session, progress, .. } => Some((session, progress)),
            _ => None,
        });
        let (session, progress) = progress.unwrap();
        assert_eq!(session, SessionId::new("origin"));
        assert_eq!(progress.percentage, 55);
        assert_eq!(h.queue.get(&a).unwrap().progress.percentage, 55);
    }

    #[test]
    fn test_progress_for_queued_transaction_rejected() {
        let h = harness();
        h.queue.enqueue(create_tx("s1"));
        let b = h.queue.enqueue(create_tx("s1"));

        assert_eq!(
            h.queue.on_progress(b, TransactionProgress::new(5)),
            Err(QueueError::NotRunning(b))
        );
    }

    // =========================================================================
    // CANCELLATION TESTS
    // =========================================================================

    #[test]
    fn test_cancel_queued_removes_immediately() {
        let h = harness();
        let a = h.queue.enqueue(create_tx("s1"));
        let b = h.queue.enqueue(create_tx("s1"));

        assert_eq!(h.queue.remove(b), Ok(CancelOutcome::Removed));

        assert_eq!(h.queue.snapshot().queue, vec![a]);
        assert_eq!(h.queue.get(&b).unwrap().status, TransactionStatus::Cancelled);
        assert_eq!(h.notifier.queue_snapshots().last(), Some(&vec![a]));
        assert!(h.backend.cancelled_ids().is_empty());
    }

    #[test]
    fn test_cancel_running_is_forwarded() {
        let h = harness();
        let a = h.queue.enqueue(create_tx("s1"));

        assert_eq!(h.queue.remove(a), Ok(CancelOutcome::Requested));
        assert_eq!(h.backend.cancelled_ids(), vec![a]);
        // Still a member until the backend reports back
        assert_eq!(h.queue.snapshot().queue, vec![a]);

        h.queue
            .on_transaction_finished(a, ExecutionOutcome::Cancelled)
            .unwrap();
        assert!(h.queue.is_empty());
        assert_eq!(h.queue.get(&a).unwrap().status, TransactionStatus::Cancelled);
    }

    #[test]
    fn test_cancel_unknown_and_finished() {
        let h = harness();
        let unknown = TransactionId::new();
        assert_eq!(h.queue.remove(unknown), Err(QueueError::NotFound(unknown)));

        let a = h.queue.enqueue(create_tx("s1"));
        h.queue
            .on_transaction_finished(a, ExecutionOutcome::Succeeded)
            .unwrap();
        assert_eq!(
            h.queue.remove(a),
            Err(QueueError::AlreadyTerminal {
                id: a,
                status: TransactionStatus::Finished
            })
        );
    }

    #[test]
    fn test_finish_reported_for_queued_transaction_rejected() {
        let h = harness();
        h.queue.enqueue(create_tx("s1"));
        let b = h.queue.enqueue(create_tx("s1"));

        assert_eq!(
            h.queue.on_transaction_finished(b, ExecutionOutcome::Succeeded),
            Err(QueueError::NotRunning(b))
        );
    }

    #[test]
    fn test_no_double_terminal_delivery() {
        let h = harness();
        let a = h.queue.enqueue(create_tx("s1"));
        h.queue
            .on_transaction_finished(a, ExecutionOutcome::Cancelled)
            .unwrap();
        assert!(h
            .queue
            .on_transaction_finished(a, ExecutionOutcome::Succeeded)
            .is_err());

        let terminal = h
            .notifier
            .statuses_for(&a)
            .into_iter()
            .filter(TransactionStatus::is_terminal)
            .count();
        assert_eq!(terminal, 1);
    }

    // =========================================================================
    // SHUTDOWN TESTS
    // =========================================================================

    #[test]
    fn test_try_stop_refused_while_work_exists() {
        let h = harness();
        let a = h.queue.enqueue(create_tx("s1"));
        assert!(!h.queue.try_stop());

        h.queue
            .on_transaction_finished(a, ExecutionOutcome::Succeeded)
            .unwrap();
        h.backend.set_busy(true);
        assert!(!h.queue.try_stop());
        assert!(!h.backend.quit_requested());
    }

    #[test]
    fn test_enqueue_after_stop_fails_without_dispatch() {
        let h = harness();
        assert!(h.queue.try_stop());
        assert!(h.backend.quit_requested());

        let late = h.queue.enqueue(create_tx("s1"));

        let snapshot = h.queue.get(&late).unwrap();
        assert_eq!(snapshot.status, TransactionStatus::Failed);
        assert_eq!(
            snapshot.error.unwrap().kind,
            ExecutionErrorKind::ServiceStopping
        );
        assert!(h.backend.dispatched_ids().is_empty());
        assert!(h.queue.is_empty());
    }

    // =========================================================================
    // HISTORY TESTS
    // =========================================================================

    #[test]
    fn test_history_is_bounded() {
        let h = harness_with(QueueConfig {
            finished_history: 2,
        });
        let mut ids = Vec::new();
        for _ in 0..3 {
            let id = h.queue.enqueue(create_tx("s1"));
            h.time.advance(10);
            h.queue
                .on_transaction_finished(id, ExecutionOutcome::Succeeded)
                .unwrap();
            ids.push(id);
        }

        assert!(h.queue.get(&ids[0]).is_none());
        assert!(h.queue.get(&ids[1]).is_some());
        assert_eq!(h.queue.get(&ids[2]).unwrap().finished_at, Some(1_030));
    }
}
