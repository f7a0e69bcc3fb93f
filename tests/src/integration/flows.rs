//! # Dispatch Flows
//!
//! The transaction queue driving the real executor thread:
//!
//! 1. FIFO dispatch over a single slot, with queue notifications
//! 2. Progress flowing back from the engine into transaction state
//! 3. Cancellation of queued and running work
//! 4. Engine failures surfacing as `Failed` with their detail

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use pw_01_transaction_queue::CancelOutcome;
    use pw_02_execution_backend::SimulatedEngine;
    use shared_bus::WorkerEvent;
    use shared_types::{
        ExecutionError, ExecutionErrorKind, SessionId, TransactionRequest, TransactionRole,
        TransactionStatus::{Cancelled, Failed, Finished, Queued, Running},
    };

    use crate::integration::harness::Harness;

    // =========================================================================
    // ORDERING
    // =========================================================================

    #[tokio::test]
    async fn test_fifo_dispatch_through_single_slot() {
        let h = Harness::new();
        let a = h.submit(1000, ":1.1", TransactionRequest::UpdateCache);
        let b = h.submit(1001, ":1.2", TransactionRequest::UpgradeSystem { safe: true });
        let c = h.submit(1000, ":1.1", TransactionRequest::UpdateCache);

        assert_eq!(h.queue.running(), Some(a));

        h.release_one();
        h.wait_until("b running", |h| h.queue.running() == Some(b)).await;
        h.release_one();
        h.wait_until("c running", |h| h.queue.running() == Some(c)).await;
        h.release_one();
        h.wait_drained().await;

        assert_eq!(
            h.notifier.queue_snapshots(),
            vec![
                vec![a],
                vec![a, b],
                vec![a, b, c],
                vec![b, c],
                vec![c],
                vec![],
            ]
        );
        for id in [a, b, c] {
            assert_eq!(h.notifier.statuses_for(&id), vec![Queued, Running, Finished]);
        }

        h.stop().await;
    }

    #[tokio::test]
    async fn test_second_submission_waits_for_first() {
        let h = Harness::new();
        let a = h.submit(1000, ":1.1", TransactionRequest::UpdateCache);
        let b = h.submit(1000, ":1.1", TransactionRequest::UpdateCache);

        h.wait_until("a progress", |h| {
            h.queue.get(&a).map(|s| s.progress.percentage) == Some(50)
        })
        .await;

        // b stays queued while a holds the slot
        let snapshot = h.queue.get(&b).unwrap();
        assert_eq!(snapshot.status, Queued);
        assert!(snapshot.started_at.is_none());
        assert_eq!(h.queue.snapshot().active, Some(a));

        h.release_one();
        h.release_one();
        h.wait_drained().await;
        h.stop().await;
    }

    // =========================================================================
    // PROGRESS
    // =========================================================================

    #[tokio::test]
    async fn test_progress_reaches_submitting_session() {
        let h = Harness::new();
        let a = h.submit(1000, ":1.7", TransactionRequest::UpdateCache);

        h.wait_until("progress event", |h| {
            h.notifier
                .events()
                .iter()
                .any(|e| matches!(e, WorkerEvent::TransactionProgress { .. }))
        })
        .await;

        let progress: Vec<_> = h
            .notifier
            .events()
            .into_iter()
            .filter_map(|e| match e {
                WorkerEvent::TransactionProgress { id, session, progress } => {
                    Some((id, session, progress.percentage))
                }
                _ => None,
            })
            .collect();
        assert_eq!(progress, vec![(a, SessionId::new(":1.7"), 50)]);

        h.release_one();
        h.wait_drained().await;

        let done = h.queue.get(&a).unwrap();
        assert_eq!(done.status, Finished);
        assert_eq!(done.progress.percentage, 100);
        h.stop().await;
    }

    // =========================================================================
    // CANCELLATION
    // =========================================================================

    #[tokio::test]
    async fn test_cancel_queued_never_reaches_engine() {
        let h = Harness::new();
        let a = h.submit(1000, ":1.1", TransactionRequest::UpdateCache);
        let b = h.submit(1000, ":1.1", TransactionRequest::UpdateCache);

        assert_eq!(h.queue.remove(b).unwrap(), CancelOutcome::Removed);
        assert_eq!(h.notifier.statuses_for(&b), vec![Queued, Cancelled]);

        h.release_one();
        h.wait_drained().await;

        assert_eq!(
            h.notifier.queue_snapshots(),
            vec![vec![a], vec![a, b], vec![a], vec![]]
        );
        h.stop().await;
    }

    #[tokio::test]
    async fn test_cancel_running_stops_engine_and_dispatches_next() {
        let h = Harness::new();
        let a = h.submit(1000, ":1.1", TransactionRequest::UpdateCache);
        let b = h.submit(1000, ":1.1", TransactionRequest::UpdateCache);

        assert_eq!(h.queue.remove(a).unwrap(), CancelOutcome::Requested);
        h.wait_until("b running", |h| h.queue.running() == Some(b)).await;

        assert_eq!(h.notifier.statuses_for(&a), vec![Queued, Running, Cancelled]);
        assert_eq!(h.queue.get(&a).unwrap().status, Cancelled);

        h.release_one();
        h.wait_drained().await;
        assert_eq!(h.notifier.statuses_for(&b), vec![Queued, Running, Finished]);
        h.stop().await;
    }

    // =========================================================================
    // FAILURES
    // =========================================================================

    #[tokio::test]
    async fn test_engine_failure_is_reported_and_queue_moves_on() {
        let error = ExecutionError::new(ExecutionErrorKind::FetchFailed, "mirror unreachable");
        let engine = SimulatedEngine::new(Duration::from_millis(1))
            .with_failure(TransactionRole::DownloadArchives, error.clone());
        let h = Harness::with_engine(Box::new(engine));

        let a = h.submit(
            1000,
            ":1.1",
            TransactionRequest::download_archives(["hello"], "/tmp/archives"),
        );
        let b = h.submit(1000, ":1.1", TransactionRequest::UpdateCache);
        h.wait_drained().await;

        let failed = h.queue.get(&a).unwrap();
        assert_eq!(failed.status, Failed);
        assert_eq!(failed.error, Some(error));
        assert_eq!(h.notifier.statuses_for(&a), vec![Queued, Running, Failed]);
        assert_eq!(h.queue.get(&b).unwrap().status, Finished);
        h.stop().await;
    }

    #[tokio::test]
    async fn test_invalid_parameters_fail_before_work() {
        let engine = SimulatedEngine::new(Duration::from_millis(1));
        let h = Harness::with_engine(Box::new(engine));

        let a = h.submit(
            1000,
            ":1.1",
            TransactionRequest::InstallFile { path: "".into() },
        );
        h.wait_drained().await;

        let failed = h.queue.get(&a).unwrap();
        assert_eq!(failed.status, Failed);
        assert_eq!(
            failed.error.map(|e| e.kind),
            Some(ExecutionErrorKind::InvalidParameters)
        );
        h.stop().await;
    }
}
