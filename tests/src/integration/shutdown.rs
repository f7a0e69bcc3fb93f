//! # Idle Shutdown
//!
//! Idle supervision against the real executor's activity signals, and the
//! stop handshake between queue and executor thread.

#[cfg(test)]
mod tests {
    use pw_01_transaction_queue::IdleDecision;
    use shared_types::{ExecutionErrorKind, TransactionRequest, TransactionStatus};

    use crate::integration::harness::{Harness, T0};

    #[tokio::test]
    async fn test_running_job_keeps_worker_busy() {
        let h = Harness::new();
        let a = h.submit(1000, ":1.1", TransactionRequest::UpdateCache);
        h.wait_until("a progress", |h| {
            h.queue.get(&a).map(|s| s.progress.percentage) == Some(50)
        })
        .await;

        let supervisor = h.supervisor(100);
        h.time.advance(10_000);
        assert_eq!(supervisor.check(), IdleDecision::Busy);
        assert!(!h.queue.is_stopped());

        h.release_one();
        h.wait_drained().await;
        h.stop().await;
    }

    #[tokio::test]
    async fn test_threshold_is_strict() {
        let h = Harness::new();
        let supervisor = h.supervisor(100);

        h.time.set(T0 + 100);
        assert_eq!(supervisor.check(), IdleDecision::Recent { idle_ms: 100 });

        h.time.set(T0 + 101);
        assert_eq!(supervisor.check(), IdleDecision::Shutdown { idle_ms: 101 });
        assert!(h.queue.is_stopped());

        h.stop().await;
    }

    #[tokio::test]
    async fn test_job_end_refreshes_last_activity() {
        let h = Harness::new();
        let a = h.submit(1000, ":1.1", TransactionRequest::UpdateCache);
        h.wait_until("a progress", |h| {
            h.queue.get(&a).map(|s| s.progress.percentage) == Some(50)
        })
        .await;

        h.time.set(T0 + 1_000);
        h.release_one();
        h.wait_drained().await;

        h.time.set(T0 + 1_050);
        let supervisor = h.supervisor(100);
        assert_eq!(supervisor.check(), IdleDecision::Recent { idle_ms: 50 });

        h.time.set(T0 + 1_101);
        assert!(supervisor.check().is_shutdown());
        h.stop().await;
    }

    #[tokio::test]
    async fn test_stop_refused_while_work_pending() {
        let h = Harness::new();
        h.submit(1000, ":1.1", TransactionRequest::UpdateCache);

        assert!(!h.queue.try_stop());
        assert!(!h.queue.is_stopped());

        h.release_one();
        h.wait_drained().await;
        h.stop().await;
    }

    #[tokio::test]
    async fn test_submission_after_stop_fails_with_service_stopping() {
        let h = Harness::new();
        h.time.set(T0 + 500);
        assert!(h.supervisor(100).check().is_shutdown());

        let late = h.submit(1000, ":1.1", TransactionRequest::UpdateCache);

        assert_eq!(h.notifier.statuses_for(&late), vec![TransactionStatus::Failed]);
        let snapshot = h.queue.get(&late).unwrap();
        assert_eq!(
            snapshot.error.map(|e| e.kind),
            Some(ExecutionErrorKind::ServiceStopping)
        );
        assert!(h.queue.is_empty());

        h.stop().await;
    }
}
