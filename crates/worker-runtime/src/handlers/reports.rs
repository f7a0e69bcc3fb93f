//! # Backend Report Handler
//!
//! Drains the executor's report channel and applies each report to the
//! queue. This is the only path by which a running transaction progresses
//! or finishes, so the slot is freed exactly once per dispatched job.
//!
//! ```text
//! executor thread ──BackendReport──→ BackendReportHandler ──→ TransactionQueue
//!                                                              (on_progress /
//!                                                               on_transaction_finished)
//! ```

use std::sync::Arc;

use pw_01_transaction_queue::TransactionQueue;
use pw_02_execution_backend::BackendReport;
use shared_types::{ExecutionOutcome, TransactionId};
use tokio::sync::mpsc;
use tracing::{debug, error, info};
use worker_telemetry::{metric_inc, metric_observe, TRANSACTIONS_COMPLETED, TRANSACTION_DURATION};

use crate::service::record_queue_depth;

pub struct BackendReportHandler {
    reports: mpsc::UnboundedReceiver<BackendReport>,
    queue: Arc<TransactionQueue>,
}

impl BackendReportHandler {
    pub fn new(
        reports: mpsc::UnboundedReceiver<BackendReport>,
        queue: Arc<TransactionQueue>,
    ) -> Self {
        Self { reports, queue }
    }

    /// Runs until the executor reports `Stopped` or the channel closes.
    pub async fn run(mut self) {
        while let Some(report) = self.reports.recv().await {
            match report {
                BackendReport::Progress { id, progress } => {
                    if let Err(e) = self.queue.on_progress(id, progress) {
                        debug!(tx_id = %id, error = %e, "Progress report dropped");
                    }
                }
                BackendReport::Finished { id, outcome } => self.finish(id, outcome),
                BackendReport::Stopped => {
                    info!("Execution backend stopped");
                    return;
                }
            }
        }
        error!("Backend report channel closed without a stop report");
    }

    fn finish(&self, id: TransactionId, outcome: ExecutionOutcome) {
        match self.queue.on_transaction_finished(id, outcome) {
            Ok(status) => {
                metric_inc!(TRANSACTIONS_COMPLETED, &[status.as_str()]);
                if let Some(snapshot) = self.queue.get(&id) {
                    if let (Some(start), Some(end)) = (snapshot.started_at, snapshot.finished_at) {
                        let secs = end.saturating_sub(start) as f64 / 1000.0;
                        metric_observe!(TRANSACTION_DURATION, &[snapshot.role().as_str()], secs);
                    }
                }
                record_queue_depth(&self.queue);
            }
            Err(e) => error!(tx_id = %id, error = %e, "Completion report rejected"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pw_01_transaction_queue::ports::testing::{FakeBackend, MockTimeSource, RecordingNotifier};
    use pw_01_transaction_queue::{QueueConfig, Transaction};
    use shared_types::{
        CallerIdentity, SessionId, TransactionProgress, TransactionRequest, TransactionStatus,
    };

    fn queue() -> Arc<TransactionQueue> {
        Arc::new(TransactionQueue::new(
            QueueConfig::default(),
            Arc::new(FakeBackend::new()),
            Arc::new(RecordingNotifier::new()),
            Arc::new(MockTimeSource::new(0)),
        ))
    }

    fn submit(queue: &TransactionQueue) -> TransactionId {
        let caller = CallerIdentity::new(1000, SessionId::new("s"));
        queue.enqueue(Transaction::new(caller, TransactionRequest::UpdateCache, 0))
    }

    #[tokio::test]
    async fn test_reports_drive_queue() {
        let queue = queue();
        let first = submit(&queue);
        let second = submit(&queue);
        let (tx, rx) = mpsc::unbounded_channel();

        tx.send(BackendReport::Progress {
            id: first,
            progress: TransactionProgress::new(50),
        })
        .unwrap();
        tx.send(BackendReport::Finished {
            id: first,
            outcome: ExecutionOutcome::Succeeded,
        })
        .unwrap();
        tx.send(BackendReport::Stopped).unwrap();

        BackendReportHandler::new(rx, queue.clone()).run().await;

        let done = queue.get(&first).unwrap();
        assert_eq!(done.status, TransactionStatus::Finished);
        assert_eq!(done.progress.percentage, 100);
        assert_eq!(queue.running(), Some(second));
    }

    #[tokio::test]
    async fn test_stray_reports_do_not_stop_handler() {
        let queue = queue();
        let (tx, rx) = mpsc::unbounded_channel();

        tx.send(BackendReport::Finished {
            id: TransactionId::new(),
            outcome: ExecutionOutcome::Cancelled,
        })
        .unwrap();
        drop(tx);

        // Returns once the channel closes
        BackendReportHandler::new(rx, queue.clone()).run().await;
        assert!(queue.is_empty());
    }
}
