//! Queue wired to a real executor thread, with a gated engine so tests
//! decide when each job completes.

use std::sync::mpsc as std_mpsc;
use std::sync::Arc;
use std::time::Duration;

use pw_01_transaction_queue::ports::testing::{MockTimeSource, RecordingNotifier};
use pw_01_transaction_queue::{
    ExecutionBackend, IdleSupervisor, QueueConfig, TimeSource, Transaction, TransactionQueue,
};
use pw_02_execution_backend::{
    spawn_backend, EngineError, ExecutionContext, PackageEngine, WorkerHandle,
};
use shared_types::{
    CallerIdentity, ExecutionJob, SessionId, TransactionId, TransactionProgress,
    TransactionRequest, Uid,
};
use tokio::task::JoinHandle;
use worker_runtime::handlers::BackendReportHandler;

/// Start of mock time.
pub const T0: u64 = 1_000_000;

/// How long `wait_until` polls before failing the test.
const WAIT_LIMIT: Duration = Duration::from_secs(5);

/// Engine that reports 50% and then blocks until released or cancelled.
fn gated_engine(release: std_mpsc::Receiver<()>) -> Box<dyn PackageEngine> {
    Box::new(
        move |_job: &ExecutionJob, ctx: &mut ExecutionContext| -> Result<(), EngineError> {
            ctx.report_progress(TransactionProgress::new(50));
            loop {
                ctx.checkpoint()?;
                match release.recv_timeout(Duration::from_millis(5)) {
                    Ok(()) | Err(std_mpsc::RecvTimeoutError::Disconnected) => return Ok(()),
                    Err(std_mpsc::RecvTimeoutError::Timeout) => continue,
                }
            }
        },
    )
}

pub struct Harness {
    pub queue: Arc<TransactionQueue>,
    pub backend: Arc<WorkerHandle>,
    pub notifier: Arc<RecordingNotifier>,
    pub time: Arc<MockTimeSource>,
    release: std_mpsc::Sender<()>,
    pump: JoinHandle<()>,
}

impl Harness {
    /// Harness around the gated engine.
    pub fn new() -> Self {
        let (release, gate) = std_mpsc::channel();
        Self::build(gated_engine(gate), release)
    }

    /// Harness around any engine. `release_one` is meaningless here.
    pub fn with_engine(engine: Box<dyn PackageEngine>) -> Self {
        let (release, _) = std_mpsc::channel();
        Self::build(engine, release)
    }

    fn build(engine: Box<dyn PackageEngine>, release: std_mpsc::Sender<()>) -> Self {
        let time = Arc::new(MockTimeSource::new(T0));
        let notifier = Arc::new(RecordingNotifier::new());

        let (handle, reports) = spawn_backend(engine, time.clone()).unwrap();
        let backend = Arc::new(handle);
        let queue = Arc::new(TransactionQueue::new(
            QueueConfig::default(),
            backend.clone(),
            notifier.clone(),
            time.clone(),
        ));
        let pump = tokio::spawn(BackendReportHandler::new(reports, queue.clone()).run());

        Self {
            queue,
            backend,
            notifier,
            time,
            release,
            pump,
        }
    }

    pub fn submit(&self, uid: Uid, session: &str, request: TransactionRequest) -> TransactionId {
        let caller = CallerIdentity::new(uid, SessionId::new(session));
        self.queue
            .enqueue(Transaction::new(caller, request, self.time.now()))
    }

    /// Let the job currently blocked in the engine complete.
    pub fn release_one(&self) {
        self.release.send(()).unwrap();
    }

    pub fn supervisor(&self, threshold_ms: u64) -> IdleSupervisor {
        IdleSupervisor::new(
            self.queue.clone(),
            self.backend.clone(),
            self.time.clone(),
            threshold_ms,
        )
    }

    /// Polls `condition` until it holds, panicking after a few seconds.
    pub async fn wait_until<F>(&self, what: &str, condition: F)
    where
        F: Fn(&Self) -> bool,
    {
        let deadline = tokio::time::Instant::now() + WAIT_LIMIT;
        while !condition(self) {
            assert!(
                tokio::time::Instant::now() < deadline,
                "timed out waiting for {what}"
            );
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    }

    /// Waits until nothing is queued and the executor is not working.
    pub async fn wait_drained(&self) {
        self.wait_until("queue drained", |h| {
            h.queue.is_empty() && !h.backend.is_busy()
        })
        .await;
    }

    /// Stops the queue and waits for the executor thread to exit.
    pub async fn stop(self) {
        assert!(self.queue.try_stop(), "queue refused to stop");
        self.pump.await.unwrap();
        let backend = self.backend.clone();
        let joined = tokio::task::spawn_blocking(move || backend.join())
            .await
            .unwrap();
        assert!(joined);
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}
