//! # Activity Tracker
//!
//! The two backend signals the idle supervisor reads from another thread.
//! Each is a single atomic, so a reader never sees a half-written value.
//!
//! `last_active_ms` moves at job start, on every progress report and at job
//! end. `busy` is true from job start to job end.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use pw_01_transaction_queue::TimeSource;
use shared_types::Timestamp;

pub struct ActivityTracker {
    last_active_ms: AtomicU64,
    busy: AtomicBool,
    time: Arc<dyn TimeSource>,
}

impl ActivityTracker {
    /// Creation counts as activity, so a fresh service is not idle.
    pub fn new(time: Arc<dyn TimeSource>) -> Self {
        Self {
            last_active_ms: AtomicU64::new(time.now()),
            busy: AtomicBool::new(false),
            time,
        }
    }

    pub fn begin(&self) {
        self.busy.store(true, Ordering::SeqCst);
        self.touch();
    }

    pub fn touch(&self) {
        self.last_active_ms.fetch_max(self.time.now(), Ordering::SeqCst);
    }

    pub fn end(&self) {
        self.touch();
        self.busy.store(false, Ordering::SeqCst);
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    pub fn last_active_ms(&self) -> Timestamp {
        self.last_active_ms.load(Ordering::SeqCst)
    }
}
