//! # Publishing Side
//!
//! The queue emits while holding its own lock, so `publish` must never
//! block or await. Every subscriber owns an unbounded `mpsc` queue and the
//! bus routes at publish time: an event is pushed only onto the queues whose
//! filter accepts it. One session's progress flood therefore never displaces
//! another session's status changes, and nothing a subscriber was meant to
//! see is dropped.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::trace;

use crate::events::{EventFilter, WorkerEvent};
use crate::subscriber::EventStream;

/// Sink for worker events.
pub trait EventPublisher: Send + Sync {
    /// Route `event` to every subscriber whose filter accepts it. Returns
    /// how many it was queued for; zero when nobody wants it.
    fn publish(&self, event: WorkerEvent) -> usize;
}

/// Publish counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BusStats {
    pub published: u64,
    /// Events no subscriber accepted.
    pub undelivered: u64,
}

struct Route {
    filter: EventFilter,
    sender: mpsc::UnboundedSender<WorkerEvent>,
}

/// Routing bus living inside the worker process.
pub struct InMemoryEventBus {
    routes: Mutex<Vec<Route>>,
    published: AtomicU64,
    undelivered: AtomicU64,
}

impl InMemoryEventBus {
    #[must_use]
    pub fn new() -> Self {
        Self {
            routes: Mutex::new(Vec::new()),
            published: AtomicU64::new(0),
            undelivered: AtomicU64::new(0),
        }
    }

    /// Events published from now on that pass `filter`. Dropping the
    /// stream unsubscribes.
    #[must_use]
    pub fn subscribe(&self, filter: EventFilter) -> EventStream {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.routes.lock().push(Route {
            filter: filter.clone(),
            sender,
        });
        EventStream::new(receiver, filter)
    }

    /// Live subscribers, whatever their filter.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        let mut routes = self.routes.lock();
        routes.retain(|route| !route.sender.is_closed());
        routes.len()
    }

    #[must_use]
    pub fn stats(&self) -> BusStats {
        BusStats {
            published: self.published.load(Ordering::Relaxed),
            undelivered: self.undelivered.load(Ordering::Relaxed),
        }
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventPublisher for InMemoryEventBus {
    fn publish(&self, event: WorkerEvent) -> usize {
        self.published.fetch_add(1, Ordering::Relaxed);
        let topic = event.topic();

        let mut routes = self.routes.lock();
        routes.retain(|route| !route.sender.is_closed());
        let receivers = routes
            .iter()
            .filter(|route| route.filter.matches(&event))
            .filter(|route| route.sender.send(event.clone()).is_ok())
            .count();
        drop(routes);

        if receivers == 0 {
            self.undelivered.fetch_add(1, Ordering::Relaxed);
        }
        trace!(?topic, receivers, "Published");
        receivers
    }
}
