//! # Receiving Side
//!
//! [`EventStream`] is one subscriber's queue. It can be awaited directly
//! with `recv`/`try_recv` or polled as a `Stream` inside `select!` loops
//! such as the per-connection writer. Filtering already happened at
//! publish time, so everything queued here is meant for this subscriber.

use std::pin::Pin;
use std::task::{Context, Poll};

use thiserror::Error;
use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio_stream::Stream;

use crate::events::{EventFilter, WorkerEvent};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    /// The bus is gone; no event will ever arrive.
    #[error("event bus closed")]
    Closed,
}

/// A subscriber's own ordered event queue.
pub struct EventStream {
    receiver: mpsc::UnboundedReceiver<WorkerEvent>,
    filter: EventFilter,
}

impl EventStream {
    pub(crate) fn new(receiver: mpsc::UnboundedReceiver<WorkerEvent>, filter: EventFilter) -> Self {
        Self { receiver, filter }
    }

    /// Next event, or `None` once the bus is dropped and the queue drained.
    pub async fn recv(&mut self) -> Option<WorkerEvent> {
        self.receiver.recv().await
    }

    /// Next event if one is already queued.
    pub fn try_recv(&mut self) -> Result<Option<WorkerEvent>, SubscriptionError> {
        match self.receiver.try_recv() {
            Ok(event) => Ok(Some(event)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(SubscriptionError::Closed),
        }
    }

    pub fn filter(&self) -> &EventFilter {
        &self.filter
    }
}

impl Stream for EventStream {
    type Item = WorkerEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<WorkerEvent>> {
        self.receiver.poll_recv(cx)
    }
}
