//! # Transaction Queue Subsystem
//!
//! **Subsystem ID:** 1
//!
//! ## Purpose
//!
//! Admits package-management transactions from many callers, serializes
//! them onto a single execution slot, tracks their state and decides when
//! the idle service may stop itself.
//!
//! ## Domain Invariants
//!
//! | Invariant | Enforcement Location |
//! |-----------|---------------------|
//! | At most one transaction Running | `domain/queue.rs` - `dispatch_next()` only fills an empty slot |
//! | FIFO dispatch | `domain/queue.rs` - `order` is a `VecDeque`, head only |
//! | No stranded queue | `domain/queue.rs` - every admit/finish path ends in `dispatch_next()` |
//! | No exit from terminal states | `domain/entities.rs` - `is_valid_transition()` |
//! | Authorization before side effects | `domain/admission.rs` - `guarded()` |
//! | Strict idle threshold | `domain/idle.rs` - `idle_ms > threshold` |
//!
//! ## Transaction Lifecycle
//!
//! ```text
//! [Queued] ──dispatch──→ [Running] ──success──→ [Finished]
//!    │                       ├──────error────→ [Failed]
//!    └──────cancel───────────┴─────cancel────→ [Cancelled]
//! ```
//!
//! | Stage | Method | Effect |
//! |-------|--------|--------|
//! | Admit | `queue.enqueue()` | Append, dispatch if idle, notify |
//! | Complete | `queue.on_transaction_finished()` | Terminal status, remove, dispatch next |
//! | Cancel | `queue.remove()` | Queued: remove now. Running: forward to backend |
//! | Stop | `queue.try_stop()` | Only when empty and idle |
//!
//! ## Outbound Dependencies
//!
//! | Collaborator | Trait | Purpose |
//! |--------------|-------|---------|
//! | Execution Backend | `ExecutionBackend` | Run one job at a time |
//! | Event bus | `QueueNotifier` | Queue and transaction notifications |
//! | Authorization service | `Authorizer` | Allow/deny guarded actions |
//! | Clock | `TimeSource` | Timestamps, idle computation |
//!
//! ## Module Structure (Hexagonal Architecture)
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      OUTER LAYER                                │
//! │  adapters/ - BusNotifier over shared-bus                        │
//! └─────────────────────────────────────────────────────────────────┘
//!                          ↑ implements ↑
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      MIDDLE LAYER                               │
//! │  ports/inbound.rs  - TransactionQueueApi trait                  │
//! │  ports/outbound.rs - ExecutionBackend, QueueNotifier,           │
//! │                      Authorizer, TimeSource                     │
//! └─────────────────────────────────────────────────────────────────┘
//!                          ↑ uses ↑
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      INNER LAYER                                │
//! │  domain/entities.rs  - Transaction state machine                │
//! │  domain/queue.rs     - TransactionQueue                         │
//! │  domain/idle.rs      - IdleSupervisor                           │
//! │  domain/admission.rs - AdmissionService                         │
//! │  domain/errors.rs    - QueueError, AdmissionError               │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod adapters;
pub mod domain;
pub mod ports;

pub use adapters::*;
pub use domain::*;
pub use ports::{
    Authorizer, ExecutionBackend, QueueNotifier, SystemTimeSource, TimeSource,
    TransactionQueueApi,
};
