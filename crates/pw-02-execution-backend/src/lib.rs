//! # Execution Backend Subsystem
//!
//! **Subsystem ID:** 2
//!
//! ## Purpose
//!
//! The single execution slot. One dedicated OS thread owns the package
//! engine and runs exactly one job at a time; the queue talks to it through
//! [`WorkerHandle`], which implements the queue's `ExecutionBackend` port.
//!
//! ## Guarantees
//!
//! | Guarantee | Enforcement Location |
//! |-----------|---------------------|
//! | One job at a time | `service.rs` - single thread, sequential loop |
//! | Slot always freed | `service.rs` - `catch_unwind` around the engine |
//! | Cancellation reaches queued and running jobs | `service.rs` - flag created at dispatch |
//! | Consistent activity reads | `domain/activity.rs` - one atomic per signal |
//! | Quit never drops work | `service.rs` - Quit ignored while Execute is pending |
//!
//! ## Outcome Mapping
//!
//! | Engine result | Outcome |
//! |---------------|---------|
//! | `Ok(())` | `Succeeded` → Finished |
//! | `Err(EngineError::Failed(e))` | `Failed(e)` → Failed |
//! | `Err(EngineError::Cancelled)` | `Cancelled` → Cancelled |
//! | panic | `Failed(Internal)` → Failed |

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

pub use adapters::SimulatedEngine;
pub use domain::*;
pub use ports::{ExecutionContext, PackageEngine};
pub use service::{spawn_backend, WorkerHandle};
