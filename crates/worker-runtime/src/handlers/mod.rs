//! # Background Handlers
//!
//! Long-running tasks spawned by the runtime.
//!
//! - `reports`: applies backend reports to the queue
//! - `idle`: periodic idle supervision

pub mod idle;
pub mod reports;

pub use idle::IdleTimer;
pub use reports::BackendReportHandler;
