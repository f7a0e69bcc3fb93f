//! # Domain Layer - Execution Backend Subsystem
//!
//! ## Components
//!
//! - `activity`: ActivityTracker (last-active timestamp, busy flag)
//! - `report`: WorkerCommand and BackendReport channel messages
//! - `errors`: EngineError, BackendError

pub mod activity;
pub mod errors;
pub mod report;

pub use activity::*;
pub use errors::*;
pub use report::*;
