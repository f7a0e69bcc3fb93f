//! pw-ctl: Package Worker Control
//!
//! Client side of the worker socket protocol, used by the `pw-ctl` binary.
//!
//! ```text
//! pw-ctl ──Envelope<WorkerRequest>──→ worker.sock
//!        ←──ServerFrame (responses + notifications)──
//! ```

pub mod client;
pub mod instructions;

pub use client::{ClientError, WorkerClient};
pub use instructions::parse_instructions;
