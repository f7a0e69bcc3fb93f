//! # Worker Runtime Library
//!
//! The package worker daemon, exposed as a library for integration tests.
//! The entry point is the `pkg-worker` binary in `main.rs`.
//!
//! ## Components
//!
//! ```text
//!  Unix socket clients
//!          │  Envelope<WorkerRequest> / ServerFrame
//!          ▼
//! ┌──────────────────┐     ┌──────────────────┐     ┌────────────────────┐
//! │ transport        │ ──→ │ WorkerService    │ ──→ │ AdmissionService   │
//! │ (peer uid,       │     │ (facade, file    │     │ (pw-01)            │
//! │  session)        │     │  helpers)        │     └─────────┬──────────┘
//! └────────▲─────────┘     └──────────────────┘               │
//!          │ notifications                                     ▼
//! ┌────────┴─────────┐      BusNotifier         ┌────────────────────┐
//! │ InMemoryEventBus │ ←─────────────────────── │ TransactionQueue   │
//! └──────────────────┘                          └──▲──────────┬──────┘
//!                                                  │          │ dispatch
//!                      BackendReportHandler ───────┘          ▼
//!                              ▲                   ┌────────────────────┐
//!                              └── BackendReport ──│ executor (pw-02)   │
//!                                                  └────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - `config`: `WorkerConfig` from `PW_*` environment variables
//! - `lock`: single-instance registration
//! - `adapters`: policy authorizer, privileged file helpers
//! - `service`: request facade
//! - `transport`: Unix socket server
//! - `handlers`: report handler, idle timer
//! - `runtime`: wiring and shutdown

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod adapters;
pub mod config;
pub mod handlers;
pub mod lock;
pub mod runtime;
pub mod service;
pub mod transport;

pub use config::{ConfigError, WorkerConfig};
pub use lock::{InstanceLock, LockError};
pub use runtime::WorkerRuntime;
pub use service::WorkerService;
pub use transport::{SocketServer, TransportError};
