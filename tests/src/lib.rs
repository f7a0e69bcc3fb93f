//! # Package Worker Test Suite
//!
//! Cross-crate tests that wire the real execution backend to the
//! transaction queue, below the socket layer.
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── src/integration/
//! │   ├── harness.rs    # Queue + executor thread + report pump
//! │   ├── flows.rs      # Dispatch, cancellation, notification order
//! │   └── shutdown.rs   # Idle supervision and stop races
//! └── benches/          # Queue throughput
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p pw-tests
//! cargo bench -p pw-tests
//! ```

pub mod integration;
