//! # Worker Telemetry
//!
//! Logging and metrics for the package worker.
//!
//! ## Components
//!
//! - **Logging**: `tracing` with an `EnvFilter`, human or JSON output
//! - **Metrics**: Prometheus counters, gauges and histograms in a global
//!   registry, exposed through the `GetMetrics` request
//!
//! ## Usage
//!
//! ```rust,ignore
//! use worker_telemetry::{init_telemetry, TelemetryConfig};
//!
//! fn main() {
//!     let _guard = init_telemetry(TelemetryConfig::from_env()).expect("telemetry");
//!     // Logs and metrics are now being collected
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `PW_SERVICE_NAME` | `package-worker` | Service name in logs |
//! | `PW_LOG_LEVEL` | `info` | Log level filter (falls back to `RUST_LOG`) |
//! | `PW_CONSOLE_OUTPUT` | `true` | Write logs to stdout |
//! | `PW_JSON_LOGS` | `false` | JSON lines instead of human output |

mod config;
mod logging;
pub mod metrics;

pub use config::TelemetryConfig;
pub use logging::init_logging;
pub use metrics::{
    encode_metrics, register_metrics, HistogramTimer, AUTHORIZATION_DENIALS, IDLE_CHECKS,
    IDLE_CHECK_DURATION, QUEUE_DEPTH, SESSIONS_CONNECTED, TRANSACTIONS_ADMITTED,
    TRANSACTIONS_COMPLETED, TRANSACTION_DURATION,
};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Initialize logging and metrics.
///
/// Returns a guard that should be held for the lifetime of the process.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    // Metrics first so nothing logged during startup is missed by counters
    register_metrics()?;

    init_logging(&config)?;

    tracing::info!(
        service = %config.service_name,
        json_logs = config.json_logs,
        "Telemetry initialized"
    );

    Ok(TelemetryGuard {
        service_name: config.service_name,
    })
}

/// Guard that keeps telemetry active.
pub struct TelemetryGuard {
    service_name: String,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!(service = %self.service_name, "Shutting down telemetry...");
    }
}

/// Convenience macro for recording a metric increment.
#[macro_export]
macro_rules! metric_inc {
    ($metric:expr) => {
        $metric.inc()
    };
    ($metric:expr, $labels:expr) => {
        $metric.with_label_values($labels).inc()
    };
}

/// Convenience macro for recording a metric with a value.
#[macro_export]
macro_rules! metric_observe {
    ($metric:expr, $value:expr) => {
        $metric.observe($value)
    };
    ($metric:expr, $labels:expr, $value:expr) => {
        $metric.with_label_values($labels).observe($value)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_macros() {
        metric_inc!(TRANSACTIONS_COMPLETED, &["finished"]);
        metric_observe!(TRANSACTION_DURATION, &["update-cache"], 0.25);
        assert!(TRANSACTIONS_COMPLETED.with_label_values(&["finished"]).get() >= 1.0);
    }
}
