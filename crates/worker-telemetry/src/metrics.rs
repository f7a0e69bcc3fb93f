//! Prometheus metrics for the package worker.
//!
//! All metrics follow the naming convention: `pw_<metric>_<unit>`
//!
//! ## Metric Types
//!
//! - **Counter**: Monotonically increasing value (e.g., transactions_admitted_total)
//! - **Gauge**: Value that can go up or down (e.g., queue_depth)
//! - **Histogram**: Distribution of values (e.g., transaction_duration_seconds)

use lazy_static::lazy_static;
use prometheus::{
    CounterVec, Encoder, Gauge, Histogram, HistogramOpts, HistogramVec, Opts, Registry,
    TextEncoder,
};

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // TRANSACTION QUEUE
    // =========================================================================

    /// Transactions admitted, by role
    pub static ref TRANSACTIONS_ADMITTED: CounterVec = CounterVec::new(
        Opts::new("pw_transactions_admitted_total", "Transactions admitted into the queue"),
        &["role"]
    ).expect("metric creation failed");

    /// Transactions that reached a terminal state, by final status
    pub static ref TRANSACTIONS_COMPLETED: CounterVec = CounterVec::new(
        Opts::new("pw_transactions_completed_total", "Transactions that reached a terminal state"),
        &["status"]  // status: finished/failed/cancelled
    ).expect("metric creation failed");

    /// Queued plus running transactions
    pub static ref QUEUE_DEPTH: Gauge = Gauge::new(
        "pw_queue_depth",
        "Number of queued and running transactions"
    ).expect("metric creation failed");

    /// Wall time from dispatch to completion
    pub static ref TRANSACTION_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "pw_transaction_duration_seconds",
            "Time spent executing transactions"
        ).buckets(vec![0.1, 0.5, 1.0, 5.0, 15.0, 60.0, 300.0, 900.0, 3600.0]),
        &["role"]
    ).expect("metric creation failed");

    // =========================================================================
    // ADMISSION
    // =========================================================================

    /// Authorization denials, by action id
    pub static ref AUTHORIZATION_DENIALS: CounterVec = CounterVec::new(
        Opts::new("pw_authorization_denials_total", "Requests denied by the authorization service"),
        &["action"]
    ).expect("metric creation failed");

    /// Connected client sessions
    pub static ref SESSIONS_CONNECTED: Gauge = Gauge::new(
        "pw_sessions_connected",
        "Number of currently connected client sessions"
    ).expect("metric creation failed");

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Idle supervisor evaluations, by decision
    pub static ref IDLE_CHECKS: CounterVec = CounterVec::new(
        Opts::new("pw_idle_checks_total", "Idle supervisor evaluations"),
        &["decision"]  // decision: busy/recent/shutdown
    ).expect("metric creation failed");

    /// Wall time of a single idle check, used for alerting on a stuck lock
    pub static ref IDLE_CHECK_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "pw_idle_check_duration_seconds",
            "Time spent evaluating the idle condition"
        ).buckets(vec![0.00001, 0.0001, 0.001, 0.01, 0.1])
    ).expect("metric creation failed");
}

/// Register all metrics with the global registry.
///
/// Calling this more than once is harmless.
pub fn register_metrics() -> Result<(), TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // Queue
        Box::new(TRANSACTIONS_ADMITTED.clone()),
        Box::new(TRANSACTIONS_COMPLETED.clone()),
        Box::new(QUEUE_DEPTH.clone()),
        Box::new(TRANSACTION_DURATION.clone()),
        // Admission
        Box::new(AUTHORIZATION_DENIALS.clone()),
        Box::new(SESSIONS_CONNECTED.clone()),
        // Lifecycle
        Box::new(IDLE_CHECKS.clone()),
        Box::new(IDLE_CHECK_DURATION.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }

    Ok(())
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Timer guard for automatic histogram observation.
pub struct HistogramTimer {
    histogram: Histogram,
    start: std::time::Instant,
}

impl HistogramTimer {
    /// Start a new timer for the given histogram.
    pub fn new(histogram: &Histogram) -> Self {
        Self {
            histogram: histogram.clone(),
            start: std::time::Instant::now(),
        }
    }
}

impl Drop for HistogramTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        self.histogram.observe(duration);
    }
}

/// Start timing for a histogram. Observation happens on drop.
#[macro_export]
macro_rules! time_histogram {
    ($histogram:expr) => {
        $crate::metrics::HistogramTimer::new(&$histogram)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_metrics_twice() {
        assert!(register_metrics().is_ok());
        assert!(register_metrics().is_ok());
    }

    #[test]
    fn test_counter_increment() {
        TRANSACTIONS_ADMITTED
            .with_label_values(&["update-cache"])
            .inc();
        assert!(
            TRANSACTIONS_ADMITTED
                .with_label_values(&["update-cache"])
                .get()
                >= 1.0
        );
    }

    #[test]
    fn test_encode_contains_registered_metric() {
        register_metrics().unwrap();
        IDLE_CHECKS.with_label_values(&["busy"]).inc();

        let text = encode_metrics().unwrap();
        assert!(text.contains("pw_idle_checks_total"));
    }

    #[test]
    fn test_histogram_timer() {
        let _timer = HistogramTimer::new(&IDLE_CHECK_DURATION);
        std::thread::sleep(std::time::Duration::from_millis(1));
        // Timer observes on drop
    }
}
