//! Prometheus metrics for lifecycle observability.
//!
//! The recorder is installed without its own listener; the rendered text is
//! served on `/metrics` of the application listener.
//!
//! # Available Metrics
//!
//! ## Counters
//! - `lifecycle_quit_triggers_total` - Quit transitions that took effect (label: cause = `clean` | `error`)
//! - `lifecycle_redundant_triggers_total` - Quit requests absorbed after the first
//!
//! ## Histograms
//! - `lifecycle_stop_duration_seconds` - Time spent stopping the server
//!
//! ## Gauges
//! - `lifecycle_shutting_down` - 1 once shutdown has begun, 0 before
//!
//! # Usage
//!
//! ```rust,ignore
//! use hash_service::metrics::init_metrics;
//!
//! // Initialize metrics (call once at startup)
//! let handle = init_metrics()?;
//! let app = Application::new(config).with_metrics(handle);
//! ```

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::{error, info};

/// Metric names as constants for consistency.
pub mod names {
    pub const QUIT_TRIGGERS_TOTAL: &str = "lifecycle_quit_triggers_total";
    pub const REDUNDANT_TRIGGERS_TOTAL: &str = "lifecycle_redundant_triggers_total";
    pub const STOP_DURATION_SECONDS: &str = "lifecycle_stop_duration_seconds";
    pub const SHUTTING_DOWN: &str = "lifecycle_shutting_down";
}

/// Install the global Prometheus recorder.
///
/// Can only succeed once per process.
///
/// # Returns
///
/// A handle used to render the current metrics, or `Err` with a message.
pub fn init_metrics() -> Result<PrometheusHandle, String> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))?;

    describe_counter!(
        names::QUIT_TRIGGERS_TOTAL,
        "Total number of quit transitions that took effect"
    );
    describe_counter!(
        names::REDUNDANT_TRIGGERS_TOTAL,
        "Total number of quit requests absorbed after shutdown began"
    );
    describe_histogram!(
        names::STOP_DURATION_SECONDS,
        "Time taken to stop the HTTP server in seconds"
    );
    describe_gauge!(
        names::SHUTTING_DOWN,
        "Whether shutdown has begun (1 = shutting down, 0 = running)"
    );
    gauge!(names::SHUTTING_DOWN).set(0.0);

    info!("Prometheus metrics recorder installed");
    Ok(handle)
}

/// Try to initialize metrics, logging any errors but not failing.
pub fn try_init_metrics() -> Option<PrometheusHandle> {
    init_metrics()
        .map_err(|e| error!(error = %e, "Failed to initialize metrics, continuing without metrics"))
        .ok()
}

/// Record the quit transition taking effect.
///
/// `cause` is `"clean"` for a quit without an error, whatever requested it,
/// and `"error"` otherwise.
pub fn record_quit_trigger(cause: &'static str) {
    counter!(names::QUIT_TRIGGERS_TOTAL, "cause" => cause).increment(1);
    gauge!(names::SHUTTING_DOWN).set(1.0);
}

/// Record a quit request that arrived after shutdown had already begun.
pub fn record_redundant_trigger() {
    counter!(names::REDUNDANT_TRIGGERS_TOTAL).increment(1);
}

/// Record how long the server stop sequence took.
pub fn record_stop_duration(duration_secs: f64) {
    histogram!(names::STOP_DURATION_SECONDS).record(duration_secs);
}

#[cfg(test)]
mod tests {
    use super::*;

    // These only check that recording without an installed recorder is a no-op.

    #[test]
    fn test_record_quit_trigger() {
        record_quit_trigger("clean");
        record_quit_trigger("error");
    }

    #[test]
    fn test_record_redundant_trigger() {
        record_redundant_trigger();
    }

    #[test]
    fn test_record_stop_duration() {
        record_stop_duration(0.25);
    }
}
