//! Shared state for the operational HTTP handlers.
//!
//! Handlers only observe the lifecycle; they never trigger it. The state holds
//! a clone of the application's [`QuitSignal`] so `/health` and `/ready` can
//! report shutdown as soon as it begins.

use std::time::Instant;

use metrics_exporter_prometheus::PrometheusHandle;

use crate::config::Config;
use crate::lifecycle::{Phase, QuitSignal};

/// Shared application state for Axum handlers.
///
/// Cloned for each request; every field is cheap to clone.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Config,
    /// Timestamp when the state was created
    pub started_at: Instant,
    quit: QuitSignal,
    metrics: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(config: Config, quit: QuitSignal, metrics: Option<PrometheusHandle>) -> Self {
        Self {
            config,
            started_at: Instant::now(),
            quit,
            metrics,
        }
    }

    pub fn phase(&self) -> Phase {
        self.quit.phase()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.quit.is_shutting_down()
    }

    /// Render Prometheus metrics, if a recorder was installed.
    pub fn render_metrics(&self) -> Option<String> {
        self.metrics.as_ref().map(PrometheusHandle::render)
    }

    /// Get the application uptime in seconds.
    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
