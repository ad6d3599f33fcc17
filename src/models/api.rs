use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::lifecycle::Phase;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "healthy" while running, "shutting_down" afterwards
    pub status: String,
    /// Current lifecycle phase
    pub phase: Phase,
    /// Service version
    pub version: String,
    /// Seconds since the application state was created
    pub uptime_seconds: u64,
    /// Configured processing delay in seconds
    pub processing_delay_secs: u64,
    /// Current timestamp
    pub timestamp: DateTime<Utc>,
}
