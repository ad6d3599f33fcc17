//! Health, readiness, and metrics endpoints.
//!
//! # Endpoints
//!
//! - `GET /health` - Lifecycle status; always 200
//! - `GET /ready` - 200 while running, 503 once shutdown has begun
//! - `GET /metrics` - Prometheus text format (404 when no recorder installed)
//!
//! Readiness flips to 503 as soon as the quit decision is made, before the
//! listener closes, so load balancers stop routing during the drain.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use chrono::Utc;
use tracing::instrument;

use crate::models::HealthResponse;
use crate::state::AppState;

/// Health check endpoint.
///
/// # Response Body
///
/// ```json
/// {
///   "status": "healthy",
///   "phase": "running",
///   "version": "0.1.0",
///   "uptime_seconds": 42,
///   "processing_delay_secs": 5,
///   "timestamp": "2024-01-15T10:30:00Z"
/// }
/// ```
#[instrument(skip(state))]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: if state.is_shutting_down() {
            "shutting_down"
        } else {
            "healthy"
        }
        .to_string(),
        phase: state.phase(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.uptime_seconds(),
        processing_delay_secs: state.config.processing_delay().as_secs(),
        timestamp: Utc::now(),
    })
}

/// Readiness check endpoint for load balancer probes.
#[instrument(skip(state))]
pub async fn readiness_check(State(state): State<AppState>) -> Result<StatusCode, StatusCode> {
    if state.is_shutting_down() {
        Err(StatusCode::SERVICE_UNAVAILABLE)
    } else {
        Ok(StatusCode::OK)
    }
}

/// Prometheus scrape endpoint.
#[instrument(skip(state))]
pub async fn metrics(State(state): State<AppState>) -> Result<String, StatusCode> {
    state.render_metrics().ok_or(StatusCode::NOT_FOUND)
}
