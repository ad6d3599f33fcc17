//! Operational router served on the application listener.
//!
//! # Route Groups
//!
//! - `/health`, `/ready` - Lifecycle probes
//! - `/metrics` - Prometheus scrape endpoint
//!
//! Request handling routes are attached by passing a different router to
//! [`Application::with_router`](crate::Application::with_router).

use axum::Router;
use axum::routing::get;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Build the operational router with request tracing.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
