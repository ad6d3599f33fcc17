//! # Hash Service
//!
//! Host process for the hash service: starts an HTTP listener, waits for a
//! termination signal or an internal failure, and shuts down exactly once.
//!
//! - **Single-fire quit**: any number of concurrent quit requests, one effect
//! - **Ordered shutdown**: the listener is stopped only after the quit decision
//! - **Error surfacing**: the triggering error and any stop error both reach the caller
//! - **Observability**: structured logging, health endpoints, Prometheus metrics
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Application (lifecycle coordinator)                        │
//! ├──────────────────────┬──────────────────────────────────────┤
//! │  Signal listener     │  ServerRunner (hyper + axum Router)  │
//! │  Ctrl+C / SIGTERM    │  /health  /ready  /metrics           │
//! ├──────────────────────┴──────────────────────────────────────┤
//! │  QuitSignal (phase + cause + release, one mutex)            │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hash_service::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), hash_service::AppError> {
//!     let config = Config { listen_port: 8080, processing_delay_secs: 5 };
//!     Application::new(config).start().await
//! }
//! ```

pub mod config;
pub mod error;
pub mod handlers;
pub mod lifecycle;
pub mod metrics;
pub mod models;
pub mod routes;
pub mod server;
pub mod state;

// Re-exports for convenience
pub use config::{Cli, Config};
pub use error::{AppError, AppResult};
pub use lifecycle::{AppHandle, Application, Phase, QuitSignal, shutdown_signal};
pub use routes::build_router;
pub use server::ServerRunner;
pub use state::AppState;
