//! Application lifecycle: start, wait for one quit decision, stop.
//!
//! # Flow
//!
//! ```text
//!  start()
//!    │
//!    ├─► ServerRunner::start ──────────────┐ bind/serve failure
//!    │                                     ▼
//!    ├─► signal listener ── interrupt ─► QuitSignal::trigger ◄── AppHandle::quit
//!    │                                     │ (first call only)
//!    ▼                                     ▼
//!  QuitSignal::wait ◄──────────── release + cause
//!    │
//!    ▼
//!  ServerRunner::stop ─► Phase::Stopped ─► Ok / Err(cause, stop error)
//! ```
//!
//! # Phases
//!
//! `Running → ShuttingDown → Stopped`. Only the first trigger moves the
//! application out of `Running`; there is no way back. [`Application::start`]
//! consumes the application, so a stopped instance cannot be started again.

mod quit;
mod signals;

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::time::Duration;

use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::sync::watch;
use tokio_util::task::TaskTracker;
use tracing::{error, info};

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::routes::build_router;
use crate::server::ServerRunner;
use crate::state::AppState;

pub use quit::{Phase, QuitSignal};
pub use signals::shutdown_signal;

/// Future that resolves when the process has been asked to stop.
pub type ShutdownSignal = Pin<Box<dyn Future<Output = io::Result<()>> + Send>>;

/// Lifecycle coordinator for one server run.
///
/// # Example
///
/// ```rust,no_run
/// use hash_service::{Application, Config};
///
/// #[tokio::main]
/// async fn main() {
///     let app = Application::new(Config::default());
///     if let Err(e) = app.start().await {
///         eprintln!("server failed: {e}");
///         std::process::exit(1);
///     }
/// }
/// ```
pub struct Application {
    config: Config,
    quit: QuitSignal,
    ready: watch::Sender<Option<SocketAddr>>,
    router: Option<Router>,
    signal: Option<ShutdownSignal>,
    stop_timeout: Option<Duration>,
    metrics: Option<PrometheusHandle>,
    tracker: TaskTracker,
}

impl Application {
    /// Build a coordinator; unset configuration values are defaulted here.
    pub fn new(config: Config) -> Self {
        let (ready, _) = watch::channel(None);

        Self {
            config: config.with_defaults(),
            quit: QuitSignal::new(),
            ready,
            router: None,
            signal: None,
            stop_timeout: None,
            metrics: None,
            tracker: TaskTracker::new(),
        }
    }

    /// Serve `router` instead of the default operational router.
    pub fn with_router(mut self, router: Router) -> Self {
        self.router = Some(router);
        self
    }

    /// Replace the OS signal subscription (Ctrl+C / SIGTERM) with `signal`.
    pub fn with_shutdown_signal<F>(mut self, signal: F) -> Self
    where
        F: Future<Output = io::Result<()>> + Send + 'static,
    {
        self.signal = Some(Box::pin(signal));
        self
    }

    /// Drop connections still open `timeout` after the stop began.
    pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = Some(timeout);
        self
    }

    /// Expose `handle` on `/metrics` of the default router.
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Handle for observing and stopping the application from elsewhere.
    pub fn handle(&self) -> AppHandle {
        AppHandle {
            quit: self.quit.clone(),
            ready: self.ready.subscribe(),
        }
    }

    /// Run the server until a quit is triggered, then stop it.
    ///
    /// # Errors
    ///
    /// - The error that triggered the quit (bind/serve/signal failure)
    /// - A stop error if closing the server failed
    /// - `AppError::Shutdown` carrying both if both happened
    pub async fn start(self) -> AppResult<()> {
        let Self {
            config,
            quit,
            ready,
            router,
            signal,
            stop_timeout,
            metrics,
            tracker,
        } = self;

        let addr = config.listen_addr();
        info!(
            addr = %addr,
            processing_delay = ?config.processing_delay(),
            "Starting server"
        );

        let router =
            router.unwrap_or_else(|| build_router(AppState::new(config, quit.clone(), metrics)));
        let mut runner = ServerRunner::start(addr, router, quit.clone(), ready);

        let signal: ShutdownSignal = match signal {
            Some(signal) => signal,
            None => Box::pin(shutdown_signal()),
        };
        signals::spawn_signal_listener(&tracker, quit.clone(), signal);

        let cause = quit.wait().await;
        match &cause {
            Some(e) => error!(error = %e, "Server failed, shutting down..."),
            None => info!("Server shutting down..."),
        }

        let stop_error = runner.stop(stop_timeout).await.err();
        if let Some(e) = &stop_error {
            error!(error = %e, "Server did not stop cleanly");
        }
        quit.mark_stopped();

        tracker.close();
        tracker.wait().await;

        match AppError::combine(cause, stop_error) {
            None => {
                info!("Server stopped gracefully");
                Ok(())
            }
            Some(e) => Err(e),
        }
    }
}

/// Cloneable handle to a running (or not yet started) application.
#[derive(Debug, Clone)]
pub struct AppHandle {
    quit: QuitSignal,
    ready: watch::Receiver<Option<SocketAddr>>,
}

impl AppHandle {
    /// Request a clean shutdown. Returns `false` if one was already underway.
    pub fn quit(&self) -> bool {
        self.quit.quit()
    }

    /// Request shutdown because of `err`. Returns `false` if one was already
    /// underway, in which case `err` is discarded.
    pub fn quit_with_error(&self, err: AppError) -> bool {
        self.quit.quit_with_error(err)
    }

    pub fn is_shutting_down(&self) -> bool {
        self.quit.is_shutting_down()
    }

    pub fn phase(&self) -> Phase {
        self.quit.phase()
    }

    /// Wait until the listener is bound and return its local address.
    ///
    /// Returns `None` if the server ended before binding.
    pub async fn wait_ready(&self) -> Option<SocketAddr> {
        let mut ready = self.ready.clone();
        ready.wait_for(Option::is_some).await.ok().and_then(|addr| *addr)
    }
}
