use std::future::Future;
use std::io;

use tokio::signal;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, warn};

use super::quit::QuitSignal;
use crate::error::AppError;

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
///
/// # Errors
///
/// Returns the I/O error if a signal handler cannot be installed.
pub async fn shutdown_signal() -> io::Result<()> {
    let ctrl_c = signal::ctrl_c();

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())?
            .recv()
            .await;
        Ok::<(), io::Error>(())
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<io::Result<()>>();

    tokio::select! {
        result = ctrl_c => {
            result?;
            warn!("Received Ctrl+C, initiating graceful shutdown...");
        }
        result = terminate => {
            result?;
            warn!("Received SIGTERM, initiating graceful shutdown...");
        }
    }

    Ok(())
}

/// Spawn the task that turns `signal` into a quit request.
///
/// The task ends as soon as quit has happened for any reason, so it never
/// outlives the application that spawned it.
pub(crate) fn spawn_signal_listener<F>(tracker: &TaskTracker, quit: QuitSignal, signal: F)
where
    F: Future<Output = io::Result<()>> + Send + 'static,
{
    tracker.spawn(async move {
        tokio::select! {
            biased;

            _ = quit.triggered() => {
                debug!("Signal listener exiting, shutdown already in progress");
            }
            result = signal => match result {
                Ok(()) => {
                    quit.quit();
                }
                Err(e) => {
                    error!(error = %e, "Failed to listen for shutdown signal");
                    quit.quit_with_error(AppError::Signal(e));
                }
            },
        }
    });
}
