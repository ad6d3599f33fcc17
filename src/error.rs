use std::io;
use std::time::Duration;

use thiserror::Error;

/// Application-wide error types.
///
/// # Trigger vs Stop Errors
///
/// Errors reach the top-level caller on two independent paths:
///
/// - **Trigger errors** (`Bind`, `Serve`, `Signal`) caused the quit transition
///   and are handed over through the quit signal.
/// - **Stop errors** (`StopTimeout`, `TaskFailed`) happened while the
///   listener was being closed.
///
/// When both occur they are reported together as `Shutdown` so that neither
/// is lost.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Failed to bind listener on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("Server terminated abnormally: {0}")]
    Serve(#[source] io::Error),

    #[error("Failed to install signal handler: {0}")]
    Signal(#[source] io::Error),

    #[error("Server did not stop within {0:?}")]
    StopTimeout(Duration),

    #[error("Server task failed: {0}")]
    TaskFailed(String),

    #[error("{trigger} (stop also failed: {stop})")]
    Shutdown {
        trigger: Box<AppError>,
        stop: Box<AppError>,
    },
}

impl AppError {
    /// Merge the error that caused the shutdown with the error (if any)
    /// produced while stopping the server.
    pub fn combine(trigger: Option<AppError>, stop: Option<AppError>) -> Option<AppError> {
        match (trigger, stop) {
            (None, None) => None,
            (Some(e), None) | (None, Some(e)) => Some(e),
            (Some(trigger), Some(stop)) => Some(AppError::Shutdown {
                trigger: Box::new(trigger),
                stop: Box::new(stop),
            }),
        }
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
