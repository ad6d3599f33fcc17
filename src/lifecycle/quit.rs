//! Single-fire quit signal.
//!
//! [`QuitSignal`] is the join point between everything that may decide the
//! process should stop (OS signal, listener failure, explicit request) and
//! the one flow that waits for that decision.
//!
//! # Guarantees
//!
//! - The `Running -> ShuttingDown` transition happens exactly once. Every
//!   later [`QuitSignal::trigger`] is a no-op that returns `false`.
//! - The cause (if any) is stored in the same mutex-guarded state as the
//!   phase, and the release is fired only after the lock is dropped. A waiter
//!   woken by the release therefore always finds the cause in place.
//! - [`QuitSignal::is_shutting_down`] is a lock-free read of an atomic mirror
//!   of the phase.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::AppError;
use crate::metrics;

/// Lifecycle phase of an application instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Serving; no quit has been requested.
    Running,
    /// Quit has been decided; the server is being stopped.
    ShuttingDown,
    /// The server stop sequence finished. Terminal.
    Stopped,
}

/// One-shot handoff of the shutdown cause.
#[derive(Debug)]
enum Slot {
    Empty,
    Filled(Option<AppError>),
    Taken,
}

#[derive(Debug)]
struct State {
    phase: Phase,
    cause: Slot,
}

#[derive(Debug)]
struct Inner {
    state: Mutex<State>,
    shutting_down: AtomicBool,
    released: CancellationToken,
}

/// Idempotent quit trigger shared by every actor of one application.
///
/// Cloning is cheap; all clones refer to the same state. Separate
/// `QuitSignal::new()` instances never interfere with each other.
#[derive(Debug, Clone)]
pub struct QuitSignal {
    inner: Arc<Inner>,
}

impl QuitSignal {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    phase: Phase::Running,
                    cause: Slot::Empty,
                }),
                shutting_down: AtomicBool::new(false),
                released: CancellationToken::new(),
            }),
        }
    }

    /// Begin shutdown with an optional cause.
    ///
    /// Returns `true` for the single call that performed the transition and
    /// `false` for every call absorbed because shutdown had already begun.
    pub fn trigger(&self, cause: Option<AppError>) -> bool {
        {
            let mut state = self.lock();
            if state.phase != Phase::Running {
                drop(state);
                debug!("Shutdown already in progress, ignoring quit request");
                metrics::record_redundant_trigger();
                return false;
            }

            match &cause {
                Some(e) => warn!(error = %e, "Quit triggered by failure"),
                None => info!("Quit requested"),
            }
            metrics::record_quit_trigger(cause_label(cause.as_ref()));

            state.phase = Phase::ShuttingDown;
            state.cause = Slot::Filled(cause);
            self.inner.shutting_down.store(true, Ordering::SeqCst);
        }

        // Cause is in place before any waiter can wake.
        self.inner.released.cancel();
        true
    }

    /// Begin shutdown under expected circumstances.
    pub fn quit(&self) -> bool {
        self.trigger(None)
    }

    /// Begin shutdown because of a failure.
    pub fn quit_with_error(&self, err: AppError) -> bool {
        self.trigger(Some(err))
    }

    /// Point-in-time check whether shutdown has begun.
    pub fn is_shutting_down(&self) -> bool {
        self.inner.shutting_down.load(Ordering::SeqCst)
    }

    pub fn phase(&self) -> Phase {
        self.lock().phase
    }

    /// Resolves once the quit transition has happened. Does not consume the
    /// cause, so any number of actors may await it.
    pub async fn triggered(&self) {
        self.inner.released.cancelled().await;
    }

    /// Wait for the quit transition and take its cause.
    ///
    /// Only the first waiter receives the cause; later calls resolve to `None`.
    pub async fn wait(&self) -> Option<AppError> {
        self.triggered().await;

        let mut state = self.lock();
        match std::mem::replace(&mut state.cause, Slot::Taken) {
            Slot::Filled(cause) => cause,
            // Slot is always filled before the release fires.
            Slot::Empty | Slot::Taken => None,
        }
    }

    /// Mark the stop sequence as finished.
    pub(crate) fn mark_stopped(&self) {
        let mut state = self.lock();
        if state.phase == Phase::ShuttingDown {
            state.phase = Phase::Stopped;
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Metrics label for a quit cause. A clean quit may come from an interrupt or
/// from a programmatic request; the label does not tell them apart.
fn cause_label(cause: Option<&AppError>) -> &'static str {
    match cause {
        Some(_) => "error",
        None => "clean",
    }
}

impl Default for QuitSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::io;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use tokio::time::{sleep, timeout};

    use super::*;

    fn serve_error(msg: &str) -> AppError {
        AppError::Serve(io::Error::other(msg.to_string()))
    }

    #[test]
    fn test_new_signal_is_running() {
        let quit = QuitSignal::new();

        assert!(!quit.is_shutting_down());
        assert_eq!(quit.phase(), Phase::Running);
    }

    #[test]
    fn test_first_trigger_wins() {
        let quit = QuitSignal::new();

        assert!(quit.quit_with_error(serve_error("first")));
        assert!(!quit.quit_with_error(serve_error("second")));
        assert!(!quit.quit());

        assert!(quit.is_shutting_down());
        assert_eq!(quit.phase(), Phase::ShuttingDown);
    }

    #[tokio::test]
    async fn test_wait_returns_first_cause() {
        let quit = QuitSignal::new();
        quit.quit_with_error(serve_error("first"));
        quit.quit_with_error(serve_error("second"));

        let cause = quit.wait().await.expect("cause should be recorded");
        assert!(cause.to_string().contains("first"));
    }

    #[tokio::test]
    async fn test_wait_after_clean_quit_is_none() {
        let quit = QuitSignal::new();
        quit.quit();

        assert!(quit.wait().await.is_none());
    }

    #[tokio::test]
    async fn test_cause_is_taken_once() {
        let quit = QuitSignal::new();
        quit.quit_with_error(serve_error("boom"));

        assert!(quit.wait().await.is_some());
        assert!(quit.wait().await.is_none());
    }

    #[tokio::test]
    async fn test_wait_blocks_until_triggered() {
        let quit = QuitSignal::new();

        let pending = timeout(Duration::from_millis(50), quit.wait()).await;
        assert!(pending.is_err());
        assert!(!quit.is_shutting_down());
    }

    #[tokio::test]
    async fn test_triggered_does_not_consume_cause() {
        let quit = QuitSignal::new();
        quit.quit_with_error(serve_error("boom"));

        quit.triggered().await;
        quit.triggered().await;
        assert!(quit.wait().await.is_some());
    }

    #[test]
    fn test_mark_stopped_only_after_shutdown() {
        let quit = QuitSignal::new();

        quit.mark_stopped();
        assert_eq!(quit.phase(), Phase::Running);

        quit.quit();
        quit.mark_stopped();
        assert_eq!(quit.phase(), Phase::Stopped);

        assert!(!quit.quit());
        assert_eq!(quit.phase(), Phase::Stopped);
    }

    #[test]
    fn test_cause_label() {
        assert_eq!(cause_label(None), "clean");
        assert_eq!(cause_label(Some(&serve_error("boom"))), "error");
    }

    #[test]
    fn test_instances_are_independent() {
        let a = QuitSignal::new();
        let b = QuitSignal::new();

        a.quit();
        assert!(a.is_shutting_down());
        assert!(!b.is_shutting_down());
    }

    #[test]
    fn test_concurrent_triggers_from_threads() {
        let quit = QuitSignal::new();
        let winners = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..64)
            .map(|i| {
                let quit = quit.clone();
                let winners = winners.clone();
                std::thread::spawn(move || {
                    let cause = (i % 2 == 0).then(|| serve_error(&format!("thread-{i}")));
                    if quit.trigger(cause) {
                        winners.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(winners.load(Ordering::SeqCst), 1);
        assert!(quit.is_shutting_down());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_stress_triggers_release_waiter_once() {
        for _ in 0..50 {
            let quit = QuitSignal::new();
            let waiter = tokio::spawn({
                let quit = quit.clone();
                async move { quit.wait().await }
            });

            let triggers: Vec<_> = (0..32)
                .map(|i| {
                    let quit = quit.clone();
                    tokio::spawn(async move {
                        quit.quit_with_error(serve_error(&format!("task-{i}")))
                    })
                })
                .collect();

            let mut winners = Vec::new();
            for (i, trigger) in triggers.into_iter().enumerate() {
                if trigger.await.unwrap() {
                    winners.push(i);
                }
            }

            assert_eq!(winners.len(), 1);
            let cause = timeout(Duration::from_secs(5), waiter)
                .await
                .expect("waiter should unblock")
                .unwrap()
                .expect("cause should be recorded");
            assert_eq!(cause.to_string(), format!("Server terminated abnormally: task-{}", winners[0]));
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_waiter_observes_cause_with_delayed_trigger() {
        for delay_ms in [0, 1, 5, 20] {
            let quit = QuitSignal::new();
            let waiter = tokio::spawn({
                let quit = quit.clone();
                async move { quit.wait().await }
            });

            let trigger = tokio::spawn({
                let quit = quit.clone();
                async move {
                    sleep(Duration::from_millis(delay_ms)).await;
                    quit.quit_with_error(serve_error("delayed"))
                }
            });

            assert!(trigger.await.unwrap());
            let cause = timeout(Duration::from_secs(5), waiter)
                .await
                .expect("waiter should unblock")
                .unwrap();
            assert!(cause.expect("cause must be visible").to_string().contains("delayed"));
        }
    }
}
