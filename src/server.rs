//! HTTP server runner.
//!
//! [`ServerRunner`] owns the listener for one application run. The accept
//! loop executes on its own task, so it has no caller to return errors to:
//! any failure that was not caused by a stop request is reported through the
//! application's [`QuitSignal`] instead.
//!
//! # Stop Semantics
//!
//! Every accepted connection is served on a task in the runner's
//! [`TaskTracker`]. `stop` cancels the runner's stop token: the accept loop
//! exits and drops the listener, and each connection finishes the request it
//! is serving before closing. With a deadline, connections still open when it
//! expires are dropped, and `stop` waits for their tasks to end before it
//! returns. Nothing the runner spawned outlives `stop`.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use axum::Router;
use hyper::server::conn::http1;
use hyper_util::rt::TokioIo;
use hyper_util::service::TowerToHyperService;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::error::{AppError, AppResult};
use crate::lifecycle::QuitSignal;
use crate::metrics;

/// Source of accepted connections for the accept loop.
pub(crate) trait Acceptor: Send {
    type Io: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    fn accept_io(&mut self) -> impl Future<Output = io::Result<(Self::Io, SocketAddr)>> + Send;
}

impl Acceptor for TcpListener {
    type Io = TcpStream;

    fn accept_io(&mut self) -> impl Future<Output = io::Result<(TcpStream, SocketAddr)>> + Send {
        self.accept()
    }
}

/// Connection tasks owned by one runner.
#[derive(Debug, Clone)]
struct Connections {
    /// Stop accepting; open connections close after their current request.
    stop: CancellationToken,
    /// Drop open connections immediately.
    kill: CancellationToken,
    tracker: TaskTracker,
}

impl Connections {
    fn new() -> Self {
        Self {
            stop: CancellationToken::new(),
            kill: CancellationToken::new(),
            tracker: TaskTracker::new(),
        }
    }

    fn spawn<I>(&self, io: I, router: Router)
    where
        I: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        self.tracker.spawn(serve_connection(
            io,
            router,
            self.stop.clone(),
            self.kill.clone(),
        ));
    }
}

/// Owner of the live listener, its accept task and its connections.
#[derive(Debug)]
pub struct ServerRunner {
    addr: String,
    connections: Connections,
    task: Option<JoinHandle<()>>,
}

impl ServerRunner {
    /// Bind `addr` and serve `router` on a background task.
    ///
    /// The bound address is published on `ready` once the listener accepts
    /// connections. Bind and accept failures are reported via `quit`.
    pub fn start(
        addr: String,
        router: Router,
        quit: QuitSignal,
        ready: watch::Sender<Option<SocketAddr>>,
    ) -> Self {
        let connections = Connections::new();
        let task = tokio::spawn(serve(addr.clone(), router, quit, connections.clone(), ready));

        Self {
            addr,
            connections,
            task: Some(task),
        }
    }

    /// Stop the server and wait for the accept task and every connection.
    ///
    /// Calling it again after a completed stop returns `Ok(())`.
    ///
    /// # Errors
    ///
    /// - `AppError::StopTimeout` if connections were still open at `deadline`
    /// - `AppError::TaskFailed` if the accept task panicked
    pub async fn stop(&mut self, deadline: Option<Duration>) -> AppResult<()> {
        self.connections.stop.cancel();

        let Some(task) = self.task.take() else {
            debug!(addr = %self.addr, "Server already stopped");
            return Ok(());
        };

        let started = Instant::now();
        // The accept loop leaves as soon as the stop token fires.
        let joined = task.await;
        self.connections.tracker.close();
        let drained = self.drain(deadline).await;
        metrics::record_stop_duration(started.elapsed().as_secs_f64());

        match joined {
            Ok(()) => drained,
            Err(e) => Err(AppError::TaskFailed(e.to_string())),
        }
    }

    async fn drain(&self, deadline: Option<Duration>) -> AppResult<()> {
        let tracker = &self.connections.tracker;
        let Some(limit) = deadline else {
            tracker.wait().await;
            return Ok(());
        };

        if tokio::time::timeout(limit, tracker.wait()).await.is_ok() {
            return Ok(());
        }

        warn!(
            addr = %self.addr,
            timeout = ?limit,
            open_connections = tracker.len(),
            "Server stop timed out, dropping open connections"
        );
        self.connections.kill.cancel();
        tracker.wait().await;
        Err(AppError::StopTimeout(limit))
    }
}

/// Bind, publish the local address, then accept until stopped.
async fn serve(
    addr: String,
    router: Router,
    quit: QuitSignal,
    connections: Connections,
    ready: watch::Sender<Option<SocketAddr>>,
) {
    let listener = tokio::select! {
        biased;

        _ = connections.stop.cancelled() => {
            debug!(addr = %addr, "Stop requested before the listener was bound");
            return;
        }
        bound = TcpListener::bind(addr.as_str()) => match bound {
            Ok(listener) => listener,
            Err(source) => {
                error!(addr = %addr, error = %source, "Failed to bind listener");
                quit.quit_with_error(AppError::Bind {
                    addr: addr.clone(),
                    source,
                });
                return;
            }
        },
    };

    let local_addr = listener.local_addr().ok();
    info!(addr = %addr, local_addr = ?local_addr, "Server is listening");
    ready.send_replace(local_addr);

    accept_loop(listener, router, &quit, &connections, &addr).await;
}

/// Accept connections until the stop token fires or accepting fails.
///
/// Errors that only concern one client (reset, aborted, refused) are skipped.
/// Any other accept error ends the loop and is handed to `quit`.
async fn accept_loop<A: Acceptor>(
    mut listener: A,
    router: Router,
    quit: &QuitSignal,
    connections: &Connections,
    addr: &str,
) {
    loop {
        let accepted = tokio::select! {
            biased;

            _ = connections.stop.cancelled() => {
                debug!(addr = %addr, "Listener closed");
                return;
            }
            accepted = listener.accept_io() => accepted,
        };

        match accepted {
            Ok((io, remote)) => {
                debug!(remote = %remote, "Accepted connection");
                connections.spawn(io, router.clone());
            }
            Err(e) if is_connection_error(&e) => {
                debug!(error = %e, "Client connection failed during accept");
            }
            Err(e) => {
                error!(addr = %addr, error = %e, "Server terminated abnormally");
                quit.quit_with_error(AppError::Serve(e));
                return;
            }
        }
    }
}

fn is_connection_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
    )
}

/// Serve HTTP/1 on one connection.
///
/// `stop` lets the current request finish and then closes the connection;
/// `kill` drops it, together with any handler still running on it.
async fn serve_connection<I>(io: I, router: Router, stop: CancellationToken, kill: CancellationToken)
where
    I: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let conn = http1::Builder::new()
        .serve_connection(TokioIo::new(io), TowerToHyperService::new(router));
    tokio::pin!(conn);

    let mut draining = false;
    loop {
        tokio::select! {
            result = conn.as_mut() => {
                if let Err(e) = result {
                    debug!(error = %e, "Connection closed with error");
                }
                return;
            }
            _ = stop.cancelled(), if !draining => {
                conn.as_mut().graceful_shutdown();
                draining = true;
            }
            _ = kill.cancelled() => {
                debug!("Connection dropped at stop deadline");
                return;
            }
        }
    }
}
