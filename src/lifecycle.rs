//! Process lifecycle: `Starting -> Running -> Draining -> Stopped`.
//!
//! Startup is fail-soft for dependencies and fail-fast for the listener: a
//! dependency that cannot be reached is logged and reported as a warning,
//! while a bind failure aborts startup. Shutdown is triggered by the first
//! termination signal, drains in-flight requests for at most the configured
//! deadline, then releases dependencies in reverse construction order.

use std::fmt;
use std::io;
use std::net::{SocketAddr, TcpListener};
use std::time::{Duration, Instant};

use axum::Router;
use axum_server::Handle;
use tokio::sync::watch;

use crate::config::AppConfig;
use crate::dependency::Dependencies;
use crate::http::{self, ServerError, ShutdownReason, ShutdownSignal};
use crate::state::AppState;

/// Slack on top of the drain deadline before the server task is abandoned.
pub const SHUTDOWN_GRACE: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Starting,
    Running,
    Draining,
    Stopped,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Starting => "starting",
            LifecycleState::Running => "running",
            LifecycleState::Draining => "draining",
            LifecycleState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Non-fatal result of startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartupOutcome {
    Ready,
    /// Running without one or more configured dependencies
    PartiallyDegraded(Vec<String>),
}

/// How the drain phase ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Every in-flight request finished before the deadline
    Completed,
    /// The deadline passed with requests still open; they were abandoned
    TimedOut,
    /// The server stopped on its own, without a shutdown request
    ServerFailed(String),
}

#[derive(Debug, Clone)]
pub struct ShutdownReport {
    /// `None` when the server exited without a shutdown request
    pub reason: Option<ShutdownReason>,
    pub drain: DrainOutcome,
    /// Time from the shutdown request (or server exit) to `Stopped`
    pub elapsed: Duration,
}

/// Everything produced by a successful startup.
pub struct Started {
    pub state: AppState,
    pub listener: TcpListener,
    pub outcome: StartupOutcome,
}

impl Started {
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

pub struct LifecycleCoordinator {
    state: watch::Sender<LifecycleState>,
    drain_timeout: Duration,
}

impl LifecycleCoordinator {
    pub fn new(drain_timeout: Duration) -> Self {
        let (state, _) = watch::channel(LifecycleState::Starting);
        Self {
            state,
            drain_timeout,
        }
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    /// Observe state transitions.
    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }

    fn transition(&self, next: LifecycleState) {
        let previous = self.state.send_replace(next);
        tracing::info!(from = %previous, to = %next, "Lifecycle transition");
    }

    /// `Starting`: connect dependencies (best effort), then bind the listener.
    ///
    /// Only a bind failure is an error. In that case the dependencies that
    /// were connected are released before returning.
    pub async fn start(&self, config: AppConfig) -> Result<Started, ServerError> {
        let dependencies = Dependencies::connect(
            &config.database,
            &config.redis,
            config.health.probe_timeout(),
        )
        .await;
        let warnings = dependencies.connect_warnings();

        let listener = match http::bind(&config.http.bind_address()).await {
            Ok(listener) => listener,
            Err(e) => {
                tracing::error!(error = %e, "Failed to bind listener, aborting startup");
                dependencies.release_all().await;
                self.transition(LifecycleState::Stopped);
                return Err(e);
            }
        };

        let outcome = if warnings.is_empty() {
            StartupOutcome::Ready
        } else {
            for warning in &warnings {
                tracing::warn!(%warning, "Starting without dependency");
            }
            StartupOutcome::PartiallyDegraded(warnings)
        };

        Ok(Started {
            state: AppState::new(config, dependencies),
            listener,
            outcome,
        })
    }

    /// `Running` until the first shutdown request, then `Draining` and
    /// `Stopped`. Consumes the coordinator so the sequence runs once.
    ///
    /// Returns within the drain deadline plus [`SHUTDOWN_GRACE`] of the
    /// shutdown request, whatever the in-flight handlers are doing.
    pub async fn run(self, started: Started, app: Router, shutdown: ShutdownSignal) -> ShutdownReport {
        let Started {
            state, listener, ..
        } = started;
        let handle = Handle::new();
        let mut server = http::spawn_server(listener, app, handle.clone());
        self.transition(LifecycleState::Running);

        let (reason, early_exit) = tokio::select! {
            reason = shutdown.recv() => (Some(reason), None),
            result = &mut server => (None, Some(result)),
        };
        let requested_at = Instant::now();

        let drain = match early_exit {
            Some(result) => {
                let message = match result {
                    Ok(Ok(())) => "server exited unexpectedly".to_string(),
                    Ok(Err(e)) => e.to_string(),
                    Err(e) => format!("server task failed: {}", e),
                };
                tracing::error!(error = %message, "Server stopped without a shutdown request");
                DrainOutcome::ServerFailed(message)
            }
            None => {
                self.transition(LifecycleState::Draining);
                tracing::info!(
                    timeout_ms = self.drain_timeout.as_millis() as u64,
                    connections = handle.connection_count(),
                    "Draining in-flight requests"
                );
                handle.graceful_shutdown(Some(self.drain_timeout));

                match tokio::time::timeout(self.drain_timeout + SHUTDOWN_GRACE, &mut server).await {
                    Ok(Ok(Ok(())))
                        if handle.connection_count() == 0
                            && requested_at.elapsed() < self.drain_timeout =>
                    {
                        tracing::info!("All connections drained");
                        DrainOutcome::Completed
                    }
                    Ok(Ok(Ok(()))) => {
                        tracing::warn!(
                            connections = handle.connection_count(),
                            "Drain deadline exceeded, abandoning open connections"
                        );
                        DrainOutcome::TimedOut
                    }
                    Ok(Ok(Err(e))) => {
                        tracing::error!(error = %e, "Server failed while draining");
                        DrainOutcome::ServerFailed(e.to_string())
                    }
                    Ok(Err(e)) => {
                        tracing::error!(error = %e, "Server task failed while draining");
                        DrainOutcome::ServerFailed(e.to_string())
                    }
                    Err(_) => {
                        tracing::warn!("Server did not stop within the drain deadline, forcing shutdown");
                        server.abort();
                        DrainOutcome::TimedOut
                    }
                }
            }
        };

        self.transition(LifecycleState::Stopped);
        state.dependencies.release_all().await;
        tracing::info!("Server exited");

        ShutdownReport {
            reason,
            drain,
            elapsed: requested_at.elapsed(),
        }
    }
}
