//! Termination signal handling.
//!
//! SIGINT and SIGTERM are funnelled into a single-consumer channel with room
//! for exactly one notification. The lifecycle coordinator consumes it once;
//! any signal after the first finds the slot full (or the receiver gone) and
//! is ignored.

use std::fmt;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Why shutdown was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    Interrupt,
    Terminate,
    /// Requested programmatically through a [`ShutdownTrigger`]
    Requested,
    /// Every trigger was dropped without requesting shutdown
    SourceClosed,
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownReason::Interrupt => f.write_str("SIGINT"),
            ShutdownReason::Terminate => f.write_str("SIGTERM"),
            ShutdownReason::Requested => f.write_str("shutdown request"),
            ShutdownReason::SourceClosed => f.write_str("signal source closed"),
        }
    }
}

/// Sending half. Cloneable; every clone feeds the same one-slot channel.
#[derive(Clone, Debug)]
pub struct ShutdownTrigger {
    tx: mpsc::Sender<ShutdownReason>,
}

impl ShutdownTrigger {
    /// Request shutdown. Returns `false` when a request is already pending or
    /// the coordinator has stopped listening.
    pub fn trigger(&self, reason: ShutdownReason) -> bool {
        self.tx.try_send(reason).is_ok()
    }
}

/// Receiving half, consumed by the coordinator.
#[derive(Debug)]
pub struct ShutdownSignal {
    rx: mpsc::Receiver<ShutdownReason>,
}

impl ShutdownSignal {
    /// Wait for the first shutdown request. Consumes the receiver, so later
    /// requests are dropped on the floor.
    pub async fn recv(mut self) -> ShutdownReason {
        self.rx.recv().await.unwrap_or(ShutdownReason::SourceClosed)
    }
}

pub fn channel() -> (ShutdownTrigger, ShutdownSignal) {
    let (tx, rx) = mpsc::channel(1);
    (ShutdownTrigger { tx }, ShutdownSignal { rx })
}

/// Forward SIGINT and SIGTERM to `trigger` for the life of the process.
///
/// A handler that cannot be installed is logged and skipped; the service
/// keeps running without it.
#[cfg(unix)]
pub fn listen_for_signals(trigger: ShutdownTrigger) -> JoinHandle<()> {
    use tokio::signal::unix::{signal, Signal, SignalKind};

    fn install(kind: SignalKind, name: &str) -> Option<Signal> {
        match signal(kind) {
            Ok(stream) => Some(stream),
            Err(e) => {
                tracing::error!(signal = name, error = %e, "Failed to install signal handler");
                None
            }
        }
    }

    async fn next(stream: &mut Option<Signal>) {
        match stream {
            Some(stream) => {
                if stream.recv().await.is_none() {
                    std::future::pending::<()>().await;
                }
            }
            None => std::future::pending::<()>().await,
        }
    }

    tokio::spawn(async move {
        let mut interrupt = install(SignalKind::interrupt(), "SIGINT");
        let mut terminate = install(SignalKind::terminate(), "SIGTERM");

        loop {
            let reason = tokio::select! {
                _ = next(&mut interrupt) => ShutdownReason::Interrupt,
                _ = next(&mut terminate) => ShutdownReason::Terminate,
            };
            forward(&trigger, reason);
        }
    })
}

/// Forward Ctrl+C to `trigger` for the life of the process.
#[cfg(not(unix))]
pub fn listen_for_signals(trigger: ShutdownTrigger) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to install Ctrl+C handler");
                return;
            }
            forward(&trigger, ShutdownReason::Interrupt);
        }
    })
}

fn forward(trigger: &ShutdownTrigger, reason: ShutdownReason) {
    if trigger.trigger(reason) {
        tracing::info!(%reason, "Received termination signal, initiating graceful shutdown");
    } else {
        tracing::info!(%reason, "Shutdown already in progress, ignoring signal");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_first_request_wins() {
        let (trigger, signal) = channel();
        assert!(trigger.trigger(ShutdownReason::Terminate));
        assert!(!trigger.trigger(ShutdownReason::Interrupt));
        assert_eq!(signal.recv().await, ShutdownReason::Terminate);
    }

    #[tokio::test]
    async fn test_trigger_after_consumption_is_noop() {
        let (trigger, signal) = channel();
        trigger.trigger(ShutdownReason::Requested);
        signal.recv().await;
        assert!(!trigger.trigger(ShutdownReason::Requested));
    }

    #[tokio::test]
    async fn test_recv_waits_for_a_request() {
        let (_trigger, signal) = channel();
        let result = tokio::time::timeout(Duration::from_millis(50), signal.recv()).await;
        assert!(result.is_err(), "recv should block until a request arrives");
    }

    #[tokio::test]
    async fn test_dropped_triggers_close_the_source() {
        let (trigger, signal) = channel();
        drop(trigger);
        assert_eq!(signal.recv().await, ShutdownReason::SourceClosed);
    }

    #[test]
    fn test_reason_display() {
        assert_eq!(ShutdownReason::Interrupt.to_string(), "SIGINT");
        assert_eq!(ShutdownReason::Terminate.to_string(), "SIGTERM");
    }
}
