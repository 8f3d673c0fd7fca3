//! HTTP server plumbing.
//!
//! - Listener binding and serving through an `axum_server::Handle`
//! - SIGTERM/SIGINT handling feeding a one-shot shutdown channel

pub mod server;
pub mod shutdown;

pub use server::{bind, spawn_server, ServerError};
pub use shutdown::{listen_for_signals, ShutdownReason, ShutdownSignal, ShutdownTrigger};
