//! vigil: a service scaffold with dependency-aware health checks.
//!
//! The service optionally depends on a PostgreSQL store and a Redis cache.
//! Neither is required to start: unreachable dependencies are reported
//! through `/health` and `/status` instead of preventing startup. Shutdown
//! on SIGINT/SIGTERM drains in-flight requests for a bounded time and then
//! releases dependencies in reverse order.

pub mod config;
pub mod dependency;
pub mod error;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod memory;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod status;

pub use error::AppError;
pub use lifecycle::{LifecycleCoordinator, LifecycleState, StartupOutcome};
pub use state::AppState;
