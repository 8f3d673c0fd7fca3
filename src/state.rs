//! Shared application state for request handlers.

use std::sync::Arc;
use std::time::Instant;

use crate::config::AppConfig;
use crate::dependency::Dependencies;

/// Process-wide context, built once during startup and shared with every
/// request task and the lifecycle coordinator.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub dependencies: Arc<Dependencies>,
    /// Monotonic start instant for uptime
    pub started_at: Instant,
}

impl AppState {
    /// Creates a new application state from the given configuration and dependencies.
    pub fn new(config: AppConfig, dependencies: Dependencies) -> Self {
        Self {
            config: Arc::new(config),
            dependencies: Arc::new(dependencies),
            started_at: Instant::now(),
        }
    }
}
