//! Optional external dependencies.
//!
//! A [`DependencyHandle`] owns the driver object for one backing store (the
//! PostgreSQL pool or the Redis connection manager) and exposes a bounded
//! probe. Dependencies are optional: a handle may be unconfigured, or
//! configured but without a connection because the one-shot startup connect
//! failed. Neither case is fatal; both are reported through probes.
//!
//! Drivers sit behind the [`Backend`] trait family so the aggregation and
//! lifecycle logic never touch sqlx or redis directly.

mod cache;
mod store;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::{DatabaseConfig, RedisConfig};

pub use cache::RedisCache;
pub use store::PostgresStore;

/// Which backing store a handle wraps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum DependencyKind {
    #[serde(rename = "database")]
    RelationalStore,
    #[serde(rename = "redis")]
    CacheStore,
}

impl DependencyKind {
    /// Name used in logs and response payloads
    pub fn name(self) -> &'static str {
        match self {
            DependencyKind::RelationalStore => "database",
            DependencyKind::CacheStore => "redis",
        }
    }
}

impl fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DependencyError {
    #[error("{0}")]
    Postgres(#[from] sqlx::Error),

    #[error("{0}")]
    Redis(#[from] redis::RedisError),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("not connected: {0}")]
    NotConnected(String),

    #[error("connection released")]
    Released,
}

/// Minimal operations every backing store driver supports.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Cheapest possible round-trip to the server.
    async fn ping(&self) -> Result<(), DependencyError>;

    /// Release pooled connections. Must tolerate being called more than once.
    async fn close(&self) -> Result<(), DependencyError>;
}

/// Server clock and database name, as read by the example endpoint.
#[derive(Debug, Clone)]
pub struct ServerClock {
    pub current_time: DateTime<Utc>,
    pub database: String,
}

#[async_trait]
pub trait RelationalStore: Backend {
    async fn server_clock(&self) -> Result<ServerClock, DependencyError>;
}

#[async_trait]
pub trait CacheStore: Backend {
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), DependencyError>;
    async fn get(&self, key: &str) -> Result<Option<String>, DependencyError>;
}

/// Driver object owned by a handle.
#[derive(Clone)]
pub enum Connection {
    Store(Arc<dyn RelationalStore>),
    Cache(Arc<dyn CacheStore>),
}

impl Connection {
    pub fn kind(&self) -> DependencyKind {
        match self {
            Connection::Store(_) => DependencyKind::RelationalStore,
            Connection::Cache(_) => DependencyKind::CacheStore,
        }
    }

    async fn ping(&self) -> Result<(), DependencyError> {
        match self {
            Connection::Store(store) => store.ping().await,
            Connection::Cache(cache) => cache.ping().await,
        }
    }

    async fn close(&self) -> Result<(), DependencyError> {
        match self {
            Connection::Store(store) => store.close().await,
            Connection::Cache(cache) => cache.close().await,
        }
    }
}

/// Outcome of a single probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeResult {
    /// Dependency disabled in configuration; no I/O was attempted
    NotConfigured,
    Ok,
    Failed { cause: String },
}

impl ProbeResult {
    pub fn is_ok(&self) -> bool {
        matches!(self, ProbeResult::Ok)
    }
}

/// One optional external dependency.
///
/// The connection is fixed once the handle is built; the only later mutation
/// is [`DependencyHandle::release`], which flips an atomic flag and closes the
/// driver.
pub struct DependencyHandle {
    kind: DependencyKind,
    configured: bool,
    connection: Option<Connection>,
    /// Why the startup connect failed, if it did. A store handle may still
    /// hold its pool in that case.
    connect_error: Option<String>,
    probe_timeout: Duration,
    released: AtomicBool,
}

impl DependencyHandle {
    /// Handle for a dependency that is disabled in configuration.
    pub fn not_configured(kind: DependencyKind) -> Self {
        Self {
            kind,
            configured: false,
            connection: None,
            connect_error: None,
            probe_timeout: Duration::ZERO,
            released: AtomicBool::new(false),
        }
    }

    /// Handle wrapping an established connection.
    pub fn connected(connection: Connection, probe_timeout: Duration) -> Self {
        Self {
            kind: connection.kind(),
            configured: true,
            connection: Some(connection),
            connect_error: None,
            probe_timeout,
            released: AtomicBool::new(false),
        }
    }

    /// Handle for a configured dependency whose startup connect failed.
    pub fn unavailable(kind: DependencyKind, cause: impl Into<String>) -> Self {
        Self {
            kind,
            configured: true,
            connection: None,
            connect_error: Some(cause.into()),
            probe_timeout: Duration::ZERO,
            released: AtomicBool::new(false),
        }
    }

    /// Build the relational store handle and check it once, bounded.
    ///
    /// The pool is kept even when the startup check fails: the failure is
    /// recorded as a startup warning and later probes retry against the
    /// server. Only an unusable url makes the handle unavailable.
    pub async fn connect_store(config: &DatabaseConfig, probe_timeout: Duration) -> Self {
        let kind = DependencyKind::RelationalStore;
        if !config.enabled {
            tracing::info!(dependency = %kind, "Dependency not configured");
            return Self::not_configured(kind);
        }
        let Some(url) = config.url.as_deref() else {
            return Self::unavailable(kind, "no connection url configured");
        };

        let connect_timeout = config.connect_timeout();
        let acquire_timeout = driver_deadline(connect_timeout.min(probe_timeout));
        let store = match PostgresStore::connect_lazy(url, config.max_connections, acquire_timeout) {
            Ok(store) => store,
            Err(e) => {
                tracing::warn!(dependency = %kind, error = %e, "Invalid database configuration, continuing without it");
                return Self::unavailable(kind, e.to_string());
            }
        };

        let mut handle = Self::connected(Connection::Store(Arc::new(store)), probe_timeout);
        handle.check_at_startup(connect_timeout).await;
        handle
    }

    /// One bounded ping of a freshly built connection. A failure is kept as
    /// the startup warning; the connection stays in place.
    async fn check_at_startup(&mut self, limit: Duration) {
        let Some(connection) = self.connection.as_ref() else {
            return;
        };
        match bounded(limit, connection.ping()).await {
            Ok(()) => tracing::info!(dependency = %self.kind, "Database connected successfully"),
            Err(e) => {
                tracing::warn!(dependency = %self.kind, error = %e, "Database ping failed, will retry on each probe");
                self.connect_error = Some(e.to_string());
            }
        }
    }

    /// Build the cache store handle, attempting one bounded connect.
    pub async fn connect_cache(config: &RedisConfig, probe_timeout: Duration) -> Self {
        let kind = DependencyKind::CacheStore;
        if !config.enabled {
            tracing::info!(dependency = %kind, "Dependency not configured");
            return Self::not_configured(kind);
        }
        let Some(url) = config.url.as_deref() else {
            return Self::unavailable(kind, "no connection url configured");
        };

        let timeout = config.connect_timeout();
        match bounded(timeout, RedisCache::connect(url)).await {
            Ok(cache) => {
                tracing::info!(dependency = %kind, "Redis connected successfully");
                Self::connected(Connection::Cache(Arc::new(cache)), probe_timeout)
            }
            Err(e) => {
                tracing::warn!(dependency = %kind, error = %e, "Redis connection failed, continuing without it");
                Self::unavailable(kind, e.to_string())
            }
        }
    }

    pub fn kind(&self) -> DependencyKind {
        self.kind
    }

    pub fn is_configured(&self) -> bool {
        self.configured
    }

    /// True while a connection is held and the handle has not been released.
    pub fn is_connected(&self) -> bool {
        self.live_connection().is_some()
    }

    pub fn connect_error(&self) -> Option<&str> {
        self.connect_error.as_deref()
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    fn live_connection(&self) -> Option<&Connection> {
        if self.is_released() {
            None
        } else {
            self.connection.as_ref()
        }
    }

    pub fn store(&self) -> Option<&Arc<dyn RelationalStore>> {
        match self.live_connection() {
            Some(Connection::Store(store)) => Some(store),
            _ => None,
        }
    }

    pub fn cache(&self) -> Option<&Arc<dyn CacheStore>> {
        match self.live_connection() {
            Some(Connection::Cache(cache)) => Some(cache),
            _ => None,
        }
    }

    /// Probe the dependency once. Never fails; errors become
    /// [`ProbeResult::Failed`]. Unconfigured handles do no I/O.
    pub async fn probe(&self) -> ProbeResult {
        if !self.configured {
            return ProbeResult::NotConfigured;
        }
        if self.is_released() {
            return ProbeResult::Failed {
                cause: DependencyError::Released.to_string(),
            };
        }
        let Some(connection) = self.connection.as_ref() else {
            let cause = self.connect_error.as_deref().unwrap_or("no connection");
            return ProbeResult::Failed {
                cause: DependencyError::NotConnected(cause.to_string()).to_string(),
            };
        };

        match bounded(self.probe_timeout, connection.ping()).await {
            Ok(()) => ProbeResult::Ok,
            Err(e) => {
                tracing::debug!(dependency = %self.kind, error = %e, "Probe failed");
                ProbeResult::Failed {
                    cause: e.to_string(),
                }
            }
        }
    }

    /// Release the connection. Idempotent; errors are logged, never returned.
    pub async fn release(&self) {
        if self.released.swap(true, Ordering::AcqRel) {
            return;
        }
        let Some(connection) = self.connection.as_ref() else {
            return;
        };
        match connection.close().await {
            Ok(()) => tracing::info!(dependency = %self.kind, "Connection closed"),
            Err(e) => tracing::warn!(dependency = %self.kind, error = %e, "Failed to close connection"),
        }
    }
}

impl fmt::Debug for DependencyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DependencyHandle")
            .field("kind", &self.kind)
            .field("configured", &self.configured)
            .field("connected", &self.connection.is_some())
            .field("connect_error", &self.connect_error)
            .field("released", &self.is_released())
            .finish()
    }
}

/// Run `fut` with a deadline, folding the timeout into [`DependencyError`].
async fn bounded<T, F>(limit: Duration, fut: F) -> Result<T, DependencyError>
where
    F: std::future::Future<Output = Result<T, DependencyError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(DependencyError::Timeout(limit)),
    }
}

/// Deadline handed to a driver, kept inside the outer bound `outer` so the
/// driver's own error is reported before the outer timeout fires.
fn driver_deadline(outer: Duration) -> Duration {
    outer * 3 / 4
}

/// All dependency handles, in construction order.
#[derive(Debug, Default)]
pub struct Dependencies {
    handles: Vec<DependencyHandle>,
}

impl Dependencies {
    pub fn new(handles: Vec<DependencyHandle>) -> Self {
        Self { handles }
    }

    /// Connect every dependency named in configuration: store first, then cache.
    pub async fn connect(
        database: &DatabaseConfig,
        redis: &RedisConfig,
        probe_timeout: Duration,
    ) -> Self {
        let store = DependencyHandle::connect_store(database, probe_timeout).await;
        let cache = DependencyHandle::connect_cache(redis, probe_timeout).await;
        Self::new(vec![store, cache])
    }

    pub fn handles(&self) -> &[DependencyHandle] {
        &self.handles
    }

    pub fn get(&self, kind: DependencyKind) -> Option<&DependencyHandle> {
        self.handles.iter().find(|h| h.kind() == kind)
    }

    pub fn store(&self) -> Option<&Arc<dyn RelationalStore>> {
        self.get(DependencyKind::RelationalStore)
            .and_then(DependencyHandle::store)
    }

    pub fn cache(&self) -> Option<&Arc<dyn CacheStore>> {
        self.get(DependencyKind::CacheStore)
            .and_then(DependencyHandle::cache)
    }

    /// Startup warnings: one per configured dependency that failed to connect.
    pub fn connect_warnings(&self) -> Vec<String> {
        self.handles
            .iter()
            .filter_map(|h| {
                h.connect_error()
                    .map(|cause| format!("{} unavailable at startup: {}", h.kind(), cause))
            })
            .collect()
    }

    /// Release every handle in reverse construction order.
    pub async fn release_all(&self) {
        for handle in self.handles.iter().rev() {
            handle.release().await;
        }
    }
}
