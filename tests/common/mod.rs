//! Shared fixtures: in-memory backends and request helpers.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::Router;
use chrono::Utc;
use http::{Request, StatusCode};
use tower::ServiceExt;

use vigil::config::AppConfig;
use vigil::dependency::{
    Backend, CacheStore, Connection, Dependencies, DependencyError, DependencyHandle,
    DependencyKind, RelationalStore, ServerClock,
};
use vigil::routes::create_router;
use vigil::AppState;

pub const PROBE_TIMEOUT: Duration = Duration::from_millis(500);

/// Backend whose reachability can be flipped at runtime.
///
/// Implements both store traits so one fake covers either dependency.
pub struct FakeBackend {
    name: &'static str,
    reachable: AtomicBool,
    pub pings: AtomicUsize,
    values: Mutex<HashMap<String, String>>,
    closed: Arc<Mutex<Vec<&'static str>>>,
}

impl FakeBackend {
    pub fn new(name: &'static str, reachable: bool) -> Arc<Self> {
        Self::with_close_log(name, reachable, Arc::new(Mutex::new(Vec::new())))
    }

    pub fn with_close_log(
        name: &'static str,
        reachable: bool,
        closed: Arc<Mutex<Vec<&'static str>>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            name,
            reachable: AtomicBool::new(reachable),
            pings: AtomicUsize::new(0),
            values: Mutex::new(HashMap::new()),
            closed,
        })
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), DependencyError> {
        if self.reachable.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(DependencyError::NotConnected("connection refused".to_string()))
        }
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn ping(&self) -> Result<(), DependencyError> {
        self.pings.fetch_add(1, Ordering::SeqCst);
        self.check()
    }

    async fn close(&self) -> Result<(), DependencyError> {
        self.closed.lock().unwrap().push(self.name);
        Ok(())
    }
}

#[async_trait]
impl RelationalStore for FakeBackend {
    async fn server_clock(&self) -> Result<ServerClock, DependencyError> {
        self.check()?;
        Ok(ServerClock {
            current_time: Utc::now(),
            database: "appdb".to_string(),
        })
    }
}

#[async_trait]
impl CacheStore for FakeBackend {
    async fn set_ex(&self, key: &str, value: &str, _ttl: Duration) -> Result<(), DependencyError> {
        self.check()?;
        self.values
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, DependencyError> {
        self.check()?;
        Ok(self.values.lock().unwrap().get(key).cloned())
    }
}

pub fn store_handle(backend: &Arc<FakeBackend>) -> DependencyHandle {
    DependencyHandle::connected(Connection::Store(backend.clone()), PROBE_TIMEOUT)
}

pub fn cache_handle(backend: &Arc<FakeBackend>) -> DependencyHandle {
    DependencyHandle::connected(Connection::Cache(backend.clone()), PROBE_TIMEOUT)
}

pub fn no_store() -> DependencyHandle {
    DependencyHandle::not_configured(DependencyKind::RelationalStore)
}

pub fn no_cache() -> DependencyHandle {
    DependencyHandle::not_configured(DependencyKind::CacheStore)
}

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.service.name = "test-service".to_string();
    config.service.environment = "test".to_string();
    config.http.host = "127.0.0.1".to_string();
    config.http.port = 0;
    config
}

pub fn app(store: DependencyHandle, cache: DependencyHandle) -> Router {
    create_router(AppState::new(test_config(), Dependencies::new(vec![store, cache])))
}

/// Issue a GET through the router and decode the JSON body.
pub async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}
