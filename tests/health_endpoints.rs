//! Router-level tests for the probe and example endpoints.

mod common;

use std::sync::atomic::Ordering;

use axum::body::Body;
use http::{header, Request, StatusCode};
use tower::ServiceExt;

use common::{app, cache_handle, get_json, no_cache, no_store, store_handle, FakeBackend};
use vigil::dependency::{DependencyHandle, DependencyKind};

#[tokio::test]
async fn test_health_store_up_cache_disabled() {
    let store = FakeBackend::new("store", true);
    let (status, body) = get_json(app(store_handle(&store), no_cache()), "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["checks"]["database"], "healthy");
    assert_eq!(body["checks"]["redis"], "not configured");
    assert_eq!(body["service"], "test-service");
    assert!(body["timestamp"].as_str().unwrap().ends_with('Z'));
}

#[tokio::test]
async fn test_health_store_down_is_unavailable() {
    let store = FakeBackend::new("store", false);
    let cache = FakeBackend::new("cache", true);
    let (status, body) = get_json(app(store_handle(&store), cache_handle(&cache)), "/health").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "unhealthy");
    assert_eq!(
        body["checks"]["database"],
        "unhealthy: not connected: connection refused"
    );
    assert_eq!(body["checks"]["redis"], "healthy");
}

#[tokio::test]
async fn test_health_cache_down_is_degraded_but_serving() {
    let cache = FakeBackend::new("cache", false);
    let (status, body) = get_json(app(no_store(), cache_handle(&cache)), "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["checks"]["database"], "not configured");
    assert!(body["checks"]["redis"]
        .as_str()
        .unwrap()
        .starts_with("unhealthy: "));
}

#[tokio::test]
async fn test_health_without_dependencies_is_healthy() {
    let (status, body) = get_json(app(no_store(), no_cache()), "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["checks"]["database"], "not configured");
    assert_eq!(body["checks"]["redis"], "not configured");
}

#[tokio::test]
async fn test_health_reports_failed_startup_connect() {
    let store = DependencyHandle::unavailable(DependencyKind::RelationalStore, "connection refused");
    let (status, body) = get_json(app(store, no_cache()), "/health").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(
        body["checks"]["database"],
        "unhealthy: not connected: connection refused"
    );
}

#[tokio::test]
async fn test_health_recovers_when_dependency_returns() {
    let store = FakeBackend::new("store", false);
    let router = app(store_handle(&store), no_cache());

    let (status, _) = get_json(router.clone(), "/health").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    store.set_reachable(true);
    let (status, body) = get_json(router, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_probe_endpoints_are_not_cacheable() {
    let router = app(no_store(), no_cache());
    for uri in ["/health", "/status"] {
        let response = router
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store", "{}", uri);
    }
}

#[tokio::test]
async fn test_status_reports_connectivity_and_runtime() {
    let store = FakeBackend::new("store", true);
    let (status, body) = get_json(app(store_handle(&store), no_cache()), "/status").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["service"], "test-service");
    assert_eq!(body["status"], "running");
    assert!(body["uptime"].as_f64().unwrap() >= 0.0);
    assert_eq!(body["connections"]["database"], true);
    assert_eq!(body["connections"]["redis"], false);
    assert_eq!(body["environment"]["env"], "test");
    assert!(body["environment"]["numCpu"].as_u64().unwrap() >= 1);
    assert_eq!(body["environment"]["serviceVersion"], env!("CARGO_PKG_VERSION"));
    assert!(body["memory"]["alloc"].is_number());
    assert!(body["memory"]["totalAlloc"].is_number());
}

#[tokio::test]
async fn test_status_is_ok_even_when_store_is_down() {
    let store = FakeBackend::new("store", false);
    let (status, body) = get_json(app(store_handle(&store), no_cache()), "/status").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["connections"]["database"], false);
}

#[tokio::test]
async fn test_health_and_status_probe_independently() {
    let store = FakeBackend::new("store", true);
    let router = app(store_handle(&store), no_cache());

    let (_, health) = get_json(router.clone(), "/health").await;
    store.set_reachable(false);
    let (_, status) = get_json(router, "/status").await;

    // Each endpoint ran its own probe against the flapping store
    assert_eq!(health["checks"]["database"], "healthy");
    assert_eq!(status["connections"]["database"], false);
    assert_eq!(store.pings.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_root_banner() {
    let (status, body) = get_json(app(no_store(), no_cache()), "/").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Hello from test-service!");
    assert_eq!(body["environment"], "test");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_example_without_dependencies() {
    let (status, body) = get_json(app(no_store(), no_cache()), "/api/example").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["message"], "Database not connected");
    assert_eq!(body["source"], "live");
    assert!(body.get("cached").is_none());
}

#[tokio::test]
async fn test_example_with_both_dependencies() {
    let store = FakeBackend::new("store", true);
    let cache = FakeBackend::new("cache", true);
    let (status, body) = get_json(
        app(store_handle(&store), cache_handle(&cache)),
        "/api/example",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["database"], "appdb");
    assert!(body["data"]["current_time"].is_string());
    assert!(body["cached"].as_str().unwrap().ends_with('Z'));
}

#[tokio::test]
async fn test_example_ignores_cache_errors() {
    let cache = FakeBackend::new("cache", false);
    let (status, body) = get_json(app(no_store(), cache_handle(&cache)), "/api/example").await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.get("cached").is_none());
}

#[tokio::test]
async fn test_example_store_query_failure_is_500() {
    let store = FakeBackend::new("store", false);
    let (status, body) = get_json(app(store_handle(&store), no_cache()), "/api/example").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_cors_headers_on_responses() {
    let response = app(no_store(), no_cache())
        .oneshot(
            Request::builder()
                .uri("/health")
                .header(header::ORIGIN, "https://example.com")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let id = "0b7a2c1e-5d3f-4a8b-9c6d-1e2f3a4b5c6d";
    let response = app(no_store(), no_cache())
        .oneshot(
            Request::builder()
                .uri("/")
                .header("x-request-id", id)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.headers()["x-request-id"], id);
}
