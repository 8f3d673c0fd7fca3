//! HTTP route handlers.
//!
//! Health and status responses are never cached so that probes always see
//! fresh results. Every route gets permissive CORS headers and a request ID
//! span.

pub mod example;
pub mod health;
pub mod root;
pub mod status;

use axum::{middleware, routing::get, Router};
use http::header::{HeaderValue, AUTHORIZATION, CACHE_CONTROL, CONTENT_TYPE};
use http::Method;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;

use crate::middleware::request_id_layer;
use crate::state::AppState;

const CACHE_CONTROL_NO_STORE: &str = "no-store";

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
}

/// Creates the Axum router with all routes.
pub fn create_router(state: AppState) -> Router {
    // Probe endpoints - always fresh
    let probe_routes = Router::new()
        .route("/health", get(health::health))
        .route("/status", get(status::status))
        .layer(SetResponseHeaderLayer::overriding(
            CACHE_CONTROL,
            HeaderValue::from_static(CACHE_CONTROL_NO_STORE),
        ));

    let app_routes = Router::new()
        .route("/", get(root::index))
        .route("/api/example", get(example::example));

    Router::new()
        .merge(probe_routes)
        .merge(app_routes)
        .with_state(state)
        .layer(cors_layer())
        // Request ID middleware - creates root span with request_id for correlation
        .layer(middleware::from_fn(request_id_layer))
}
