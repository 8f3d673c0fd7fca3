//! Readiness endpoint for container orchestration.
//!
//! Reports the composite dependency health. Responds 503 only when the
//! service is unhealthy; a degraded service (cache down) still answers 200
//! so it stays in rotation.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use crate::health::{aggregate, HealthStatus};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    #[serde(flatten)]
    pub health: HealthStatus,
    pub service: String,
    pub timestamp: String,
}

impl IntoResponse for HealthResponse {
    fn into_response(self) -> Response {
        let code = if self.health.overall.is_unavailable() {
            StatusCode::SERVICE_UNAVAILABLE
        } else {
            StatusCode::OK
        };
        (code, Json(self)).into_response()
    }
}

/// Health check handler.
pub async fn health(State(state): State<AppState>) -> HealthResponse {
    let health = aggregate(state.dependencies.handles()).await;
    HealthResponse {
        health,
        service: state.config.service.name.clone(),
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
    }
}
