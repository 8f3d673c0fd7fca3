use axum::{extract::State, Json};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct IndexResponse {
    pub message: String,
    pub service: String,
    pub version: &'static str,
    pub environment: String,
    pub timestamp: String,
}

/// Service banner.
pub async fn index(State(state): State<AppState>) -> Json<IndexResponse> {
    let service = &state.config.service;
    Json(IndexResponse {
        message: format!("Hello from {}!", service.name),
        service: service.name.clone(),
        version: env!("CARGO_PKG_VERSION"),
        environment: service.environment.clone(),
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
    })
}
