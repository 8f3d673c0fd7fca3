//! Example endpoint exercising both backing stores.
//!
//! Reads the database clock when the store is connected and round-trips a
//! timestamp through the cache when it is connected. Cache errors are
//! ignored; a database query error fails the request.

use std::time::Duration;

use axum::{extract::State, Json};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::AppError;
use crate::state::AppState;

const LAST_REQUEST_KEY: &str = "last_request";
const LAST_REQUEST_TTL: Duration = Duration::from_secs(60);

#[derive(Debug, Serialize)]
pub struct ExampleResponse {
    pub data: Value,
    pub source: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cached: Option<String>,
}

pub async fn example(State(state): State<AppState>) -> Result<Json<ExampleResponse>, AppError> {
    let mut data = Map::new();
    match state.dependencies.store() {
        Some(store) => {
            let clock = store.server_clock().await.map_err(AppError::Database)?;
            data.insert(
                "current_time".to_string(),
                Value::String(clock.current_time.to_rfc3339_opts(SecondsFormat::Secs, true)),
            );
            data.insert("database".to_string(), Value::String(clock.database));
        }
        None => {
            data.insert(
                "message".to_string(),
                Value::String("Database not connected".to_string()),
            );
        }
    }

    let mut cached = None;
    if let Some(cache) = state.dependencies.cache() {
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        if let Err(e) = cache.set_ex(LAST_REQUEST_KEY, &now, LAST_REQUEST_TTL).await {
            tracing::debug!(error = %e, "Cache write failed");
        }
        cached = match cache.get(LAST_REQUEST_KEY).await {
            Ok(value) => value,
            Err(e) => {
                tracing::debug!(error = %e, "Cache read failed");
                None
            }
        };
    }

    Ok(Json(ExampleResponse {
        data: Value::Object(data),
        source: "live",
        cached,
    }))
}
