use axum::{extract::State, Json};

use crate::state::AppState;
use crate::status::{report, StatusSnapshot};

/// Operational snapshot: uptime, memory, runtime facts, connectivity.
pub async fn status(State(state): State<AppState>) -> Json<StatusSnapshot> {
    let snapshot = report(
        &state.config.service,
        state.dependencies.handles(),
        state.started_at,
    )
    .await;
    Json(snapshot)
}
