//! HTTP endpoint handlers

use std::sync::Arc;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::Value;
use tracing::{info, warn};

use crate::{state::AppState, tasks::SyncOutcome};
use super::responses::HealthResponse;

/// Handle POST /messages - Dispatch one protocol message
pub async fn message_handler(
    State(state): State<Arc<AppState>>,
    Json(message): Json<Value>,
) -> Response {
    match state.handle_message(message).await {
        Ok(Some(reply)) => (StatusCode::OK, Json(reply)).into_response(),
        Ok(None) => StatusCode::ACCEPTED.into_response(),
        Err(e) => {
            warn!("Rejected message: {}", e);
            (StatusCode::BAD_REQUEST, e.to_string()).into_response()
        }
    }
}

/// Handle POST /sync/:tag - Connectivity restored
pub async fn sync_handler(
    State(state): State<Arc<AppState>>,
    Path(tag): Path<String>,
) -> Response {
    match state.request_sync(&tag).await {
        SyncOutcome::Flushed(report) => {
            info!("Sync endpoint called - {} sessions delivered", report.delivered);
            (StatusCode::OK, Json(report)).into_response()
        }
        SyncOutcome::Ignored => StatusCode::ACCEPTED.into_response(),
        SyncOutcome::Failed => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

/// Handle GET /health - Health check endpoint
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let status = state.loop_status();
    let (last_action, last_action_time) = state.get_last_action();

    Json(HealthResponse::ok(
        state.get_uptime(),
        status.live_timers,
        last_action,
        last_action_time,
    ))
}
