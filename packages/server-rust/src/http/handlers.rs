//! Handlers for the agent's local control API.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::json;

use super::AppState;
use crate::lifecycle::{ControlMessage, HealthState};

/// Detailed health information. Always 200 -- the `state` field carries the actual signal, so
/// monitoring tools can distinguish "up but draining" from "down".
pub async fn health_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    let health = state.lifecycle.health_state();
    let queued = state.queue.count().await.unwrap_or(0);
    let escalated = state
        .queue
        .escalated_count(state.config.sync.escalation_threshold)
        .await
        .unwrap_or(0);
    let clients = state.clients.count();
    let uptime_secs = state.start_time.elapsed().as_secs();

    Json(json!({
        "state": health.as_str(),
        "queued": queued,
        "escalated": escalated,
        "clients": clients,
        "uptime_secs": uptime_secs,
    }))
}

pub async fn liveness_handler() -> StatusCode {
    StatusCode::OK
}

pub async fn readiness_handler(State(state): State<AppState>) -> StatusCode {
    if state.lifecycle.health_state() == HealthState::Ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// `POST /control/sync`: dispatches a [`ControlMessage`] sent as the request body.
pub async fn control_sync_handler(
    State(state): State<AppState>,
    Json(message): Json<ControlMessage>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let now = state.clock.now_millis();
    let reply = state
        .control
        .handle(message, now)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(Json(serde_json::to_value(reply).unwrap_or(json!(null))))
}

/// `GET /control/queue`: the current durable queue, for operator inspection.
pub async fn control_queue_handler(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let records = state
        .queue
        .list()
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(Json(json!({ "records": records })))
}
