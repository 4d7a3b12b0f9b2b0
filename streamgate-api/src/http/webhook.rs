//! Media server lifecycle webhooks
//!
//! MediaMTX posts here from its `runOnReady` and `runOnNotReady` hooks. The
//! hooks need a 2xx to carry on, so anything short of the store being
//! unreachable is answered with 204 and left to the logs.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use streamgate_core::{models::SourceDescriptor, service::ReconcileOutcome};

use crate::http::{AppError, AppResult, AppState};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ReadyWebhook {
    pub path: String,
    pub source_type: String,
    pub source_id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NotReadyWebhook {
    pub path: String,
}

pub fn create_webhook_router() -> Router<AppState> {
    Router::new()
        .route("/webhook/ready", post(stream_ready))
        .route("/webhook/not-ready", post(stream_not_ready))
}

fn required_path(path: &str) -> AppResult<&str> {
    let path = path.strip_prefix('/').unwrap_or(path);
    if path.is_empty() {
        return Err(AppError::bad_request("path is required"));
    }
    Ok(path)
}

/// Only an unreachable store is worth a retry from the media server
fn into_status(result: streamgate_core::Result<ReconcileOutcome>) -> AppResult<StatusCode> {
    match result {
        Ok(_) => Ok(StatusCode::NO_CONTENT),
        Err(e) if e.is_store_unavailable() => Err(e.into()),
        // Logged and counted by the lifecycle service
        Err(_) => Ok(StatusCode::NO_CONTENT),
    }
}

/// POST /webhook/ready
pub async fn stream_ready(
    State(state): State<AppState>,
    payload: Result<Json<ReadyWebhook>, JsonRejection>,
) -> AppResult<StatusCode> {
    let Json(req) = payload.inspect_err(|e| {
        tracing::warn!(error = %e, "Failed to decode ready webhook");
    })?;
    let path = required_path(&req.path)?;

    tracing::debug!(
        path,
        source_type = %req.source_type,
        source_id = %req.source_id,
        "Ready webhook received"
    );

    let source = SourceDescriptor::from_raw(&req.source_type, &req.source_id);
    into_status(state.lifecycle_service.on_became_watchable(path, &source).await)
}

/// POST /webhook/not-ready
pub async fn stream_not_ready(
    State(state): State<AppState>,
    payload: Result<Json<NotReadyWebhook>, JsonRejection>,
) -> AppResult<StatusCode> {
    let Json(req) = payload.inspect_err(|e| {
        tracing::warn!(error = %e, "Failed to decode not-ready webhook");
    })?;
    let path = required_path(&req.path)?;

    tracing::debug!(path, "Not-ready webhook received");

    into_status(state.lifecycle_service.on_stopped(path).await)
}
