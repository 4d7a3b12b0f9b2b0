//! Health check endpoints
//!
//! Provides a readiness probe that also pings the database.

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;
use std::time::Duration;

use crate::http::AppState;

const DATABASE_PING_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: &'static str,
}

/// Health check router
pub fn create_health_router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

/// 200 when the database answers within two seconds, 503 otherwise
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let ping = tokio::time::timeout(DATABASE_PING_TIMEOUT, sqlx::query("SELECT 1").execute(&state.pool)).await;

    match ping {
        Ok(Ok(_)) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ok",
                database: "ok",
            }),
        ),
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "Health check database ping failed");
            degraded()
        }
        Err(_) => {
            tracing::warn!("Health check database ping timed out");
            degraded()
        }
    }
}

fn degraded() -> (StatusCode, Json<HealthResponse>) {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(HealthResponse {
            status: "degraded",
            database: "unreachable",
        }),
    )
}
