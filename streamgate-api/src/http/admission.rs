//! Media server authentication hook
//!
//! MediaMTX calls `POST /auth` for every publish and read attempt. Only the
//! status code matters to it: 200 admits, anything else refuses.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use streamgate_core::service::AdmissionRequest;

use crate::http::{AppError, AppResult, AppState};

pub fn create_admission_router() -> Router<AppState> {
    Router::new().route("/auth", post(authenticate))
}

/// POST /auth
///
/// 200 admitted, 401 rejected, 500 when no decision could be reached.
pub async fn authenticate(
    State(state): State<AppState>,
    payload: Result<Json<AdmissionRequest>, JsonRejection>,
) -> AppResult<StatusCode> {
    let Json(request) = payload.inspect_err(|e| {
        tracing::warn!(error = %e, "Failed to decode auth request");
    })?;

    let decision = state
        .admission_service
        .authenticate(&request)
        .await
        // Already logged with full context by the service
        .map_err(|_| AppError::internal_server_error("Authentication failed"))?;

    if decision.admitted {
        Ok(StatusCode::OK)
    } else {
        Ok(StatusCode::UNAUTHORIZED)
    }
}

#[cfg(test)]
mod tests {
    use crate::http::test_support::*;
    use axum::http::StatusCode;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_read_is_admitted_without_store() {
        let body = r#"{"action":"read","path":"live","ip":"10.0.0.1","protocol":"hls"}"#;
        let response = test_router()
            .oneshot(json_request("POST", "/auth", body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_publish_without_credential_is_rejected() {
        let body = r#"{"action":"publish","path":"","ip":"10.0.0.1"}"#;
        let response = test_router()
            .oneshot(json_request("POST", "/auth", body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_missing_fields_default_to_empty() {
        // No action means a non-mutating request
        let response = test_router()
            .oneshot(json_request("POST", "/auth", "{}"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_malformed_body_is_bad_request() {
        let response = test_router()
            .oneshot(json_request("POST", "/auth", "not json"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_store_failure_is_internal_error() {
        let body = r#"{"action":"publish","path":"sk_unknown","ip":"10.0.0.1"}"#;
        let response = test_router()
            .oneshot(json_request("POST", "/auth", body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
