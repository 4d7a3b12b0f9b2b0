//! Stream key administration
//!
//! Issue, inspect and revoke the secrets broadcasters publish with.

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use streamgate_core::models::{BroadcasterId, CreateStreamKeyRequest, StreamKey, StreamKeyId};

use crate::http::{AppResult, AppState};

#[derive(Debug, Default, Deserialize)]
pub struct ListStreamKeysQuery {
    pub broadcaster_id: Option<BroadcasterId>,
}

pub fn create_stream_key_router() -> Router<AppState> {
    Router::new()
        .route("/stream-keys", get(list_stream_keys).post(create_stream_key))
        .route(
            "/stream-keys/{id}",
            get(get_stream_key).delete(revoke_stream_key),
        )
}

/// POST /stream-keys
///
/// The response is the only place the secret is ever shown.
pub async fn create_stream_key(
    State(state): State<AppState>,
    payload: Result<Json<CreateStreamKeyRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<StreamKey>)> {
    let Json(request) = payload?;
    let key = state.stream_key_service.create(request).await?;
    Ok((StatusCode::CREATED, Json(key)))
}

/// GET /stream-keys[?broadcaster_id=...]
pub async fn list_stream_keys(
    State(state): State<AppState>,
    Query(query): Query<ListStreamKeysQuery>,
) -> AppResult<Json<Vec<StreamKey>>> {
    let keys = state
        .stream_key_service
        .list(query.broadcaster_id.as_ref())
        .await?;
    Ok(Json(keys))
}

/// GET /stream-keys/{id}
pub async fn get_stream_key(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<StreamKey>> {
    let key = state
        .stream_key_service
        .get(&StreamKeyId::from_string(id))
        .await?;
    Ok(Json(key))
}

/// DELETE /stream-keys/{id}
///
/// Revokes the key and ends its live broadcast. A failed media server
/// disconnect is logged by the service and does not fail the request.
pub async fn revoke_stream_key(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    state
        .revocation_service
        .revoke(&StreamKeyId::from_string(id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use crate::http::{middleware, test_support::*};
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    const PAST_EXPIRY: &str = r#"{"broadcaster_id":"b1","expires_at":"2000-01-01T00:00:00Z"}"#;

    fn now() -> i64 {
        chrono::Utc::now().timestamp()
    }

    #[tokio::test]
    async fn test_unsigned_request_is_rejected() {
        let response = test_router()
            .oneshot(Request::builder().uri("/stream-keys").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = body_json(response).await;
        assert_eq!(body["status"], 401);
    }

    #[tokio::test]
    async fn test_missing_signature_header_is_rejected() {
        let mut request = signed_request("GET", "/stream-keys", "", now());
        request.headers_mut().remove(middleware::SIGNATURE_HEADER);

        let response = test_router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_bad_signature_is_rejected() {
        let mut request = signed_request("POST", "/stream-keys", PAST_EXPIRY, now());
        request.headers_mut().insert(
            middleware::SIGNATURE_HEADER,
            "00".repeat(32).parse().unwrap(),
        );

        let response = test_router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_signature_for_another_body_is_rejected() {
        let mut request = signed_request("POST", "/stream-keys", "{}", now());
        *request.body_mut() = Body::from(PAST_EXPIRY);

        let response = test_router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_stale_timestamp_is_rejected() {
        let request = signed_request("POST", "/stream-keys", PAST_EXPIRY, now() - 301);

        let response = test_router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_future_timestamp_is_rejected() {
        let request = signed_request("POST", "/stream-keys", PAST_EXPIRY, now() + 301);

        let response = test_router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_non_numeric_timestamp_is_rejected() {
        let mut request = signed_request("GET", "/stream-keys", "", now());
        request
            .headers_mut()
            .insert(middleware::TIMESTAMP_HEADER, "yesterday".parse().unwrap());

        let response = test_router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_unknown_api_key_is_rejected() {
        let mut request = signed_request("GET", "/stream-keys", "", now());
        request
            .headers_mut()
            .insert(middleware::API_KEY_HEADER, "intruder".parse().unwrap());

        let response = test_router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_signed_request_reaches_handler_with_body() {
        // Validation runs before the store, so a 400 proves the body survived
        let request = signed_request("POST", "/stream-keys", PAST_EXPIRY, now());

        let response = test_router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"], "expires_at must be in the future");
    }

    #[tokio::test]
    async fn test_signature_ignores_query_string() {
        let request = signed_request("GET", "/stream-keys?broadcaster_id=b1", "", now());

        let response = test_router().oneshot(request).await.unwrap();
        // Authenticated; the lazy pool then fails to connect
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
