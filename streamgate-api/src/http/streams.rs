//! Live stream listing with playback URLs

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use streamgate_core::models::{BroadcastId, BroadcastWithUrls};

use crate::http::{AppResult, AppState};

pub fn create_stream_router() -> Router<AppState> {
    Router::new()
        .route("/streams", get(list_streams))
        .route("/streams/{id}", get(get_stream))
}

/// GET /streams
///
/// Live broadcasts only.
pub async fn list_streams(State(state): State<AppState>) -> AppResult<Json<Vec<BroadcastWithUrls>>> {
    Ok(Json(state.stream_service.list_live().await?))
}

/// GET /streams/{id}
pub async fn get_stream(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<BroadcastWithUrls>> {
    let stream = state
        .stream_service
        .get(&BroadcastId::from_string(id))
        .await?;
    Ok(Json(stream))
}

#[cfg(test)]
mod tests {
    use crate::http::test_support::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_listing_requires_signature() {
        let response = test_router()
            .oneshot(Request::builder().uri("/streams").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_signed_listing_reports_unreachable_store() {
        let request = signed_request("GET", "/streams", "", chrono::Utc::now().timestamp());

        let response = test_router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
