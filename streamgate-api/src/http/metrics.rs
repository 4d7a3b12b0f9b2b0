//! Prometheus exposition endpoint

use axum::{http::header, response::IntoResponse, routing::get, Router};

use crate::http::{AppError, AppResult, AppState};

pub fn create_metrics_router() -> Router<AppState> {
    Router::new().route("/metrics", get(metrics_handler))
}

pub async fn metrics_handler() -> AppResult<impl IntoResponse> {
    let body = streamgate_core::metrics::gather_metrics().map_err(|e| {
        tracing::error!("Failed to encode metrics: {}", e);
        AppError::internal_server_error("Failed to encode metrics")
    })?;

    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    ))
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
    async fn test_metrics_endpoint_serves_text() {
        let response = test_router()
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response
            .headers()
            .get("content-type")
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("text/plain"));
    }
}
