// Module: http
// Media server hooks, probes and the signed admin API

pub mod admission;
pub mod broadcasters;
pub mod error;
pub mod health;
pub mod metrics;
pub mod middleware;
pub mod stream_keys;
pub mod streams;
pub mod webhook;

use axum::{body::Body, http::Request, Router};
use sqlx::PgPool;
use std::sync::Arc;
use streamgate_core::{
    bootstrap::Services,
    config::AdminConfig,
    service::{
        AdmissionService, BroadcasterService, LifecycleService, RevocationService,
        StreamKeyService, StreamService,
    },
};
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

pub use error::{AppError, AppResult};
use middleware::{ConfigKeyStore, KeyStore, MakeNanoRequestId};

/// Largest request body accepted on any route
const MAX_BODY_BYTES: usize = 64 * 1024;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub admission_service: Arc<AdmissionService>,
    pub lifecycle_service: Arc<LifecycleService>,
    pub revocation_service: Arc<RevocationService>,
    pub stream_key_service: Arc<StreamKeyService>,
    pub broadcaster_service: Arc<BroadcasterService>,
    pub stream_service: Arc<StreamService>,
    /// Used by the health probe
    pub pool: PgPool,
    pub key_store: Arc<dyn KeyStore>,
    pub max_timestamp_drift_seconds: i64,
}

impl AppState {
    #[must_use]
    pub fn new(services: Services, pool: PgPool, admin: &AdminConfig) -> Self {
        Self {
            admission_service: services.admission,
            lifecycle_service: services.lifecycle,
            revocation_service: services.revocation,
            stream_key_service: services.stream_keys,
            broadcaster_service: services.broadcasters,
            stream_service: services.streams,
            pool,
            key_store: Arc::new(ConfigKeyStore::from_config(admin)),
            max_timestamp_drift_seconds: admin.max_timestamp_drift_seconds,
        }
    }
}

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    let admin = Router::new()
        .merge(stream_keys::create_stream_key_router())
        .merge(broadcasters::create_broadcaster_router())
        .merge(streams::create_stream_router())
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::require_signature,
        ));

    let router = Router::new()
        .merge(health::create_health_router())
        .merge(metrics::create_metrics_router())
        .merge(admission::create_admission_router())
        .merge(webhook::create_webhook_router())
        .merge(admin)
        .route_layer(axum::middleware::from_fn(middleware::track_metrics));

    // Apply layers before state; the request id is set outermost so the
    // trace span can record it
    let router = router
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default();
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id,
                )
            }),
        )
        .layer(SetRequestIdLayer::x_request_id(MakeNanoRequestId));

    // Apply state to all routes (must be last)
    router.with_state(state)
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_request_id_is_generated() {
        let response = test_router()
            .oneshot(
                Request::builder()
                    .uri("/nope")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let id = response.headers().get("x-request-id").unwrap();
        assert!(!id.is_empty());
    }

    #[tokio::test]
    async fn test_request_id_is_echoed() {
        let response = test_router()
            .oneshot(
                Request::builder()
                    .uri("/metrics")
                    .header("x-request-id", "abc123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.headers().get("x-request-id").unwrap(), "abc123");
    }
}
