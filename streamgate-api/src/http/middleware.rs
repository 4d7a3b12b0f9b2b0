//! HTTP middleware
//!
//! - Signed admin requests (HMAC-SHA256 over method, path, timestamp and body)
//! - Request metrics
//! - Request id generation

use axum::{
    body::{to_bytes, Body},
    extract::{MatchedPath, Request, State},
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::time::Instant;
use subtle::ConstantTimeEq;
use tower_http::request_id::{MakeRequestId, RequestId};
use tracing::{debug, warn};

use super::{AppError, AppState};
use streamgate_core::config::AdminConfig;

type HmacSha256 = Hmac<Sha256>;

pub const API_KEY_HEADER: &str = "x-api-key";
pub const SIGNATURE_HEADER: &str = "x-signature";
pub const TIMESTAMP_HEADER: &str = "x-timestamp";

/// Largest admin request body that will be buffered for signing
const MAX_SIGNED_BODY_BYTES: usize = 1024 * 1024;

/// Resolves an admin API key to its signing secret
pub trait KeyStore: Send + Sync {
    fn secret_for(&self, api_key: &str) -> Option<String>;
}

/// Single key/secret pair from configuration.
///
/// An empty configured key accepts any non-empty key, so deployments can
/// rely on the shared secret alone.
#[derive(Clone)]
pub struct ConfigKeyStore {
    api_key: String,
    api_secret: String,
}

impl std::fmt::Debug for ConfigKeyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigKeyStore")
            .field("api_key", &self.api_key)
            .finish_non_exhaustive()
    }
}

impl ConfigKeyStore {
    #[must_use]
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
        }
    }

    #[must_use]
    pub fn from_config(config: &AdminConfig) -> Self {
        Self::new(config.api_key.clone(), config.api_secret.clone())
    }
}

impl KeyStore for ConfigKeyStore {
    fn secret_for(&self, api_key: &str) -> Option<String> {
        if api_key.is_empty() || self.api_secret.is_empty() {
            return None;
        }
        if !self.api_key.is_empty() && self.api_key != api_key {
            return None;
        }
        Some(self.api_secret.clone())
    }
}

/// Hex HMAC-SHA256 of `"{method}\n{path}\n{timestamp}\n{body}"`
#[must_use]
pub fn sign_request(secret: &str, method: &str, path: &str, timestamp: &str, body: &[u8]) -> String {
    // HMAC accepts keys of any length
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return String::new();
    };
    mac.update(method.as_bytes());
    mac.update(b"\n");
    mac.update(path.as_bytes());
    mac.update(b"\n");
    mac.update(timestamp.as_bytes());
    mac.update(b"\n");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
}

/// Reject admin requests without a valid, fresh signature.
///
/// The body is buffered to verify the signature and handed on unchanged.
pub async fn require_signature(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let headers = request.headers();
    let (Some(api_key), Some(signature), Some(timestamp)) = (
        header(headers, API_KEY_HEADER),
        header(headers, SIGNATURE_HEADER),
        header(headers, TIMESTAMP_HEADER),
    ) else {
        return Err(AppError::unauthorized("Missing authentication headers"));
    };

    let Ok(ts) = timestamp.parse::<i64>() else {
        return Err(AppError::unauthorized("Invalid timestamp"));
    };
    let drift = (chrono::Utc::now().timestamp() - ts).abs();
    if drift > state.max_timestamp_drift_seconds {
        debug!(drift, "Rejected admin request with stale timestamp");
        return Err(AppError::unauthorized("Request timestamp out of range"));
    }

    let Some(secret) = state.key_store.secret_for(api_key) else {
        warn!("Rejected admin request with unknown API key");
        return Err(AppError::unauthorized("Invalid API key"));
    };

    let api_key = api_key.to_string();
    let signature = signature.to_string();
    let timestamp = timestamp.to_string();

    let (parts, body) = request.into_parts();
    let bytes = to_bytes(body, MAX_SIGNED_BODY_BYTES)
        .await
        .map_err(|_| AppError::bad_request("Request body too large"))?;

    let expected = sign_request(
        &secret,
        parts.method.as_str(),
        parts.uri.path(),
        &timestamp,
        &bytes,
    );
    if !bool::from(expected.as_bytes().ct_eq(signature.as_bytes())) {
        warn!(api_key = %api_key, path = %parts.uri.path(), "Rejected admin request with bad signature");
        return Err(AppError::unauthorized("Invalid signature"));
    }

    let request = Request::from_parts(parts, Body::from(bytes));
    Ok(next.run(request).await)
}

/// Record request count and latency per matched route
pub async fn track_metrics(request: Request, next: Next) -> Response {
    let endpoint = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| "unmatched".to_string(), |p| p.as_str().to_string());
    let method = request.method().clone();
    let start = Instant::now();

    let response = next.run(request).await;

    streamgate_core::record_http_request!(
        endpoint.as_str(),
        method.as_str(),
        response.status(),
        start.elapsed()
    );

    response
}

/// Request ids for `x-request-id` when the caller sent none
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeNanoRequestId;

impl MakeRequestId for MakeNanoRequestId {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&nanoid::nanoid!(21))
            .ok()
            .map(RequestId::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_is_stable_hex() {
        let a = sign_request("secret", "POST", "/stream-keys", "1700000000", b"{}");
        let b = sign_request("secret", "POST", "/stream-keys", "1700000000", b"{}");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_signature_covers_every_field() {
        let base = sign_request("secret", "POST", "/stream-keys", "1700000000", b"{}");
        assert_ne!(base, sign_request("other", "POST", "/stream-keys", "1700000000", b"{}"));
        assert_ne!(base, sign_request("secret", "GET", "/stream-keys", "1700000000", b"{}"));
        assert_ne!(base, sign_request("secret", "POST", "/broadcasters", "1700000000", b"{}"));
        assert_ne!(base, sign_request("secret", "POST", "/stream-keys", "1700000001", b"{}"));
        assert_ne!(base, sign_request("secret", "POST", "/stream-keys", "1700000000", b"[]"));
    }

    #[test]
    fn test_config_key_store_with_fixed_key() {
        let store = ConfigKeyStore::new("admin", "s3cret");
        assert_eq!(store.secret_for("admin").as_deref(), Some("s3cret"));
        assert_eq!(store.secret_for("someone-else"), None);
        assert_eq!(store.secret_for(""), None);
    }

    #[test]
    fn test_config_key_store_without_fixed_key() {
        let store = ConfigKeyStore::new("", "s3cret");
        assert_eq!(store.secret_for("anything").as_deref(), Some("s3cret"));
        assert_eq!(store.secret_for(""), None);
    }

    #[test]
    fn test_config_key_store_without_secret_rejects_everything() {
        let store = ConfigKeyStore::new("admin", "");
        assert_eq!(store.secret_for("admin"), None);
    }
}
