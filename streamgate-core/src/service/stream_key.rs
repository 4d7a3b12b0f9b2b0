//! Stream key issuance and lookup

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::Utc;
use rand::RngCore;
use tracing::info;

use crate::{
    models::{BroadcasterId, CreateStreamKeyRequest, StreamKey, StreamKeyId},
    repository::StreamKeyRepository,
    Error, Result,
};

const KEY_PREFIX: &str = "sk_";
const KEY_BYTES: usize = 32;

/// Generate a new secret: `sk_` followed by 32 random bytes, base64url encoded
#[must_use]
pub fn generate_key_value() -> String {
    let mut bytes = [0u8; KEY_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    format!("{KEY_PREFIX}{}", URL_SAFE_NO_PAD.encode(bytes))
}

#[derive(Clone)]
pub struct StreamKeyService {
    repo: StreamKeyRepository,
}

impl std::fmt::Debug for StreamKeyService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamKeyService").finish()
    }
}

impl StreamKeyService {
    #[must_use]
    pub const fn new(repo: StreamKeyRepository) -> Self {
        Self { repo }
    }

    /// Issue a new active key. The only response that carries the secret.
    pub async fn create(&self, request: CreateStreamKeyRequest) -> Result<StreamKey> {
        if request.broadcaster_id.as_str().is_empty() {
            return Err(Error::InvalidInput("broadcaster_id is required".to_string()));
        }
        if let Some(expires_at) = request.expires_at {
            if expires_at <= Utc::now() {
                return Err(Error::InvalidInput("expires_at must be in the future".to_string()));
            }
        }

        let key = StreamKey::new(generate_key_value(), request.broadcaster_id, request.expires_at);
        let created = self.repo.create(&key).await.map_err(|e| match e {
            Error::NotFound(_) => Error::NotFound(format!(
                "Broadcaster {} not found",
                key.broadcaster_id
            )),
            other => other,
        })?;

        info!(
            stream_key_id = %created.id,
            broadcaster_id = %created.broadcaster_id,
            expires_at = ?created.expires_at,
            "Stream key issued"
        );
        Ok(created)
    }

    /// Fetch one key, secret redacted
    pub async fn get(&self, id: &StreamKeyId) -> Result<StreamKey> {
        self.repo
            .get_by_id(id)
            .await?
            .map(StreamKey::redacted)
            .ok_or_else(|| Error::NotFound(format!("Stream key {id} not found")))
    }

    /// List keys, optionally for one broadcaster, secrets redacted
    pub async fn list(&self, broadcaster_id: Option<&BroadcasterId>) -> Result<Vec<StreamKey>> {
        let keys = match broadcaster_id {
            Some(id) => self.repo.list_by_broadcaster(id).await?,
            None => self.repo.list().await?,
        };
        Ok(keys.into_iter().map(StreamKey::redacted).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StreamKeyStatus;
    use crate::test_helpers::{insert_broadcaster, lazy_pool};
    use chrono::Duration;
    use sqlx::PgPool;

    #[test]
    fn test_generated_key_format() {
        let key = generate_key_value();
        assert!(key.starts_with("sk_"));
        // 32 bytes -> 43 base64 characters without padding
        assert_eq!(key.len(), 3 + 43);
        assert!(key[3..]
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        assert_ne!(key, generate_key_value());
    }

    #[tokio::test]
    async fn test_past_expiry_rejected_before_store() {
        let service = StreamKeyService::new(StreamKeyRepository::new(lazy_pool()));
        let err = service
            .create(CreateStreamKeyRequest {
                broadcaster_id: BroadcasterId::from_string("broadcaster1".to_string()),
                expires_at: Some(Utc::now() - Duration::minutes(5)),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[sqlx::test(migrations = "../migrations")]
    #[ignore = "Requires database"]
    async fn test_create_returns_secret_once(pool: PgPool) {
        let broadcaster = insert_broadcaster(&pool).await;
        let service = StreamKeyService::new(StreamKeyRepository::new(pool));

        let created = service
            .create(CreateStreamKeyRequest {
                broadcaster_id: broadcaster.id.clone(),
                expires_at: Some(Utc::now() + Duration::days(1)),
            })
            .await
            .unwrap();
        assert!(created.key_value.starts_with("sk_"));
        assert_eq!(created.status, StreamKeyStatus::Active);

        let fetched = service.get(&created.id).await.unwrap();
        assert!(fetched.key_value.is_empty());

        let listed = service.list(Some(&broadcaster.id)).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert!(listed[0].key_value.is_empty());
    }

    #[sqlx::test(migrations = "../migrations")]
    #[ignore = "Requires database"]
    async fn test_create_for_unknown_broadcaster(pool: PgPool) {
        let service = StreamKeyService::new(StreamKeyRepository::new(pool));
        let err = service
            .create(CreateStreamKeyRequest {
                broadcaster_id: BroadcasterId::from_string("ghost0000000".to_string()),
                expires_at: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(msg) if msg.contains("ghost0000000")));
    }
}
