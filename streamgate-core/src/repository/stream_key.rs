//! Stream key repository
//!
//! Keys are looked up by their secret value on every publish attempt, so the
//! locking variants here are the serialization point for admission and
//! revocation. They must be called with a transaction as the executor.

use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, PgPool, Row};

use crate::{
    models::{BroadcasterId, StreamKey, StreamKeyId, StreamKeyStatus},
    Error, Result,
};

/// Stream key repository for database operations
#[derive(Clone)]
pub struct StreamKeyRepository {
    pool: PgPool,
}

impl StreamKeyRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get the database pool
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Insert a new stream key
    pub async fn create(&self, key: &StreamKey) -> Result<StreamKey> {
        let row = sqlx::query(
            r"
            INSERT INTO stream_keys (id, key_value, broadcaster_id, status, created_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, key_value, broadcaster_id, status, created_at, expires_at, revoked_at, last_used_at
            ",
        )
        .bind(key.id.as_str())
        .bind(&key.key_value)
        .bind(key.broadcaster_id.as_str())
        .bind(key.status.as_str())
        .bind(key.created_at)
        .bind(key.expires_at)
        .fetch_one(&self.pool)
        .await?;

        Self::row_to_stream_key(&row)
    }

    /// Get stream key by ID
    pub async fn get_by_id(&self, id: &StreamKeyId) -> Result<Option<StreamKey>> {
        let row = sqlx::query(
            r"
            SELECT id, key_value, broadcaster_id, status, created_at, expires_at, revoked_at, last_used_at
            FROM stream_keys
            WHERE id = $1
            ",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_stream_key).transpose()
    }

    /// Get stream key by its secret value (no lock)
    pub async fn get_by_key_value(&self, key_value: &str) -> Result<Option<StreamKey>> {
        let row = sqlx::query(
            r"
            SELECT id, key_value, broadcaster_id, status, created_at, expires_at, revoked_at, last_used_at
            FROM stream_keys
            WHERE key_value = $1
            ",
        )
        .bind(key_value)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_stream_key).transpose()
    }

    /// Get stream key by secret value with a row-level lock (FOR UPDATE).
    ///
    /// Concurrent callers for the same key block here until the holder's
    /// transaction ends.
    pub async fn get_by_key_value_for_update<'e, E>(
        &self,
        key_value: &str,
        executor: E,
    ) -> Result<Option<StreamKey>>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let row = sqlx::query(
            r"
            SELECT id, key_value, broadcaster_id, status, created_at, expires_at, revoked_at, last_used_at
            FROM stream_keys
            WHERE key_value = $1
            FOR UPDATE
            ",
        )
        .bind(key_value)
        .fetch_optional(executor)
        .await?;

        row.as_ref().map(Self::row_to_stream_key).transpose()
    }

    /// Get stream key by ID with a row-level lock (FOR UPDATE)
    pub async fn get_by_id_for_update<'e, E>(
        &self,
        id: &StreamKeyId,
        executor: E,
    ) -> Result<Option<StreamKey>>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let row = sqlx::query(
            r"
            SELECT id, key_value, broadcaster_id, status, created_at, expires_at, revoked_at, last_used_at
            FROM stream_keys
            WHERE id = $1
            FOR UPDATE
            ",
        )
        .bind(id.as_str())
        .fetch_optional(executor)
        .await?;

        row.as_ref().map(Self::row_to_stream_key).transpose()
    }

    /// List all stream keys, newest first
    pub async fn list(&self) -> Result<Vec<StreamKey>> {
        let rows = sqlx::query(
            r"
            SELECT id, key_value, broadcaster_id, status, created_at, expires_at, revoked_at, last_used_at
            FROM stream_keys
            ORDER BY created_at DESC
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_stream_key).collect()
    }

    /// List the stream keys owned by a broadcaster, newest first
    pub async fn list_by_broadcaster(&self, broadcaster_id: &BroadcasterId) -> Result<Vec<StreamKey>> {
        let rows = sqlx::query(
            r"
            SELECT id, key_value, broadcaster_id, status, created_at, expires_at, revoked_at, last_used_at
            FROM stream_keys
            WHERE broadcaster_id = $1
            ORDER BY created_at DESC
            ",
        )
        .bind(broadcaster_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_stream_key).collect()
    }

    /// Mark an active key expired. Returns false if the key was not active.
    pub async fn mark_expired_with_executor<'e, E>(&self, id: &StreamKeyId, executor: E) -> Result<bool>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let result = sqlx::query(
            r"
            UPDATE stream_keys
            SET status = 'expired'
            WHERE id = $1 AND status = 'active'
            ",
        )
        .bind(id.as_str())
        .execute(executor)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Mark an active key revoked.
    ///
    /// The `status = 'active'` guard makes this a no-op for keys that already
    /// left the active state; that case surfaces as `NotFound`.
    pub async fn mark_revoked_with_executor<'e, E>(
        &self,
        id: &StreamKeyId,
        revoked_at: DateTime<Utc>,
        executor: E,
    ) -> Result<StreamKey>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let row = sqlx::query(
            r"
            UPDATE stream_keys
            SET status = 'revoked', revoked_at = $2
            WHERE id = $1 AND status = 'active'
            RETURNING id, key_value, broadcaster_id, status, created_at, expires_at, revoked_at, last_used_at
            ",
        )
        .bind(id.as_str())
        .bind(revoked_at)
        .fetch_optional(executor)
        .await?;

        match row {
            Some(row) => Self::row_to_stream_key(&row),
            None => Err(Error::NotFound(format!("Active stream key {id} not found"))),
        }
    }

    /// Record a successful authentication
    pub async fn touch_last_used_with_executor<'e, E>(
        &self,
        id: &StreamKeyId,
        used_at: DateTime<Utc>,
        executor: E,
    ) -> Result<()>
    where
        E: sqlx::PgExecutor<'e>,
    {
        sqlx::query(
            r"
            UPDATE stream_keys
            SET last_used_at = $2
            WHERE id = $1
            ",
        )
        .bind(id.as_str())
        .bind(used_at)
        .execute(executor)
        .await?;

        Ok(())
    }

    /// Convert database row to `StreamKey` model
    fn row_to_stream_key(row: &PgRow) -> Result<StreamKey> {
        let status: String = row.try_get("status")?;
        let status = status.parse::<StreamKeyStatus>().map_err(Error::Internal)?;

        Ok(StreamKey {
            id: StreamKeyId::from_string(row.try_get("id")?),
            key_value: row.try_get("key_value")?,
            broadcaster_id: BroadcasterId::from_string(row.try_get("broadcaster_id")?),
            status,
            created_at: row.try_get("created_at")?,
            expires_at: row.try_get("expires_at")?,
            revoked_at: row.try_get("revoked_at")?,
            last_used_at: row.try_get("last_used_at")?,
        })
    }
}
