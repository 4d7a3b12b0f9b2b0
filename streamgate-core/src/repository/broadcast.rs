use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, PgPool, Row};

use crate::{
    models::{Broadcast, BroadcastId, BroadcastStatus, SourceDescriptor, StreamKeyId},
    Error, Result,
};

/// Broadcast repository for database operations
///
/// The `broadcasts_one_live_per_key` partial unique index backs every write
/// here: a second live row for the same key fails with a unique violation.
#[derive(Clone)]
pub struct BroadcastRepository {
    pool: PgPool,
}

impl BroadcastRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Insert a broadcast using a provided executor (pool or transaction)
    pub async fn create_with_executor<'e, E>(&self, broadcast: &Broadcast, executor: E) -> Result<Broadcast>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let row = sqlx::query(
            r"
            INSERT INTO broadcasts (id, stream_key_id, path, status, started_at, source_type, source_id, metadata)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, stream_key_id, path, status, started_at, ended_at, source_type, source_id, metadata
            ",
        )
        .bind(broadcast.id.as_str())
        .bind(broadcast.stream_key_id.as_str())
        .bind(&broadcast.path)
        .bind(broadcast.status.as_str())
        .bind(broadcast.started_at)
        .bind(broadcast.source_type.as_ref())
        .bind(broadcast.source_id.as_ref())
        .bind(&broadcast.metadata)
        .fetch_one(executor)
        .await?;

        Self::row_to_broadcast(&row)
    }

    /// Get broadcast by ID
    pub async fn get_by_id(&self, id: &BroadcastId) -> Result<Option<Broadcast>> {
        let row = sqlx::query(
            r"
            SELECT id, stream_key_id, path, status, started_at, ended_at, source_type, source_id, metadata
            FROM broadcasts
            WHERE id = $1
            ",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_broadcast).transpose()
    }

    /// Get the live broadcast for a stream key, if any
    pub async fn get_live_by_stream_key<'e, E>(
        &self,
        stream_key_id: &StreamKeyId,
        executor: E,
    ) -> Result<Option<Broadcast>>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let row = sqlx::query(
            r"
            SELECT id, stream_key_id, path, status, started_at, ended_at, source_type, source_id, metadata
            FROM broadcasts
            WHERE stream_key_id = $1 AND status = 'live'
            ",
        )
        .bind(stream_key_id.as_str())
        .fetch_optional(executor)
        .await?;

        row.as_ref().map(Self::row_to_broadcast).transpose()
    }

    /// List live broadcasts, most recent first
    pub async fn list_live(&self) -> Result<Vec<Broadcast>> {
        let rows = sqlx::query(
            r"
            SELECT id, stream_key_id, path, status, started_at, ended_at, source_type, source_id, metadata
            FROM broadcasts
            WHERE status = 'live'
            ORDER BY started_at DESC
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_broadcast).collect()
    }

    /// Broadcast history for a stream key, most recent first
    pub async fn list_by_stream_key(&self, stream_key_id: &StreamKeyId) -> Result<Vec<Broadcast>> {
        let rows = sqlx::query(
            r"
            SELECT id, stream_key_id, path, status, started_at, ended_at, source_type, source_id, metadata
            FROM broadcasts
            WHERE stream_key_id = $1
            ORDER BY started_at DESC
            ",
        )
        .bind(stream_key_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_broadcast).collect()
    }

    /// Attach source descriptors to the live broadcast of a stream key.
    ///
    /// Returns `None` when the key has no live broadcast.
    pub async fn attach_source_to_live(
        &self,
        stream_key_id: &StreamKeyId,
        source: &SourceDescriptor,
    ) -> Result<Option<Broadcast>> {
        let row = sqlx::query(
            r"
            UPDATE broadcasts
            SET source_type = $2, source_id = $3
            WHERE stream_key_id = $1 AND status = 'live'
            RETURNING id, stream_key_id, path, status, started_at, ended_at, source_type, source_id, metadata
            ",
        )
        .bind(stream_key_id.as_str())
        .bind(source.source_type.as_ref())
        .bind(source.source_id.as_ref())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_broadcast).transpose()
    }

    /// End whichever broadcast is live on `path`.
    ///
    /// Returns `None` when nothing was live there, which is the normal outcome
    /// for duplicate or late stop notifications.
    pub async fn end_live_by_path(&self, path: &str, ended_at: DateTime<Utc>) -> Result<Option<Broadcast>> {
        let row = sqlx::query(
            r"
            UPDATE broadcasts
            SET status = 'ended', ended_at = $2
            WHERE path = $1 AND status = 'live'
            RETURNING id, stream_key_id, path, status, started_at, ended_at, source_type, source_id, metadata
            ",
        )
        .bind(path)
        .bind(ended_at)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_broadcast).transpose()
    }

    /// End a live broadcast by ID using a provided executor
    pub async fn end_with_executor<'e, E>(
        &self,
        id: &BroadcastId,
        ended_at: DateTime<Utc>,
        executor: E,
    ) -> Result<Option<Broadcast>>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let row = sqlx::query(
            r"
            UPDATE broadcasts
            SET status = 'ended', ended_at = $2
            WHERE id = $1 AND status = 'live'
            RETURNING id, stream_key_id, path, status, started_at, ended_at, source_type, source_id, metadata
            ",
        )
        .bind(id.as_str())
        .bind(ended_at)
        .fetch_optional(executor)
        .await?;

        row.as_ref().map(Self::row_to_broadcast).transpose()
    }

    /// Count live broadcasts for a stream key
    pub async fn count_live_by_stream_key(&self, stream_key_id: &StreamKeyId) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            r"
            SELECT COUNT(*) FROM broadcasts
            WHERE stream_key_id = $1 AND status = 'live'
            ",
        )
        .bind(stream_key_id.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    fn row_to_broadcast(row: &PgRow) -> Result<Broadcast> {
        let status: String = row.try_get("status")?;
        let status = status.parse::<BroadcastStatus>().map_err(Error::Internal)?;

        Ok(Broadcast {
            id: BroadcastId::from_string(row.try_get("id")?),
            stream_key_id: StreamKeyId::from_string(row.try_get("stream_key_id")?),
            path: row.try_get("path")?,
            status,
            started_at: row.try_get("started_at")?,
            ended_at: row.try_get("ended_at")?,
            source_type: row.try_get("source_type")?,
            source_id: row.try_get("source_id")?,
            metadata: row.try_get("metadata")?,
        })
    }
}
