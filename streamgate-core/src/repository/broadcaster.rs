use chrono::Utc;
use sqlx::{postgres::PgRow, PgPool, Row};

use crate::{
    models::{Broadcaster, BroadcasterId},
    Result,
};

/// Broadcaster repository for database operations
#[derive(Clone)]
pub struct BroadcasterRepository {
    pool: PgPool,
}

impl BroadcasterRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a new broadcaster
    pub async fn create(&self, broadcaster: &Broadcaster) -> Result<Broadcaster> {
        let row = sqlx::query(
            r"
            INSERT INTO broadcasters (id, display_name, metadata, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, display_name, metadata, created_at, updated_at
            ",
        )
        .bind(broadcaster.id.as_str())
        .bind(&broadcaster.display_name)
        .bind(&broadcaster.metadata)
        .bind(broadcaster.created_at)
        .bind(broadcaster.updated_at)
        .fetch_one(&self.pool)
        .await?;

        Self::row_to_broadcaster(&row)
    }

    /// Get broadcaster by ID
    pub async fn get_by_id(&self, id: &BroadcasterId) -> Result<Option<Broadcaster>> {
        let row = sqlx::query(
            r"
            SELECT id, display_name, metadata, created_at, updated_at
            FROM broadcasters
            WHERE id = $1
            ",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_broadcaster).transpose()
    }

    /// List broadcasters, newest first
    pub async fn list(&self) -> Result<Vec<Broadcaster>> {
        let rows = sqlx::query(
            r"
            SELECT id, display_name, metadata, created_at, updated_at
            FROM broadcasters
            ORDER BY created_at DESC
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_broadcaster).collect()
    }

    /// Update broadcaster
    pub async fn update(&self, broadcaster: &Broadcaster) -> Result<Broadcaster> {
        let row = sqlx::query(
            r"
            UPDATE broadcasters
            SET display_name = $2, metadata = $3, updated_at = $4
            WHERE id = $1
            RETURNING id, display_name, metadata, created_at, updated_at
            ",
        )
        .bind(broadcaster.id.as_str())
        .bind(&broadcaster.display_name)
        .bind(&broadcaster.metadata)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Self::row_to_broadcaster(&row)
    }

    /// Delete broadcaster. Fails with a foreign key violation while keys reference it.
    pub async fn delete(&self, id: &BroadcasterId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM broadcasters WHERE id = $1")
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    fn row_to_broadcaster(row: &PgRow) -> Result<Broadcaster> {
        Ok(Broadcaster {
            id: BroadcasterId::from_string(row.try_get("id")?),
            display_name: row.try_get("display_name")?,
            metadata: row.try_get("metadata")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}
