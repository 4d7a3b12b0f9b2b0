//! Test fixtures and fakes for streamgate-core tests

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, PgPool};
use tokio::sync::Mutex;

use crate::{
    media::{MediaControl, MediaControlError},
    models::{Broadcaster, BroadcasterId, StreamKey},
    repository::{BroadcastRepository, BroadcasterRepository, StreamKeyRepository},
    service::{generate_key_value, AdmissionService},
};

/// A pool that never connects until used. For paths that must not touch the store.
pub fn lazy_pool() -> PgPool {
    PgPoolOptions::new()
        .acquire_timeout(Duration::from_millis(200))
        .connect_lazy("postgres://streamgate@127.0.0.1:1/streamgate")
        .expect("lazy pool")
}

pub fn admission_service(pool: PgPool) -> AdmissionService {
    AdmissionService::new(
        StreamKeyRepository::new(pool.clone()),
        BroadcastRepository::new(pool),
        Duration::from_secs(5),
    )
}

pub async fn insert_broadcaster(pool: &PgPool) -> Broadcaster {
    BroadcasterRepository::new(pool.clone())
        .create(&Broadcaster::new("Test broadcaster".to_string(), None))
        .await
        .expect("insert broadcaster")
}

pub async fn insert_stream_key(
    pool: &PgPool,
    broadcaster_id: &BroadcasterId,
    expires_at: Option<DateTime<Utc>>,
) -> StreamKey {
    let key = StreamKey::new(generate_key_value(), broadcaster_id.clone(), expires_at);
    StreamKeyRepository::new(pool.clone())
        .create(&key)
        .await
        .expect("insert stream key")
}

/// Records kicked paths and reports one connection per kick
#[derive(Debug, Clone, Default)]
pub struct RecordingMediaControl {
    kicked: Arc<Mutex<Vec<String>>>,
}

impl RecordingMediaControl {
    pub async fn kicked_paths(&self) -> Vec<String> {
        self.kicked.lock().await.clone()
    }
}

#[async_trait]
impl MediaControl for RecordingMediaControl {
    async fn kick_path(&self, path: &str) -> Result<usize, MediaControlError> {
        self.kicked.lock().await.push(path.to_string());
        Ok(1)
    }
}

/// Media server that is never reachable
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingMediaControl;

#[async_trait]
impl MediaControl for FailingMediaControl {
    async fn kick_path(&self, _path: &str) -> Result<usize, MediaControlError> {
        Err(MediaControlError::Unreachable("connection refused".to_string()))
    }
}
