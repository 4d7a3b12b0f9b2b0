//! Stream key revocation
//!
//! The durable part (key revoked, live broadcast ended) commits first. The
//! media server is told to drop the connection afterwards, outside the lock,
//! and its failure is reported but never undoes the revocation.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use crate::{
    media::MediaControl,
    metrics,
    models::{Broadcast, StreamKey, StreamKeyId, StreamKeyStatus},
    repository::{BroadcastRepository, StreamKeyRepository},
    Error, Result,
};

/// Result of asking the media server to drop a revoked key's connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DisconnectOutcome {
    /// No broadcast was live
    NotNeeded,
    Kicked { connections: usize },
    Failed { error: String },
}

impl DisconnectOutcome {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NotNeeded => "not_needed",
            Self::Kicked { .. } => "kicked",
            Self::Failed { .. } => "failed",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RevocationOutcome {
    pub stream_key: StreamKey,
    pub ended_broadcast: Option<Broadcast>,
    pub disconnect: DisconnectOutcome,
}

#[derive(Clone)]
pub struct RevocationService {
    stream_keys: StreamKeyRepository,
    broadcasts: BroadcastRepository,
    media: Arc<dyn MediaControl>,
}

impl std::fmt::Debug for RevocationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RevocationService").finish()
    }
}

impl RevocationService {
    pub fn new(
        stream_keys: StreamKeyRepository,
        broadcasts: BroadcastRepository,
        media: Arc<dyn MediaControl>,
    ) -> Self {
        Self {
            stream_keys,
            broadcasts,
            media,
        }
    }

    /// Revoke a key and terminate its live broadcast, if any.
    ///
    /// Fails with `NotFound` for an unknown key and `InvalidTransition` for a
    /// key that is no longer active. Store failures leave nothing changed.
    pub async fn revoke(&self, id: &StreamKeyId) -> Result<RevocationOutcome> {
        let (stream_key, ended_broadcast) = self.revoke_in_store(id).await?;

        let disconnect = match &ended_broadcast {
            None => DisconnectOutcome::NotNeeded,
            Some(broadcast) => match self.media.kick_path(&broadcast.path).await {
                Ok(connections) => DisconnectOutcome::Kicked { connections },
                Err(e) => {
                    warn!(
                        stream_key_id = %id,
                        path = %broadcast.path,
                        error = %e,
                        "Key revoked but media server disconnect failed"
                    );
                    DisconnectOutcome::Failed {
                        error: e.to_string(),
                    }
                }
            },
        };

        metrics::lifecycle::REVOCATIONS
            .with_label_values(&[disconnect.as_str()])
            .inc();
        info!(
            stream_key_id = %id,
            ended_broadcast = ?ended_broadcast.as_ref().map(|b| b.id.as_str()),
            disconnect = disconnect.as_str(),
            "Stream key revoked"
        );

        Ok(RevocationOutcome {
            stream_key: stream_key.redacted(),
            ended_broadcast,
            disconnect,
        })
    }

    async fn revoke_in_store(&self, id: &StreamKeyId) -> Result<(StreamKey, Option<Broadcast>)> {
        let now = Utc::now();
        let mut tx = self.stream_keys.pool().begin().await?;

        let key = self
            .stream_keys
            .get_by_id_for_update(id, &mut *tx)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Stream key {id} not found")))?;
        key.ensure_transition(StreamKeyStatus::Revoked)?;

        let ended = match self.broadcasts.get_live_by_stream_key(&key.id, &mut *tx).await? {
            Some(live) => {
                self.broadcasts
                    .end_with_executor(&live.id, now, &mut *tx)
                    .await?
            }
            None => None,
        };

        let revoked = self
            .stream_keys
            .mark_revoked_with_executor(&key.id, now, &mut *tx)
            .await?;
        tx.commit().await?;

        Ok((revoked, ended))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BroadcastStatus;
    use crate::service::{AdmissionReason, AdmissionRequest};
    use crate::test_helpers::{
        admission_service, insert_broadcaster, insert_stream_key, FailingMediaControl,
        RecordingMediaControl,
    };
    use sqlx::PgPool;

    fn service(pool: &PgPool, media: Arc<dyn MediaControl>) -> RevocationService {
        RevocationService::new(
            StreamKeyRepository::new(pool.clone()),
            BroadcastRepository::new(pool.clone()),
            media,
        )
    }

    #[test]
    fn test_disconnect_outcome_serializes_tagged() {
        let value = serde_json::to_value(DisconnectOutcome::Kicked { connections: 2 }).unwrap();
        assert_eq!(value["status"], "kicked");
        assert_eq!(value["connections"], 2);
    }

    #[sqlx::test(migrations = "../migrations")]
    #[ignore = "Requires database"]
    async fn test_revoke_ends_live_broadcast_and_kicks(pool: PgPool) {
        let broadcaster = insert_broadcaster(&pool).await;
        let key = insert_stream_key(&pool, &broadcaster.id, None).await;
        let broadcasts = BroadcastRepository::new(pool.clone());
        let live = Broadcast::start(key.id.clone(), "p".to_string(), Utc::now());
        broadcasts.create_with_executor(&live, &pool).await.unwrap();

        let media = Arc::new(RecordingMediaControl::default());
        let outcome = service(&pool, media.clone()).revoke(&key.id).await.unwrap();

        assert_eq!(outcome.stream_key.status, StreamKeyStatus::Revoked);
        assert!(outcome.stream_key.revoked_at.is_some());
        assert!(outcome.stream_key.key_value.is_empty());
        let ended = outcome.ended_broadcast.unwrap();
        assert_eq!(ended.id, live.id);
        assert_eq!(ended.status, BroadcastStatus::Ended);
        assert_eq!(outcome.disconnect, DisconnectOutcome::Kicked { connections: 1 });
        assert_eq!(media.kicked_paths().await, vec!["p".to_string()]);
    }

    #[sqlx::test(migrations = "../migrations")]
    #[ignore = "Requires database"]
    async fn test_revoke_survives_kick_failure(pool: PgPool) {
        let broadcaster = insert_broadcaster(&pool).await;
        let key = insert_stream_key(&pool, &broadcaster.id, None).await;
        let broadcasts = BroadcastRepository::new(pool.clone());
        let live = Broadcast::start(key.id.clone(), "p".to_string(), Utc::now());
        broadcasts.create_with_executor(&live, &pool).await.unwrap();

        let outcome = service(&pool, Arc::new(FailingMediaControl))
            .revoke(&key.id)
            .await
            .unwrap();
        assert!(matches!(outcome.disconnect, DisconnectOutcome::Failed { .. }));

        let stored = StreamKeyRepository::new(pool.clone()).get_by_id(&key.id).await.unwrap().unwrap();
        assert_eq!(stored.status, StreamKeyStatus::Revoked);
        assert_eq!(broadcasts.count_live_by_stream_key(&key.id).await.unwrap(), 0);
    }

    #[sqlx::test(migrations = "../migrations")]
    #[ignore = "Requires database"]
    async fn test_revoke_racing_publish_leaves_nothing_live(pool: PgPool) {
        let broadcaster = insert_broadcaster(&pool).await;
        let key = insert_stream_key(&pool, &broadcaster.id, None).await;
        let admission = admission_service(pool.clone());
        let revocation = service(&pool, Arc::new(RecordingMediaControl::default()));
        let request = AdmissionRequest {
            action: "publish".to_string(),
            path: format!("/{}", key.key_value),
            ..AdmissionRequest::default()
        };

        let (decision, outcome) =
            tokio::join!(admission.authenticate(&request), revocation.revoke(&key.id));
        let decision = decision.unwrap();
        let outcome = outcome.unwrap();

        // Whichever side locked first, the key ends revoked with nothing live
        if decision.admitted {
            assert!(outcome.ended_broadcast.is_some());
        } else {
            assert_eq!(decision.reason, AdmissionReason::Revoked);
            assert!(outcome.ended_broadcast.is_none());
        }

        let stored = StreamKeyRepository::new(pool.clone()).get_by_id(&key.id).await.unwrap().unwrap();
        assert_eq!(stored.status, StreamKeyStatus::Revoked);
        assert_eq!(
            BroadcastRepository::new(pool).count_live_by_stream_key(&key.id).await.unwrap(),
            0
        );
    }

    #[sqlx::test(migrations = "../migrations")]
    #[ignore = "Requires database"]
    async fn test_revoke_without_live_broadcast_skips_kick(pool: PgPool) {
        let broadcaster = insert_broadcaster(&pool).await;
        let key = insert_stream_key(&pool, &broadcaster.id, None).await;
        let media = Arc::new(RecordingMediaControl::default());

        let outcome = service(&pool, media.clone()).revoke(&key.id).await.unwrap();
        assert_eq!(outcome.disconnect, DisconnectOutcome::NotNeeded);
        assert!(outcome.ended_broadcast.is_none());
        assert!(media.kicked_paths().await.is_empty());
    }

    #[sqlx::test(migrations = "../migrations")]
    #[ignore = "Requires database"]
    async fn test_revoke_twice_is_invalid_transition(pool: PgPool) {
        let broadcaster = insert_broadcaster(&pool).await;
        let key = insert_stream_key(&pool, &broadcaster.id, None).await;
        let revocation = service(&pool, Arc::new(RecordingMediaControl::default()));

        revocation.revoke(&key.id).await.unwrap();
        let err = revocation.revoke(&key.id).await.unwrap_err();
        assert!(
            matches!(
                err,
                Error::InvalidTransition {
                    from: StreamKeyStatus::Revoked,
                    to: StreamKeyStatus::Revoked
                }
            ),
            "got {err:?}"
        );
    }

    #[sqlx::test(migrations = "../migrations")]
    #[ignore = "Requires database"]
    async fn test_revoke_unknown_key_is_not_found(pool: PgPool) {
        let revocation = service(&pool, Arc::new(RecordingMediaControl::default()));
        let err = revocation
            .revoke(&StreamKeyId::from_string("missing00000".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
