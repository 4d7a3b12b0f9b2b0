//! Publish admission
//!
//! Decides, per connection attempt reported by the media server, whether a
//! presented stream key may start a broadcast. The check and the resulting
//! broadcast insert happen in one transaction holding a row lock on the key,
//! so two publishers racing on the same key are serialized and the loser sees
//! the winner's live broadcast.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::{
    metrics,
    models::{Broadcast, BroadcastId, StreamKey, StreamKeyId, StreamKeyStatus},
    repository::{BroadcastRepository, StreamKeyRepository},
    Error, Result,
};

const PUBLISH_ACTION: &str = "publish";

/// Authentication request as sent by the media server's HTTP auth hook.
///
/// Missing fields deserialize as empty strings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AdmissionRequest {
    pub user: String,
    pub password: String,
    pub ip: String,
    pub action: String,
    pub path: String,
    pub protocol: String,
    pub id: String,
    pub query: String,
}

impl AdmissionRequest {
    #[must_use]
    pub fn is_publish(&self) -> bool {
        self.action == PUBLISH_ACTION
    }

    /// Path without its leading slash
    #[must_use]
    pub fn broadcast_path(&self) -> &str {
        self.path.strip_prefix('/').unwrap_or(&self.path)
    }

    /// The presented secret: the explicit password if set, otherwise the path.
    #[must_use]
    pub fn credential(&self) -> Option<&str> {
        if !self.password.is_empty() {
            return Some(&self.password);
        }
        let path = self.broadcast_path();
        (!path.is_empty()).then_some(path)
    }

    /// Both the explicit credential and the path carry a value and disagree
    fn has_conflicting_credentials(&self) -> bool {
        let path = self.broadcast_path();
        !self.password.is_empty() && !path.is_empty() && self.password != path
    }
}

/// Why a decision came out the way it did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdmissionReason {
    /// A new live broadcast was started
    Ok,
    /// Reads and other non-publish actions are not gated
    NonMutatingAction,
    MissingCredential,
    UnknownCredential,
    Revoked,
    Expired,
    /// The key already has a live broadcast
    AlreadyInUse,
}

impl AdmissionReason {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::NonMutatingAction => "non_mutating_action",
            Self::MissingCredential => "missing_credential",
            Self::UnknownCredential => "unknown_credential",
            Self::Revoked => "revoked",
            Self::Expired => "expired",
            Self::AlreadyInUse => "already_in_use",
        }
    }
}

impl std::fmt::Display for AdmissionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdmissionDecision {
    pub admitted: bool,
    pub reason: AdmissionReason,
    pub stream_key_id: Option<StreamKeyId>,
    pub broadcast_id: Option<BroadcastId>,
}

impl AdmissionDecision {
    #[must_use]
    pub const fn allow(reason: AdmissionReason) -> Self {
        Self {
            admitted: true,
            reason,
            stream_key_id: None,
            broadcast_id: None,
        }
    }

    #[must_use]
    pub const fn reject(reason: AdmissionReason) -> Self {
        Self {
            admitted: false,
            reason,
            stream_key_id: None,
            broadcast_id: None,
        }
    }

    #[must_use]
    pub const fn started(stream_key_id: StreamKeyId, broadcast_id: BroadcastId) -> Self {
        Self {
            admitted: true,
            reason: AdmissionReason::Ok,
            stream_key_id: Some(stream_key_id),
            broadcast_id: Some(broadcast_id),
        }
    }

    #[must_use]
    fn for_key(mut self, stream_key_id: StreamKeyId) -> Self {
        self.stream_key_id = Some(stream_key_id);
        self
    }
}

/// Verdict on a locked key before looking at its broadcasts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyCheck {
    Usable,
    Reject(AdmissionReason),
    /// Active but past expiry: persist `Expired`, then reject
    ExpireNow,
}

fn check_key(key: &StreamKey, now: DateTime<Utc>) -> KeyCheck {
    if key.is_valid_at(now) {
        return KeyCheck::Usable;
    }
    match key.status {
        StreamKeyStatus::Revoked => KeyCheck::Reject(AdmissionReason::Revoked),
        StreamKeyStatus::Expired => KeyCheck::Reject(AdmissionReason::Expired),
        // Active but no longer valid means past expiry
        StreamKeyStatus::Active => KeyCheck::ExpireNow,
    }
}

/// Publish admission service
#[derive(Clone)]
pub struct AdmissionService {
    stream_keys: StreamKeyRepository,
    broadcasts: BroadcastRepository,
    timeout: Duration,
}

impl std::fmt::Debug for AdmissionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdmissionService")
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl AdmissionService {
    #[must_use]
    pub const fn new(
        stream_keys: StreamKeyRepository,
        broadcasts: BroadcastRepository,
        timeout: Duration,
    ) -> Self {
        Self {
            stream_keys,
            broadcasts,
            timeout,
        }
    }

    /// Decide whether a connection attempt may proceed.
    ///
    /// Rejections are `Ok` with `admitted == false`; `Err` means the store
    /// failed or the deadline passed and nothing was written.
    pub async fn authenticate(&self, request: &AdmissionRequest) -> Result<AdmissionDecision> {
        let started = Instant::now();
        let result = self.decide(request).await;

        let outcome = match &result {
            Ok(decision) if decision.admitted => "admitted",
            Ok(_) => "rejected",
            Err(_) => "error",
        };
        metrics::admission::ADMISSION_DURATION
            .with_label_values(&[outcome])
            .observe(started.elapsed().as_secs_f64());

        match &result {
            Ok(decision) => {
                metrics::admission::ADMISSION_DECISIONS
                    .with_label_values(&[outcome, decision.reason.as_str()])
                    .inc();
                if decision.admitted {
                    debug!(
                        action = %request.action,
                        path = %request.path,
                        protocol = %request.protocol,
                        reason = %decision.reason,
                        "Connection admitted"
                    );
                } else {
                    info!(
                        action = %request.action,
                        path = %request.path,
                        ip = %request.ip,
                        reason = %decision.reason,
                        "Connection rejected"
                    );
                }
            }
            Err(e) => {
                metrics::admission::ADMISSION_DECISIONS
                    .with_label_values(&[outcome, "error"])
                    .inc();
                error!(
                    action = %request.action,
                    path = %request.path,
                    ip = %request.ip,
                    connection_id = %request.id,
                    error = %e,
                    "Admission check failed"
                );
            }
        }

        result
    }

    async fn decide(&self, request: &AdmissionRequest) -> Result<AdmissionDecision> {
        if !request.is_publish() {
            return Ok(AdmissionDecision::allow(AdmissionReason::NonMutatingAction));
        }

        let Some(credential) = request.credential() else {
            return Ok(AdmissionDecision::reject(AdmissionReason::MissingCredential));
        };

        if request.has_conflicting_credentials() {
            warn!(
                path = %request.path,
                ip = %request.ip,
                "Publish request carries both a password and a different path; using the password"
            );
        }

        tokio::time::timeout(
            self.timeout,
            self.admit_publish(credential, request.broadcast_path()),
        )
        .await
        .map_err(|_| {
            Error::Timeout(format!(
                "admission did not complete within {}ms",
                self.timeout.as_millis()
            ))
        })?
    }

    /// The locked check-then-act sequence. Dropping the transaction without
    /// committing rolls it back, which is what every early return relies on.
    async fn admit_publish(&self, credential: &str, path: &str) -> Result<AdmissionDecision> {
        let now = Utc::now();
        let mut tx = self.stream_keys.pool().begin().await?;

        let Some(key) = self
            .stream_keys
            .get_by_key_value_for_update(credential, &mut *tx)
            .await?
        else {
            return Ok(AdmissionDecision::reject(AdmissionReason::UnknownCredential));
        };

        match check_key(&key, now) {
            KeyCheck::Usable => {}
            KeyCheck::Reject(reason) => {
                return Ok(AdmissionDecision::reject(reason).for_key(key.id));
            }
            KeyCheck::ExpireNow => {
                self.stream_keys
                    .mark_expired_with_executor(&key.id, &mut *tx)
                    .await?;
                tx.commit().await?;
                info!(stream_key_id = %key.id, "Stream key expired");
                return Ok(AdmissionDecision::reject(AdmissionReason::Expired).for_key(key.id));
            }
        }

        if self
            .broadcasts
            .get_live_by_stream_key(&key.id, &mut *tx)
            .await?
            .is_some()
        {
            return Ok(AdmissionDecision::reject(AdmissionReason::AlreadyInUse).for_key(key.id));
        }

        let broadcast = Broadcast::start(key.id.clone(), path.to_string(), now);
        let broadcast = match self.broadcasts.create_with_executor(&broadcast, &mut *tx).await {
            Ok(broadcast) => broadcast,
            // Lost a race the lock should have prevented; the index still holds
            Err(Error::AlreadyExists(_)) => {
                return Ok(AdmissionDecision::reject(AdmissionReason::AlreadyInUse).for_key(key.id));
            }
            Err(e) => return Err(e),
        };

        self.stream_keys
            .touch_last_used_with_executor(&key.id, now, &mut *tx)
            .await?;
        tx.commit().await?;

        info!(
            stream_key_id = %key.id,
            broadcast_id = %broadcast.id,
            path = %broadcast.path,
            "Broadcast started"
        );

        Ok(AdmissionDecision::started(key.id, broadcast.id))
    }
}
