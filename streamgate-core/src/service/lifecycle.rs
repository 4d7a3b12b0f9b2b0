//! Broadcast lifecycle reconciliation
//!
//! Applies the media server's "ready" and "not ready" notifications to the
//! stored broadcasts. Notifications may arrive late, twice, or for paths this
//! service never admitted; all of those are no-ops rather than errors.

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::{
    metrics,
    models::SourceDescriptor,
    repository::{BroadcastRepository, StreamKeyRepository},
    Result,
};

/// What a notification did to the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Updated,
    Ignored,
}

impl ReconcileOutcome {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Updated => "updated",
            Self::Ignored => "ignored",
        }
    }
}

#[derive(Clone)]
pub struct LifecycleService {
    stream_keys: StreamKeyRepository,
    broadcasts: BroadcastRepository,
}

impl std::fmt::Debug for LifecycleService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleService").finish()
    }
}

impl LifecycleService {
    #[must_use]
    pub const fn new(stream_keys: StreamKeyRepository, broadcasts: BroadcastRepository) -> Self {
        Self {
            stream_keys,
            broadcasts,
        }
    }

    /// The stream on `path` became watchable; record where it comes from.
    ///
    /// `path` is matched against key secrets, so only paths published under
    /// their own key are tracked.
    pub async fn on_became_watchable(
        &self,
        path: &str,
        source: &SourceDescriptor,
    ) -> Result<ReconcileOutcome> {
        let result = self.attach_source(path, source).await;
        record("ready", &result);
        result
    }

    async fn attach_source(&self, path: &str, source: &SourceDescriptor) -> Result<ReconcileOutcome> {
        let Some(key) = self.stream_keys.get_by_key_value(path).await? else {
            debug!(path, "Ready notification for unknown path");
            return Ok(ReconcileOutcome::Ignored);
        };

        match self.broadcasts.attach_source_to_live(&key.id, source).await? {
            Some(broadcast) => {
                info!(
                    broadcast_id = %broadcast.id,
                    stream_key_id = %key.id,
                    source_type = ?source.source_type,
                    "Broadcast is watchable"
                );
                Ok(ReconcileOutcome::Updated)
            }
            None => {
                debug!(stream_key_id = %key.id, "Ready notification without a live broadcast");
                Ok(ReconcileOutcome::Ignored)
            }
        }
    }

    /// The stream on `path` stopped; end its live broadcast if there is one.
    pub async fn on_stopped(&self, path: &str) -> Result<ReconcileOutcome> {
        let result = self.end_broadcast(path).await;
        record("not_ready", &result);
        result
    }

    async fn end_broadcast(&self, path: &str) -> Result<ReconcileOutcome> {
        match self.broadcasts.end_live_by_path(path, Utc::now()).await? {
            Some(broadcast) => {
                info!(
                    broadcast_id = %broadcast.id,
                    stream_key_id = %broadcast.stream_key_id,
                    path,
                    "Broadcast ended"
                );
                Ok(ReconcileOutcome::Updated)
            }
            None => {
                debug!(path, "Stop notification without a live broadcast");
                Ok(ReconcileOutcome::Ignored)
            }
        }
    }
}

fn record(event: &str, result: &Result<ReconcileOutcome>) {
    let outcome = match result {
        Ok(outcome) => outcome.as_str(),
        Err(e) => {
            warn!(event, error = %e, "Lifecycle notification failed");
            "error"
        }
    };
    metrics::lifecycle::RECONCILE_EVENTS
        .with_label_values(&[event, outcome])
        .inc();
}
