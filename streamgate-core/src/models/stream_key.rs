use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::id::{BroadcasterId, StreamKeyId};
use crate::{Error, Result};

/// Stream key status
///
/// Transitions are one-way: a key leaves `Active` exactly once and never returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKeyStatus {
    /// Usable for publishing
    Active,
    /// Invalidated by an administrator
    Revoked,
    /// Past its expiry; discovered lazily at authentication time
    Expired,
}

impl StreamKeyStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Revoked => "revoked",
            Self::Expired => "expired",
        }
    }

    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }

    #[must_use]
    pub const fn can_transition_to(&self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Active, Self::Revoked) | (Self::Active, Self::Expired)
        )
    }
}

impl FromStr for StreamKeyStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "revoked" => Ok(Self::Revoked),
            "expired" => Ok(Self::Expired),
            _ => Err(format!("Unknown stream key status: {s}")),
        }
    }
}

impl std::fmt::Display for StreamKeyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A credential that authorizes a broadcaster to start a stream.
///
/// `key_value` is the secret presented by publishers. It is only ever returned
/// to administrators once, at creation time; listings carry it redacted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamKey {
    pub id: StreamKeyId,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub key_value: String,
    pub broadcaster_id: BroadcasterId,
    pub status: StreamKeyStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub last_used_at: Option<DateTime<Utc>>,
}

impl StreamKey {
    /// Build a fresh active key
    #[must_use]
    pub fn new(
        key_value: String,
        broadcaster_id: BroadcasterId,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id: StreamKeyId::new(),
            key_value,
            broadcaster_id,
            status: StreamKeyStatus::Active,
            created_at: Utc::now(),
            expires_at,
            revoked_at: None,
            last_used_at: None,
        }
    }

    /// True once `expires_at` has been reached, regardless of stored status
    #[must_use]
    pub fn is_past_expiry(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| exp <= now)
    }

    /// Check if the key is currently valid for use
    #[must_use]
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.status.is_active() && !self.is_past_expiry(now)
    }

    /// Validate a status change against the one-way state machine
    pub fn ensure_transition(&self, next: StreamKeyStatus) -> Result<()> {
        if self.status.can_transition_to(next) {
            Ok(())
        } else {
            Err(Error::InvalidTransition {
                from: self.status,
                to: next,
            })
        }
    }

    /// Copy of this key with the secret stripped
    #[must_use]
    pub fn redacted(mut self) -> Self {
        self.key_value.clear();
        self
    }
}

/// Request to issue a new stream key
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateStreamKeyRequest {
    pub broadcaster_id: BroadcasterId,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn key(status: StreamKeyStatus, expires_at: Option<DateTime<Utc>>) -> StreamKey {
        let mut key = StreamKey::new(
            "sk_test".to_string(),
            BroadcasterId::from_string("broadcaster1".to_string()),
            expires_at,
        );
        key.status = status;
        key
    }

    #[test]
    fn test_status_transitions_are_one_way() {
        use StreamKeyStatus::{Active, Expired, Revoked};

        assert!(Active.can_transition_to(Revoked));
        assert!(Active.can_transition_to(Expired));

        for from in [Revoked, Expired] {
            for to in [Active, Revoked, Expired] {
                assert!(!from.can_transition_to(to), "{from} -> {to} must be rejected");
            }
        }
        assert!(!Active.can_transition_to(Active));
    }

    #[test]
    fn test_ensure_transition_reports_both_states() {
        let revoked = key(StreamKeyStatus::Revoked, None);
        match revoked.ensure_transition(StreamKeyStatus::Revoked) {
            Err(Error::InvalidTransition { from, to }) => {
                assert_eq!(from, StreamKeyStatus::Revoked);
                assert_eq!(to, StreamKeyStatus::Revoked);
            }
            other => panic!("expected InvalidTransition, got {other:?}"),
        }
    }

    #[test]
    fn test_validity_honours_expiry() {
        let now = Utc::now();
        assert!(key(StreamKeyStatus::Active, None).is_valid_at(now));
        assert!(key(StreamKeyStatus::Active, Some(now + Duration::hours(1))).is_valid_at(now));
        assert!(!key(StreamKeyStatus::Active, Some(now - Duration::hours(1))).is_valid_at(now));
        assert!(!key(StreamKeyStatus::Revoked, None).is_valid_at(now));
    }

    #[test]
    fn test_redacted_key_omits_secret() {
        let json = serde_json::to_value(key(StreamKeyStatus::Active, None).redacted()).unwrap();
        assert!(json.get("key_value").is_none());
        assert_eq!(json["status"], "active");
    }

    #[test]
    fn test_status_round_trips_through_str() {
        for status in [
            StreamKeyStatus::Active,
            StreamKeyStatus::Revoked,
            StreamKeyStatus::Expired,
        ] {
            assert_eq!(status.as_str().parse::<StreamKeyStatus>(), Ok(status));
        }
        assert!("paused".parse::<StreamKeyStatus>().is_err());
    }
}
