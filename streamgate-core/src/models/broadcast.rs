use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::id::{BroadcastId, StreamKeyId};

/// Broadcast status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BroadcastStatus {
    Live,
    Ended,
}

impl BroadcastStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Ended => "ended",
        }
    }

    #[must_use]
    pub const fn is_live(&self) -> bool {
        matches!(self, Self::Live)
    }
}

impl FromStr for BroadcastStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "live" => Ok(Self::Live),
            "ended" => Ok(Self::Ended),
            _ => Err(format!("Unknown broadcast status: {s}")),
        }
    }
}

impl std::fmt::Display for BroadcastStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where the media server says a watchable stream is coming from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    pub source_type: Option<String>,
    pub source_id: Option<String>,
}

impl SourceDescriptor {
    /// Build from raw webhook fields, treating empty strings as absent
    #[must_use]
    pub fn from_raw(source_type: &str, source_id: &str) -> Self {
        let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_string());
        Self {
            source_type: non_empty(source_type),
            source_id: non_empty(source_id),
        }
    }
}

/// One lifetime of a publishing session tied to a stream key
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Broadcast {
    pub id: BroadcastId,
    pub stream_key_id: StreamKeyId,
    pub path: String,
    pub status: BroadcastStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub source_type: Option<String>,
    pub source_id: Option<String>,
    pub metadata: serde_json::Value,
}

impl Broadcast {
    /// A new live broadcast starting now
    #[must_use]
    pub fn start(stream_key_id: StreamKeyId, path: String, started_at: DateTime<Utc>) -> Self {
        Self {
            id: BroadcastId::new(),
            stream_key_id,
            path,
            status: BroadcastStatus::Live,
            started_at,
            ended_at: None,
            source_type: None,
            source_id: None,
            metadata: serde_json::json!({}),
        }
    }

    #[must_use]
    pub fn source(&self) -> SourceDescriptor {
        SourceDescriptor {
            source_type: self.source_type.clone(),
            source_id: self.source_id.clone(),
        }
    }
}

/// Playback URLs computed from the media server's public address
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamUrls {
    pub hls: String,
    pub webrtc: String,
}

/// Broadcast with its playback URLs, as returned by the listing endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastWithUrls {
    #[serde(flatten)]
    pub broadcast: Broadcast,
    pub urls: StreamUrls,
}
