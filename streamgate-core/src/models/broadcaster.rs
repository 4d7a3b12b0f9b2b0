use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::BroadcasterId;

/// An entity authorized to own stream keys
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Broadcaster {
    pub id: BroadcasterId,
    pub display_name: String,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Broadcaster {
    #[must_use]
    pub fn new(display_name: String, metadata: Option<serde_json::Value>) -> Self {
        let now = Utc::now();
        Self {
            id: BroadcasterId::new(),
            display_name,
            metadata: metadata.unwrap_or_else(|| serde_json::json!({})),
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBroadcasterRequest {
    pub display_name: String,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateBroadcasterRequest {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}
