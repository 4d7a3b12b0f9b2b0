//! MediaMTX control API client
//!
//! MediaMTX has no "kick by path" endpoint, so a path is cleared by listing the
//! sessions of every transport and kicking the ones bound to it.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};
use url::Url;

use super::{MediaControl, MediaControlError};
use crate::{config::MediaServerConfig, metrics};

const ITEMS_PER_PAGE: u32 = 100;

/// Transports whose sessions can be listed and kicked via `/v3`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionKind {
    RtmpConn,
    RtspSession,
    RtspsSession,
    SrtConn,
    WebRtcSession,
}

impl ConnectionKind {
    pub const ALL: [Self; 5] = [
        Self::RtmpConn,
        Self::RtspSession,
        Self::RtspsSession,
        Self::SrtConn,
        Self::WebRtcSession,
    ];

    /// Resource segment in the control API
    #[must_use]
    pub const fn resource(&self) -> &'static str {
        match self {
            Self::RtmpConn => "rtmpconns",
            Self::RtspSession => "rtspsessions",
            Self::RtspsSession => "rtspssessions",
            Self::SrtConn => "srtconns",
            Self::WebRtcSession => "webrtcsessions",
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse {
    #[serde(default)]
    page_count: u32,
    #[serde(default)]
    items: Vec<SessionItem>,
}

#[derive(Debug, Deserialize)]
struct SessionItem {
    #[serde(default)]
    id: String,
    #[serde(default)]
    path: String,
}

/// MediaMTX HTTP client
#[derive(Clone)]
pub struct MediaMtxClient {
    client: Client,
    api_url: String,
}

impl MediaMtxClient {
    /// Create a client for the control API at `api_url`
    pub fn new(api_url: &str, timeout: Duration) -> Result<Self, MediaControlError> {
        let parsed = Url::parse(api_url)
            .map_err(|e| MediaControlError::InvalidConfig(format!("api_url {api_url:?}: {e}")))?;

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MediaControlError::Network(e.to_string()))?;

        Ok(Self {
            client,
            api_url: parsed.as_str().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &MediaServerConfig) -> Result<Self, MediaControlError> {
        Self::new(
            &config.api_url,
            Duration::from_millis(config.request_timeout_ms),
        )
    }

    /// List every session of one transport, following pagination
    async fn list(&self, kind: ConnectionKind) -> Result<Vec<SessionItem>, MediaControlError> {
        let url = format!("{}/v3/{}/list", self.api_url, kind.resource());
        let mut items = Vec::new();
        let mut page = 0u32;

        loop {
            let resp = self
                .client
                .get(format!("{url}?page={page}&itemsPerPage={ITEMS_PER_PAGE}"))
                .send()
                .await?;

            if !resp.status().is_success() {
                return Err(MediaControlError::Status {
                    status: resp.status().as_u16(),
                    url,
                });
            }

            let body: ListResponse = resp.json().await?;
            items.extend(body.items);

            page += 1;
            if page >= body.page_count {
                break;
            }
        }

        Ok(items)
    }

    async fn kick(&self, kind: ConnectionKind, id: &str) -> Result<(), MediaControlError> {
        let url = format!("{}/v3/{}/kick/{id}", self.api_url, kind.resource());
        let resp = self.client.post(&url).send().await?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(MediaControlError::Status {
                status: resp.status().as_u16(),
                url,
            })
        }
    }
}

#[async_trait]
impl MediaControl for MediaMtxClient {
    async fn kick_path(&self, path: &str) -> Result<usize, MediaControlError> {
        let mut kicked = 0usize;
        let mut listed_any = false;
        let mut last_error = None;

        for kind in ConnectionKind::ALL {
            let sessions = match self.list(kind).await {
                Ok(sessions) => {
                    listed_any = true;
                    sessions
                }
                Err(e) => {
                    warn!(kind = kind.resource(), error = %e, "Failed to list media server sessions");
                    metrics::media::KICK_FAILURES
                        .with_label_values(&[kind.resource(), "list"])
                        .inc();
                    last_error = Some(e);
                    continue;
                }
            };

            for session in sessions.iter().filter(|s| s.path == path && !s.id.is_empty()) {
                match self.kick(kind, &session.id).await {
                    Ok(()) => {
                        kicked += 1;
                        info!(kind = kind.resource(), session_id = %session.id, path, "Kicked media server session");
                    }
                    Err(e) => {
                        warn!(
                            kind = kind.resource(),
                            session_id = %session.id,
                            path,
                            error = %e,
                            "Failed to kick media server session"
                        );
                        metrics::media::KICK_FAILURES
                            .with_label_values(&[kind.resource(), "kick"])
                            .inc();
                    }
                }
            }
        }

        if !listed_any {
            let reason = last_error.map_or_else(|| "no transports".to_string(), |e| e.to_string());
            return Err(MediaControlError::Unreachable(reason));
        }

        debug!(path, kicked, "Kick by path finished");
        Ok(kicked)
    }
}
