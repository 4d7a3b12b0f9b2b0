//! Media server control
//!
//! The media server owns the physical connections; this crate only asks it to
//! drop them. [`MediaControl`] is the seam services depend on, with
//! [`MediaMtxClient`] as the production implementation.

pub mod mediamtx;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::StreamUrls;

pub use mediamtx::{ConnectionKind, MediaMtxClient};

#[derive(Debug, Error)]
pub enum MediaControlError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Unexpected status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("No connection listing succeeded: {0}")]
    Unreachable(String),
}

impl From<reqwest::Error> for MediaControlError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Parse(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

impl From<MediaControlError> for crate::Error {
    fn from(err: MediaControlError) -> Self {
        Self::MediaControl(err.to_string())
    }
}

/// Disconnect control over the media server
#[async_trait]
pub trait MediaControl: Send + Sync {
    /// Disconnect every session publishing or reading on `path`.
    ///
    /// Returns the number of connections kicked. Zero is a valid outcome when
    /// nothing was connected.
    async fn kick_path(&self, path: &str) -> Result<usize, MediaControlError>;
}

/// Playback URLs for a path under the media server's public address
#[must_use]
pub fn stream_urls(public_url: &str, path: &str) -> StreamUrls {
    let base = public_url.trim_end_matches('/');
    StreamUrls {
        hls: format!("{base}/{path}/index.m3u8"),
        webrtc: format!("{base}/{path}/whep"),
    }
}
