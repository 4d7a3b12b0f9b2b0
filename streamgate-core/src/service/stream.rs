use crate::{
    media::stream_urls,
    models::{Broadcast, BroadcastId, BroadcastWithUrls},
    repository::BroadcastRepository,
    Error, Result,
};

/// Read-only view of broadcasts with playback URLs
#[derive(Clone)]
pub struct StreamService {
    broadcasts: BroadcastRepository,
    public_url: String,
}

impl std::fmt::Debug for StreamService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamService")
            .field("public_url", &self.public_url)
            .finish()
    }
}

impl StreamService {
    #[must_use]
    pub const fn new(broadcasts: BroadcastRepository, public_url: String) -> Self {
        Self {
            broadcasts,
            public_url,
        }
    }

    fn with_urls(&self, broadcast: Broadcast) -> BroadcastWithUrls {
        let urls = stream_urls(&self.public_url, &broadcast.path);
        BroadcastWithUrls { broadcast, urls }
    }

    /// Live broadcasts, most recent first
    pub async fn list_live(&self) -> Result<Vec<BroadcastWithUrls>> {
        let live = self.broadcasts.list_live().await?;
        Ok(live.into_iter().map(|b| self.with_urls(b)).collect())
    }

    /// One broadcast by ID, live or ended
    pub async fn get(&self, id: &BroadcastId) -> Result<BroadcastWithUrls> {
        self.broadcasts
            .get_by_id(id)
            .await?
            .map(|b| self.with_urls(b))
            .ok_or_else(|| Error::NotFound(format!("Stream {id} not found")))
    }
}
