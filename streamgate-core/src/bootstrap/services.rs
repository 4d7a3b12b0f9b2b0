//! Service initialization and dependency injection

use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;
use tracing::info;

use crate::{
    media::{MediaControl, MediaMtxClient},
    repository::{BroadcastRepository, BroadcasterRepository, StreamKeyRepository},
    service::{
        AdmissionService, BroadcasterService, LifecycleService, RevocationService, StreamKeyService,
        StreamService,
    },
    Config,
};

/// Container for all initialized services
#[derive(Clone)]
pub struct Services {
    /// Publish admission (media server auth hook)
    pub admission: Arc<AdmissionService>,
    /// Ready / not-ready webhook handling
    pub lifecycle: Arc<LifecycleService>,
    pub revocation: Arc<RevocationService>,
    pub stream_keys: Arc<StreamKeyService>,
    pub broadcasters: Arc<BroadcasterService>,
    pub streams: Arc<StreamService>,
}

/// Wire repositories, the media server client and services together.
///
/// `media` overrides the MediaMTX client built from config.
pub fn init_services(
    pool: PgPool,
    config: &Config,
    media: Option<Arc<dyn MediaControl>>,
) -> Result<Services, anyhow::Error> {
    info!("Initializing services...");

    let stream_key_repo = StreamKeyRepository::new(pool.clone());
    let broadcast_repo = BroadcastRepository::new(pool.clone());
    let broadcaster_repo = BroadcasterRepository::new(pool);

    let media = match media {
        Some(media) => media,
        None => {
            let client = MediaMtxClient::from_config(&config.media_server)?;
            info!(api_url = %config.media_server.api_url, "Media server client initialized");
            Arc::new(client)
        }
    };

    let services = Services {
        admission: Arc::new(AdmissionService::new(
            stream_key_repo.clone(),
            broadcast_repo.clone(),
            Duration::from_millis(config.admission.timeout_ms),
        )),
        lifecycle: Arc::new(LifecycleService::new(
            stream_key_repo.clone(),
            broadcast_repo.clone(),
        )),
        revocation: Arc::new(RevocationService::new(
            stream_key_repo.clone(),
            broadcast_repo.clone(),
            media,
        )),
        stream_keys: Arc::new(StreamKeyService::new(stream_key_repo.clone())),
        broadcasters: Arc::new(BroadcasterService::new(broadcaster_repo, stream_key_repo)),
        streams: Arc::new(StreamService::new(
            broadcast_repo,
            config.media_server.public_url.clone(),
        )),
    };

    info!("Services initialized");
    Ok(services)
}
