pub mod broadcast;
pub mod broadcaster;
pub mod id;
pub mod stream_key;

pub use broadcast::{Broadcast, BroadcastStatus, BroadcastWithUrls, SourceDescriptor, StreamUrls};
pub use broadcaster::{Broadcaster, CreateBroadcasterRequest, UpdateBroadcasterRequest};
pub use id::{generate_id, BroadcastId, BroadcasterId, StreamKeyId};
pub use stream_key::{CreateStreamKeyRequest, StreamKey, StreamKeyStatus};
