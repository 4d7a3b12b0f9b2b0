pub mod broadcast;
pub mod broadcaster;
pub mod stream_key;

pub use broadcast::BroadcastRepository;
pub use broadcaster::BroadcasterRepository;
pub use stream_key::StreamKeyRepository;
