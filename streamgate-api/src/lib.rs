// StreamGate API Library
//
// HTTP surface for the media server hooks and the signed admin API

pub mod http;

// Re-export commonly used types
pub use http::{create_router, AppState};
