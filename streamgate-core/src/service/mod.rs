pub mod admission;
pub mod broadcaster;
pub mod lifecycle;
pub mod revocation;
pub mod stream;
pub mod stream_key;

pub use admission::{AdmissionDecision, AdmissionReason, AdmissionRequest, AdmissionService};
pub use broadcaster::BroadcasterService;
pub use lifecycle::{LifecycleService, ReconcileOutcome};
pub use revocation::{DisconnectOutcome, RevocationOutcome, RevocationService};
pub use stream::StreamService;
pub use stream_key::{generate_key_value, StreamKeyService};
