//! Reference peer-walking requester: transport abstraction, per-peer attempt
//! metrics, and the aggregate request error.

pub mod metrics;
pub mod requester;

pub use metrics::{PeerAttemptSnapshot, PeerOutcome};
pub use requester::{BlobPeerClient, MultiPeerRequester, PeerId, RequestError};
