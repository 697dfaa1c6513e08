pub mod da;
pub mod network;
pub mod primitives;
pub mod processor;
pub mod queue;
pub mod runtime;

pub use da::{BlobProcessor, BlobRequester, ChainSpec, DaWindow, SidecarVerifier, StorageBackend};
pub use network::{BlobPeerClient, MultiPeerRequester, PeerAttemptSnapshot, PeerId, RequestError};
pub use primitives::{
    BeaconBlock, BeaconBlockHeader, BlobSidecar, BlobSidecars, KzgCommitment, KzgProof, Root, Slot,
};
pub use processor::executor::BlobFetchExecutor;
pub use processor::fetcher::BlobFetcher;
pub use queue::{BlobFetchRequest, BlobQueue, EvictionReason, QueueEntry, QueueError};
pub use runtime::config::{BlobFetcherConfig, BlobFetcherConfigBuilder, BlobFetcherConfigParams};
pub use runtime::runner::Runner;
pub use runtime::telemetry::{init_tracing, Telemetry, TelemetrySnapshot};
