//! Consensus types carried through the blob fetch pipeline: block headers,
//! KZG commitments, and the blob sidecars returned by peers.

pub mod header;
mod hex_bytes;
mod hex_quantity;
pub mod sidecar;

pub use header::{BeaconBlock, BeaconBlockHeader, KzgCommitment, Root};
pub use sidecar::{BlobSidecar, BlobSidecars, KzgProof};

/// Discrete unit of block production.
pub type Slot = u64;
