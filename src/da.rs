//! Capabilities the blob fetcher consumes from the rest of the node.
//!
//! Verification, storage, peer networking and the availability window all
//! live elsewhere; the fetcher only depends on these traits so it can be
//! driven by fakes in tests.

mod window;

pub use window::DaWindow;

use crate::primitives::{BeaconBlockHeader, BlobSidecar, BlobSidecars, KzgCommitment, Slot};
use anyhow::Result;
use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

/// Acceptance predicate handed to the network layer. Returns `Ok(())` only
/// for sidecars that match the block being fetched.
pub type SidecarVerifier<'a> = &'a (dyn Fn(&[BlobSidecar]) -> Result<()> + Send + Sync);

/// Cryptographic verification and persistence of blob sidecars.
pub trait BlobProcessor: Send + Sync + 'static {
    /// Availability store the sidecars are written into.
    type Store: Send + Sync + 'static;

    /// Checks `sidecars` against the block header and the expected KZG
    /// commitments. Must not have side effects.
    fn verify_sidecars(
        &self,
        sidecars: &[BlobSidecar],
        header: &BeaconBlockHeader,
        commitments: &[KzgCommitment],
    ) -> Result<()>;

    /// Persists sidecars that already passed [`Self::verify_sidecars`].
    fn process_sidecars<'a>(
        &'a self,
        store: &'a Self::Store,
        sidecars: BlobSidecars,
    ) -> BoxFuture<'a, Result<()>>;
}

/// Network layer able to ask peers for the sidecars of a slot.
pub trait BlobRequester: Send + Sync + 'static {
    /// Returns the first peer response accepted by `verifier`, or an
    /// aggregate error once every peer failed.
    fn request_blobs<'a>(
        &'a self,
        cancel: &'a CancellationToken,
        slot: Slot,
        verifier: SidecarVerifier<'a>,
    ) -> BoxFuture<'a, Result<BlobSidecars>>;

    /// Informs the network layer of the node's current head slot.
    fn set_head_slot(&self, slot: Slot);
}

/// Accessor for the node's availability store.
pub trait StorageBackend: Send + Sync + 'static {
    type Store: Send + Sync + 'static;

    fn availability_store(&self) -> &Self::Store;
}

/// Chain parameters the fetcher needs.
pub trait ChainSpec: Send + Sync + 'static {
    /// Whether blobs of `block` are still expected to be served by peers when
    /// the chain head is at `current`.
    fn within_da_period(&self, block: Slot, current: Slot) -> bool;
}
