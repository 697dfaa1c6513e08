//! Fetch-and-verify step for a single queued request.
//!
//! The executor builds the acceptance predicate from the request's header and
//! commitments and hands it to the network layer, so only the consensus side
//! decides whether a peer response is valid. Sidecars reach the availability
//! store only after they passed that predicate.

use crate::da::{BlobProcessor, BlobRequester, StorageBackend};
use crate::primitives::{BlobSidecar, BlobSidecars};
use crate::queue::BlobFetchRequest;
use anyhow::{bail, Context, Result};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

pub struct BlobFetchExecutor<P, R, S> {
    processor: Arc<P>,
    requester: Arc<R>,
    storage: Arc<S>,
}

impl<P, R, S> Clone for BlobFetchExecutor<P, R, S> {
    fn clone(&self) -> Self {
        Self {
            processor: Arc::clone(&self.processor),
            requester: Arc::clone(&self.requester),
            storage: Arc::clone(&self.storage),
        }
    }
}

impl<P, R, S> BlobFetchExecutor<P, R, S>
where
    P: BlobProcessor,
    R: BlobRequester,
    S: StorageBackend<Store = P::Store>,
{
    pub fn new(processor: Arc<P>, requester: Arc<R>, storage: Arc<S>) -> Self {
        Self {
            processor,
            requester,
            storage,
        }
    }

    pub fn requester(&self) -> &Arc<R> {
        &self.requester
    }

    /// Fetches the blobs for `request` from peers and stores them once verified.
    ///
    /// Returns the number of sidecars stored. Nothing is written when no peer
    /// produced a response that passes verification. The stored batch is the
    /// copy the verifier accepted, and the requester must hand back exactly
    /// that batch.
    pub async fn fetch_and_verify(
        &self,
        cancel: &CancellationToken,
        request: &BlobFetchRequest,
    ) -> Result<usize> {
        let slot = request.slot();
        if cancel.is_cancelled() {
            bail!("blob fetch for slot {slot} cancelled");
        }

        tracing::info!(
            slot,
            expected_blobs = request.commitments.len(),
            "fetching blobs from peers"
        );

        let header = &request.header;
        let commitments = request.commitments.as_slice();
        let processor = &self.processor;
        let accepted: Mutex<Option<BlobSidecars>> = Mutex::new(None);
        let verifier = |sidecars: &[BlobSidecar]| -> Result<()> {
            processor.verify_sidecars(sidecars, header, commitments)?;
            if let Ok(mut batch) = accepted.lock() {
                *batch = Some(sidecars.to_vec());
            }
            Ok(())
        };

        let returned = self
            .requester
            .request_blobs(cancel, slot, &verifier)
            .await
            .with_context(|| format!("failed to request valid blobs for slot {slot}"))?;

        let accepted = accepted.lock().ok().and_then(|mut batch| batch.take());
        let sidecars = match accepted {
            Some(batch) if batch == returned => batch,
            _ => bail!("requester returned unverified blobs for slot {slot}"),
        };

        let count = sidecars.len();
        self.processor
            .process_sidecars(self.storage.availability_store(), sidecars)
            .await
            .with_context(|| format!("failed to process blobs for slot {slot}"))?;

        tracing::info!(slot, count, "fetched and stored verified blobs");
        Ok(count)
    }
}
