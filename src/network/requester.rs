//! `BlobRequester` that asks peers one at a time until a response verifies.
//!
//! The transport only moves bytes: acceptance is decided by the verifier the
//! caller passes in, so a peer serving bad sidecars costs one attempt and
//! nothing else.

use super::metrics::{PeerAttemptMetrics, PeerAttemptSnapshot, PeerOutcome};
use crate::da::{BlobRequester, SidecarVerifier};
use crate::primitives::{BlobSidecars, Slot};
use crate::runtime::config::BlobFetcherConfig;
use anyhow::Result;
use futures::future::BoxFuture;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout, Instant};
use tokio_util::sync::CancellationToken;

/// Opaque identifier of a connected peer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PeerId(pub String);

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// Point-to-point blob transport.
pub trait BlobPeerClient: Send + Sync + 'static {
    /// Peers currently connected, in the order they should be tried.
    fn peers(&self) -> Vec<PeerId>;

    /// Asks `peer` for every sidecar it holds for `slot`.
    fn request_from_peer<'a>(
        &'a self,
        peer: &'a PeerId,
        slot: Slot,
    ) -> BoxFuture<'a, Result<BlobSidecars>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    NoPeersAvailable,
    AllPeersFailed { tried: usize },
    Cancelled,
}

impl std::fmt::Display for RequestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestError::NoPeersAvailable => write!(f, "no peers available for blob request"),
            RequestError::AllPeersFailed { tried } => {
                write!(f, "failed to retrieve valid blobs from all {tried} peers")
            }
            RequestError::Cancelled => write!(f, "blob request cancelled"),
        }
    }
}

impl std::error::Error for RequestError {}

pub struct MultiPeerRequester<C> {
    client: Arc<C>,
    request_timeout: Duration,
    head_slot: AtomicU64,
    metrics: PeerAttemptMetrics,
}

impl<C: BlobPeerClient> MultiPeerRequester<C> {
    pub fn new(client: Arc<C>, request_timeout: Duration) -> Self {
        Self {
            client,
            request_timeout,
            head_slot: AtomicU64::new(0),
            metrics: PeerAttemptMetrics::default(),
        }
    }

    /// Builds a requester using `peer_request_timeout` from `config`.
    pub fn from_config(client: Arc<C>, config: &BlobFetcherConfig) -> Self {
        Self::new(client, config.peer_request_timeout())
    }

    /// Last head slot pushed by the fetcher, zero if none yet.
    pub fn head_slot(&self) -> Slot {
        self.head_slot.load(Ordering::SeqCst)
    }

    pub fn metrics(&self) -> PeerAttemptSnapshot {
        self.metrics.snapshot()
    }

    async fn request_verified(
        &self,
        cancel: &CancellationToken,
        slot: Slot,
        verifier: SidecarVerifier<'_>,
    ) -> Result<BlobSidecars, RequestError> {
        let peers = self.client.peers();
        if peers.is_empty() {
            tracing::error!(slot, "no peers available for blob request");
            return Err(RequestError::NoPeersAvailable);
        }

        let mut tried = 0usize;
        for peer in &peers {
            if cancel.is_cancelled() {
                tracing::warn!(slot, peers_tried = tried, "blob request cancelled before all peers tried");
                return Err(RequestError::Cancelled);
            }
            tried += 1;

            let started = Instant::now();
            let response = tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::warn!(slot, %peer, "blob request cancelled while waiting on peer");
                    return Err(RequestError::Cancelled);
                }
                response = timeout(self.request_timeout, self.client.request_from_peer(peer, slot)) => response,
            };

            let mut sidecars = match response {
                Ok(Ok(sidecars)) => sidecars,
                Ok(Err(err)) => {
                    self.metrics.record(PeerOutcome::RequestFailed, started.elapsed());
                    tracing::warn!(slot, %peer, error = %err, "failed to get blobs from peer");
                    continue;
                }
                Err(_) => {
                    self.metrics.record(PeerOutcome::Timeout, started.elapsed());
                    tracing::warn!(
                        slot,
                        %peer,
                        timeout = ?self.request_timeout,
                        "blob request to peer timed out"
                    );
                    continue;
                }
            };

            sidecars.sort_by_key(|sidecar| sidecar.index);
            if let Err(err) = verifier(sidecars.as_slice()) {
                self.metrics.record(PeerOutcome::VerifyFailed, started.elapsed());
                tracing::warn!(
                    slot,
                    %peer,
                    count = sidecars.len(),
                    error = %err,
                    "blob verification failed; trying next peer"
                );
                continue;
            }

            self.metrics.record(PeerOutcome::Success, started.elapsed());
            tracing::info!(slot, %peer, count = sidecars.len(), "retrieved and verified blobs");
            return Ok(sidecars);
        }

        tracing::error!(slot, peers_tried = tried, "failed to retrieve blobs from all peers");
        Err(RequestError::AllPeersFailed { tried })
    }
}

impl<C: BlobPeerClient> BlobRequester for MultiPeerRequester<C> {
    fn request_blobs<'a>(
        &'a self,
        cancel: &'a CancellationToken,
        slot: Slot,
        verifier: SidecarVerifier<'a>,
    ) -> BoxFuture<'a, Result<BlobSidecars>> {
        Box::pin(async move { Ok(self.request_verified(cancel, slot, verifier).await?) })
    }

    fn set_head_slot(&self, slot: Slot) {
        self.head_slot.store(slot, Ordering::SeqCst);
    }
}
