//! Blob fetch orchestration.
//!
//! `BlobFetcher` owns the durable queue and a single background loop that
//! drains it:
//! - `queue` persists requests and decides which one is actionable next.
//! - `executor` fetches from peers and stores blobs only once verified.
//! - `head` carries the chain head from the block-processing path to the loop.
//! - `lifecycle` wires run-scoped cancellation and the metrics reporter.
//!
//! Callers enqueue work with [`BlobFetcher::queue_blob_request`] and keep the
//! head current with [`BlobFetcher::set_head_slot`]; everything else happens
//! on the background loop.

use super::executor::BlobFetchExecutor;
use super::head::HeadSlot;
use super::lifecycle::LifecycleHandles;
use crate::da::{BlobProcessor, BlobRequester, ChainSpec, StorageBackend};
use crate::primitives::{BeaconBlock, Slot};
use crate::queue::{BlobFetchRequest, BlobQueue, QueueError};
use crate::runtime::config::BlobFetcherConfig;
use crate::runtime::telemetry::Telemetry;
use anyhow::{bail, Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

pub struct BlobFetcher<P, R, S> {
    config: BlobFetcherConfig,
    queue: Arc<BlobQueue>,
    executor: BlobFetchExecutor<P, R, S>,
    chain_spec: Arc<dyn ChainSpec>,
    head_slot: Arc<HeadSlot>,
    telemetry: Arc<Telemetry>,
    lifecycle: Option<LifecycleHandles>,
}

/// How a single drain pass ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PassOutcome {
    /// Nothing actionable is left until the next tick.
    Idle,
    /// The run was cancelled mid-pass.
    Cancelled,
    /// A queue operation failed; the next tick starts over.
    Aborted,
}

/// Everything the background loop needs, moved into its task.
pub(crate) struct DrainLoop<P, R, S> {
    queue: Arc<BlobQueue>,
    executor: BlobFetchExecutor<P, R, S>,
    chain_spec: Arc<dyn ChainSpec>,
    head_slot: Arc<HeadSlot>,
    telemetry: Arc<Telemetry>,
    retry_interval: Duration,
    max_retries: u32,
}

impl<P, R, S> BlobFetcher<P, R, S>
where
    P: BlobProcessor,
    R: BlobRequester,
    S: StorageBackend<Store = P::Store>,
{
    /// Opens the queue under `config.queue_dir()` and wires the collaborators.
    ///
    /// Fails when the queue directory cannot be created or read; the fetcher
    /// is unusable in that case.
    pub fn new(
        config: BlobFetcherConfig,
        processor: Arc<P>,
        requester: Arc<R>,
        storage: Arc<S>,
        chain_spec: Arc<dyn ChainSpec>,
    ) -> Result<Self> {
        debug_assert!(
            config.validate().is_ok(),
            "BlobFetcherConfig should have been validated at construction time"
        );

        let telemetry = Arc::new(Telemetry::default());
        let queue_dir = config.queue_dir();
        let queue = BlobQueue::with_telemetry(&queue_dir, telemetry.clone())
            .with_context(|| format!("failed to open blob fetch queue at {}", queue_dir.display()))?;

        Ok(Self {
            config,
            queue: Arc::new(queue),
            executor: BlobFetchExecutor::new(processor, requester, storage),
            chain_spec,
            head_slot: Arc::new(HeadSlot::default()),
            telemetry,
            lifecycle: None,
        })
    }

    /// Returns a reference to the fetcher's configuration.
    pub fn config(&self) -> &BlobFetcherConfig {
        &self.config
    }

    pub fn queue(&self) -> &Arc<BlobQueue> {
        &self.queue
    }

    /// Returns a clone of the telemetry handle for observability.
    pub fn telemetry(&self) -> Arc<Telemetry> {
        self.telemetry.clone()
    }

    /// Last head slot passed to [`Self::set_head_slot`], zero if none yet.
    pub fn head_slot(&self) -> Slot {
        self.head_slot.current()
    }

    /// Whether a background loop is live and has not been stopped.
    pub fn is_running(&self) -> bool {
        self.lifecycle
            .as_ref()
            .map(|handles| !handles.is_stopped())
            .unwrap_or(false)
    }

    /// Spawns the background drain loop on a child of `parent` and returns.
    ///
    /// Returns an error if a previous run has not been shut down yet.
    pub fn start(&mut self, parent: &CancellationToken) -> Result<()> {
        if self.lifecycle.is_some() {
            bail!("blob fetcher already started; call shutdown before starting again");
        }

        tracing::info!(
            queue_dir = %self.queue.dir().display(),
            check_interval = ?self.config.check_interval(),
            retry_interval = ?self.config.retry_interval(),
            max_retries = self.config.max_retries(),
            "starting blob fetcher"
        );

        let mut lifecycle = LifecycleHandles::spawn(
            parent,
            self.telemetry.clone(),
            self.config.metrics_interval(),
        );
        let drain_loop = DrainLoop {
            queue: self.queue.clone(),
            executor: self.executor.clone(),
            chain_spec: self.chain_spec.clone(),
            head_slot: self.head_slot.clone(),
            telemetry: self.telemetry.clone(),
            retry_interval: self.config.retry_interval(),
            max_retries: self.config.max_retries(),
        };
        let handle = drain_loop.spawn(lifecycle.run_token.clone(), self.config.check_interval());
        lifecycle.attach_worker(handle);
        self.lifecycle = Some(lifecycle);

        Ok(())
    }

    /// Cancels the background loop. Safe to call any number of times.
    ///
    /// An in-flight fetch is allowed to finish; no new one is started.
    pub fn stop(&self) {
        if let Some(handles) = &self.lifecycle {
            if handles.stop() {
                tracing::info!("stopping blob fetcher");
            }
        }
    }

    /// Stops the loop and waits for the background tasks to exit.
    pub async fn shutdown(&mut self) {
        if let Some(handles) = self.lifecycle.take() {
            if handles.stop() {
                tracing::info!("stopping blob fetcher");
            }
            handles.shutdown().await;
            tracing::info!("blob fetcher stopped");
        }
    }

    /// Records the node's head slot and forwards it to the network layer.
    pub fn set_head_slot(&self, slot: Slot) {
        self.head_slot.update(slot);
        self.executor.requester().set_head_slot(slot);
    }

    /// Persists a fetch request for the blobs of `block`.
    ///
    /// Blocks without blob commitments are ignored, as are slots that already
    /// have a pending request.
    pub fn queue_blob_request(&self, slot: Slot, block: &BeaconBlock) -> Result<()> {
        let commitments = block.blob_kzg_commitments();
        if commitments.is_empty() {
            return Ok(());
        }

        let request = BlobFetchRequest::new(block.header().clone(), commitments.to_vec());
        let added = self
            .queue
            .add(slot, &request)
            .with_context(|| format!("failed to queue blob fetch request for slot {slot}"))?;
        if added {
            tracing::info!(slot, blob_count = commitments.len(), "queued blob fetch request");
        }
        Ok(())
    }
}

impl<P, R, S> DrainLoop<P, R, S>
where
    P: BlobProcessor,
    R: BlobRequester,
    S: StorageBackend<Store = P::Store>,
{
    fn spawn(self, shutdown: CancellationToken, check_interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = time::interval(check_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        if self.drain(&shutdown).await == PassOutcome::Cancelled {
                            break;
                        }
                    }
                }
            }

            tracing::info!("blob fetch loop stopped");
        })
    }

    /// Works through every request that is actionable right now.
    pub(crate) async fn drain(&self, cancel: &CancellationToken) -> PassOutcome {
        loop {
            if cancel.is_cancelled() {
                return PassOutcome::Cancelled;
            }

            let head_slot = self.head_slot.current();
            let chain_spec = &self.chain_spec;
            let next = self.queue.get_next(
                head_slot,
                self.retry_interval,
                self.max_retries,
                |slot, head| chain_spec.within_da_period(slot, head),
            );

            let (request, entry) = match next {
                Ok(Some(found)) => found,
                Ok(None) => return PassOutcome::Idle,
                Err(err) if self.discard_unreadable(head_slot, &err) => continue,
                Err(_) => return PassOutcome::Aborted,
            };

            let slot = request.slot();
            match self.executor.fetch_and_verify(cancel, &request).await {
                Ok(_) => {
                    if let Err(err) = self.queue.remove(&entry) {
                        tracing::error!(slot, error = %err, "failed to remove completed blob fetch request");
                        return PassOutcome::Aborted;
                    }
                    self.telemetry.record_completed();
                }
                Err(err) => {
                    if cancel.is_cancelled() {
                        tracing::info!(slot, error = %format!("{err:#}"), "blob fetch interrupted by shutdown");
                        return PassOutcome::Cancelled;
                    }

                    tracing::warn!(
                        slot,
                        failure_count = request.failure_count.saturating_add(1),
                        error = %format!("{err:#}"),
                        "blob fetch attempt failed; will retry"
                    );
                    if let Err(err) = self.queue.update_retry(&entry, request) {
                        tracing::error!(slot, error = %err, "failed to record blob fetch retry");
                        return PassOutcome::Aborted;
                    }
                }
            }
        }
    }

    /// Drops the entry a failed scan could not read. Returns `false` when the
    /// scan failed as a whole or the entry cannot be removed either.
    fn discard_unreadable(&self, head_slot: Slot, err: &QueueError) -> bool {
        tracing::error!(head_slot, error = %err, "failed to get next blob fetch request");
        let Some(entry) = err.entry() else {
            return false;
        };
        match self.queue.remove(entry) {
            Ok(()) => true,
            Err(remove_err) => {
                tracing::error!(
                    error = %remove_err,
                    "failed to remove unreadable blob fetch request"
                );
                false
            }
        }
    }
}
