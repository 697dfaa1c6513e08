use crate::da::{BlobProcessor, BlobRequester, StorageBackend};
use crate::processor::fetcher::BlobFetcher;
use anyhow::Result;
use tokio::signal;
use tokio_util::sync::CancellationToken;

/// Drives a [`BlobFetcher`] from a root shutdown token and OS signals.
pub struct Runner<P, R, S> {
    fetcher: BlobFetcher<P, R, S>,
    shutdown: CancellationToken,
}

impl<P, R, S> Runner<P, R, S>
where
    P: BlobProcessor,
    R: BlobRequester,
    S: StorageBackend<Store = P::Store>,
{
    pub fn new(fetcher: BlobFetcher<P, R, S>) -> Self {
        Self {
            fetcher,
            shutdown: CancellationToken::new(),
        }
    }

    /// Returns a clone of the root shutdown token so external callers can integrate
    /// with their own signal handlers or cancellation strategies.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// The wrapped fetcher, for enqueueing requests and pushing head updates.
    pub fn fetcher(&self) -> &BlobFetcher<P, R, S> {
        &self.fetcher
    }

    /// Starts the background loop. A no-op while it is already running.
    pub fn start(&mut self) -> Result<()> {
        if self.fetcher.is_running() {
            return Ok(());
        }
        if self.shutdown.is_cancelled() {
            self.shutdown = CancellationToken::new();
        }
        self.fetcher.start(&self.shutdown)
    }

    /// Cancels the root token and waits for the fetcher's tasks to exit.
    pub async fn stop(&mut self) {
        self.shutdown.cancel();
        self.fetcher.shutdown().await;
        self.shutdown = CancellationToken::new();
    }

    /// Runs until a Ctrl-C (SIGINT) is received or the shutdown token is cancelled elsewhere.
    pub async fn run_until_ctrl_c(&mut self) -> Result<()> {
        self.start()?;
        tracing::info!("blob fetcher running; waiting for Ctrl-C (SIGINT) to initiate shutdown");

        tokio::select! {
            _ = signal::ctrl_c() => {
                tracing::info!("Ctrl-C received; shutting down blob fetcher");
            }
            _ = self.shutdown.cancelled() => {
                tracing::info!("runner shutdown token cancelled");
            }
        }

        self.stop().await;
        Ok(())
    }
}
