//! Run-scoped cancellation and background task ownership for `BlobFetcher`.

use crate::runtime::telemetry::{self, Telemetry};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub(crate) struct LifecycleHandles {
    pub run_token: CancellationToken,
    stopped: AtomicBool,
    metrics_handle: Option<JoinHandle<()>>,
    worker_handle: Option<JoinHandle<()>>,
}

impl LifecycleHandles {
    /// Derives the run token from `parent` and starts the metrics reporter on it.
    pub(crate) fn spawn(
        parent: &CancellationToken,
        telemetry: Arc<Telemetry>,
        metrics_interval: Duration,
    ) -> Self {
        let run_token = parent.child_token();
        let metrics_handle =
            telemetry::spawn_metrics_reporter(telemetry, run_token.clone(), metrics_interval);

        Self {
            run_token,
            stopped: AtomicBool::new(false),
            metrics_handle: Some(metrics_handle),
            worker_handle: None,
        }
    }

    pub(crate) fn attach_worker(&mut self, handle: JoinHandle<()>) {
        self.worker_handle = Some(handle);
    }

    /// Cancels the run token. Returns `true` only for the call that did it.
    pub(crate) fn stop(&self) -> bool {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.run_token.cancel();
        true
    }

    pub(crate) fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst) || self.run_token.is_cancelled()
    }

    /// Stops the run (if still live) and waits for the background tasks.
    pub(crate) async fn shutdown(mut self) {
        self.stop();

        if let Some(handle) = self.worker_handle.take() {
            if let Err(err) = handle.await {
                tracing::warn!(error = %err, "blob fetch loop task panicked");
            }
        }

        if let Some(handle) = self.metrics_handle.take() {
            if let Err(err) = handle.await {
                tracing::warn!(error = %err, "metrics reporter task panicked");
            }
        }
    }
}
