use crate::queue::EvictionReason;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio::{select, time};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Default interval used by the metrics reporter task.
pub const DEFAULT_METRICS_INTERVAL: Duration = Duration::from_secs(30);

static TRACING_INIT: OnceLock<()> = OnceLock::new();

/// Installs a basic tracing subscriber (if one is not already active).
///
/// The subscriber honours `RUST_LOG` if it is present, otherwise it falls back to `info`.
/// Calling this function multiple times is harmless.
pub fn init_tracing() {
    if TRACING_INIT.get().is_some() {
        return;
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .try_init();

    let _ = TRACING_INIT.set(());
}

/// Counters and gauges describing the blob fetch queue.
#[derive(Default, Debug)]
pub struct Telemetry {
    requests_queued: AtomicU64,
    requests_completed: AtomicU64,
    retry_attempts: AtomicU64,
    expired_outside_window: AtomicU64,
    expired_max_retries: AtomicU64,
    queue_depth: AtomicUsize,
}

impl Telemetry {
    pub fn record_queued(&self) {
        self.requests_queued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_completed(&self) {
        self.requests_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retry(&self) {
        self.retry_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_expired(&self, reason: EvictionReason) {
        let counter = match reason {
            EvictionReason::OutsideWindow => &self.expired_outside_window,
            EvictionReason::MaxRetries => &self.expired_max_retries,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_queue_depth(&self, depth: usize) {
        self.queue_depth.store(depth, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            requests_queued: self.requests_queued.load(Ordering::Relaxed),
            requests_completed: self.requests_completed.load(Ordering::Relaxed),
            retry_attempts: self.retry_attempts.load(Ordering::Relaxed),
            expired_outside_window: self.expired_outside_window.load(Ordering::Relaxed),
            expired_max_retries: self.expired_max_retries.load(Ordering::Relaxed),
            queue_depth: self.queue_depth.load(Ordering::Relaxed),
        }
    }

    pub fn expired(&self, reason: EvictionReason) -> u64 {
        match reason {
            EvictionReason::OutsideWindow => self.expired_outside_window.load(Ordering::Relaxed),
            EvictionReason::MaxRetries => self.expired_max_retries.load(Ordering::Relaxed),
        }
    }

    pub fn queue_depth(&self) -> usize {
        self.queue_depth.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct TelemetrySnapshot {
    pub requests_queued: u64,
    pub requests_completed: u64,
    pub retry_attempts: u64,
    pub expired_outside_window: u64,
    pub expired_max_retries: u64,
    pub queue_depth: usize,
}

/// Spawns a background task that periodically logs queue depth and request outcomes.
pub fn spawn_metrics_reporter(
    telemetry: Arc<Telemetry>,
    shutdown: CancellationToken,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut last_snapshot = telemetry.snapshot();
        let mut last_tick = Instant::now();

        loop {
            select! {
                _ = shutdown.cancelled() => {
                    tracing::info!(target: "blob_fetcher::metrics", "metrics reporter shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    let current = telemetry.snapshot();
                    let completed_delta = current
                        .requests_completed
                        .saturating_sub(last_snapshot.requests_completed);
                    let elapsed = last_tick.elapsed().as_secs_f64();
                    let completion_rate = if elapsed <= f64::EPSILON {
                        0.0
                    } else {
                        completed_delta as f64 / elapsed
                    };

                    tracing::info!(
                        target: "blob_fetcher::metrics",
                        completion_rate = format!("{completion_rate:.3}"),
                        queue_depth = current.queue_depth,
                        queued = current.requests_queued,
                        completed = current.requests_completed,
                        retries = current.retry_attempts,
                        expired_outside_window = current.expired_outside_window,
                        expired_max_retries = current.expired_max_retries,
                        "blob fetcher metrics snapshot"
                    );

                    last_snapshot = current;
                    last_tick = Instant::now();
                }
            }
        }
    })
}
