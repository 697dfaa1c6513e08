//! Counters describing individual peer attempts made by `MultiPeerRequester`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Result of asking one peer for the sidecars of a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PeerOutcome {
    Success,
    VerifyFailed,
    RequestFailed,
    Timeout,
}

impl PeerOutcome {
    /// Metric label for the outcome.
    pub fn as_str(&self) -> &'static str {
        match self {
            PeerOutcome::Success => "success",
            PeerOutcome::VerifyFailed => "verify_failed",
            PeerOutcome::RequestFailed => "request_failed",
            PeerOutcome::Timeout => "timeout",
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct PeerAttemptMetrics {
    success: AtomicU64,
    verify_failed: AtomicU64,
    request_failed: AtomicU64,
    timeout: AtomicU64,
    total_latency_ns: AtomicU64,
}

impl PeerAttemptMetrics {
    pub(crate) fn record(&self, outcome: PeerOutcome, latency: Duration) {
        let counter = match outcome {
            PeerOutcome::Success => &self.success,
            PeerOutcome::VerifyFailed => &self.verify_failed,
            PeerOutcome::RequestFailed => &self.request_failed,
            PeerOutcome::Timeout => &self.timeout,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        self.total_latency_ns
            .fetch_add(latency.as_nanos() as u64, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> PeerAttemptSnapshot {
        let success = self.success.load(Ordering::Relaxed);
        let verify_failed = self.verify_failed.load(Ordering::Relaxed);
        let request_failed = self.request_failed.load(Ordering::Relaxed);
        let timeout = self.timeout.load(Ordering::Relaxed);
        let total_attempts = success + verify_failed + request_failed + timeout;
        let total_latency_ns = self.total_latency_ns.load(Ordering::Relaxed);

        let average_latency_ms = if total_attempts == 0 {
            0.0
        } else {
            (total_latency_ns as f64 / total_attempts as f64) / 1_000_000.0
        };

        PeerAttemptSnapshot {
            success,
            verify_failed,
            request_failed,
            timeout,
            average_latency_ms,
        }
    }
}

#[derive(Debug, Copy, Clone, Default)]
pub struct PeerAttemptSnapshot {
    pub success: u64,
    pub verify_failed: u64,
    pub request_failed: u64,
    pub timeout: u64,
    pub average_latency_ms: f64,
}

impl PeerAttemptSnapshot {
    pub fn total_attempts(&self) -> u64 {
        self.success + self.verify_failed + self.request_failed + self.timeout
    }

    pub fn count(&self, outcome: PeerOutcome) -> u64 {
        match outcome {
            PeerOutcome::Success => self.success,
            PeerOutcome::VerifyFailed => self.verify_failed,
            PeerOutcome::RequestFailed => self.request_failed,
            PeerOutcome::Timeout => self.timeout,
        }
    }
}
