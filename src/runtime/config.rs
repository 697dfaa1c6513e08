use crate::runtime::telemetry;
use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the queue directory created under the node's data directory.
pub const QUEUE_DIR_NAME: &str = "blob_fetcher_queue";

const DEFAULT_CHECK_INTERVAL_SECS: u64 = 60;
const DEFAULT_RETRY_INTERVAL_SECS: u64 = 5 * 60;
const DEFAULT_MAX_RETRIES: u32 = 72;
const DEFAULT_PEER_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Runtime configuration for the background blob fetcher.
///
/// All instances must be constructed via [`BlobFetcherConfig::builder`] or
/// [`BlobFetcherConfig::new`] so invariants are validated before any consumer observes the
/// values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobFetcherConfig {
    data_dir: PathBuf,
    check_interval: Duration,
    retry_interval: Duration,
    max_retries: u32,
    metrics_interval: Duration,
    peer_request_timeout: Duration,
}

pub struct BlobFetcherConfigParams {
    pub data_dir: PathBuf,
    pub check_interval: Duration,
    pub retry_interval: Duration,
    pub max_retries: u32,
    pub metrics_interval: Duration,
    pub peer_request_timeout: Duration,
}

impl BlobFetcherConfig {
    /// Returns a builder to incrementally construct and validate a configuration.
    pub fn builder() -> BlobFetcherConfigBuilder {
        BlobFetcherConfigBuilder::default()
    }

    /// Constructs a configuration directly from the provided values.
    pub fn new(params: BlobFetcherConfigParams) -> Result<Self> {
        let BlobFetcherConfigParams {
            data_dir,
            check_interval,
            retry_interval,
            max_retries,
            metrics_interval,
            peer_request_timeout,
        } = params;

        let config = Self {
            data_dir,
            check_interval,
            retry_interval,
            max_retries,
            metrics_interval,
            peer_request_timeout,
        };

        config.validate()?;
        Ok(config)
    }

    /// Node data directory the queue directory lives under.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Directory holding one file per pending slot.
    pub fn queue_dir(&self) -> PathBuf {
        self.data_dir.join(QUEUE_DIR_NAME)
    }

    /// Interval between drain passes of the background loop.
    pub fn check_interval(&self) -> Duration {
        self.check_interval
    }

    /// Minimum spacing between two attempts on the same request.
    pub fn retry_interval(&self) -> Duration {
        self.retry_interval
    }

    /// Failed attempts after which a request is evicted.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Interval used by the telemetry reporter.
    pub fn metrics_interval(&self) -> Duration {
        self.metrics_interval
    }

    /// Per-peer timeout applied by [`crate::network::MultiPeerRequester`].
    pub fn peer_request_timeout(&self) -> Duration {
        self.peer_request_timeout
    }

    /// Performs validation on an existing configuration instance.
    pub fn validate(&self) -> Result<()> {
        if self.data_dir.as_os_str().is_empty() {
            bail!("data_dir cannot be empty");
        }

        if self.check_interval.is_zero() {
            bail!("check_interval must be greater than 0");
        }

        if self.retry_interval.is_zero() {
            bail!("retry_interval must be greater than 0");
        }

        if self.max_retries == 0 {
            bail!("max_retries must be greater than 0");
        }

        if self.metrics_interval.is_zero() {
            bail!("metrics_interval must be greater than 0");
        }

        if self.peer_request_timeout.is_zero() {
            bail!("peer_request_timeout must be greater than 0");
        }

        Ok(())
    }
}

#[derive(Debug, Default, Clone)]
pub struct BlobFetcherConfigBuilder {
    data_dir: Option<PathBuf>,
    check_interval: Option<Duration>,
    retry_interval: Option<Duration>,
    max_retries: Option<u32>,
    metrics_interval: Option<Duration>,
    peer_request_timeout: Option<Duration>,
}

impl BlobFetcherConfigBuilder {
    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }

    pub fn check_interval(mut self, interval: Duration) -> Self {
        self.check_interval = Some(interval);
        self
    }

    pub fn retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = Some(interval);
        self
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = Some(retries);
        self
    }

    pub fn metrics_interval(mut self, interval: Duration) -> Self {
        self.metrics_interval = Some(interval);
        self
    }

    pub fn peer_request_timeout(mut self, timeout: Duration) -> Self {
        self.peer_request_timeout = Some(timeout);
        self
    }

    pub fn build(self) -> Result<BlobFetcherConfig> {
        let params = BlobFetcherConfigParams {
            data_dir: self.data_dir.context("data_dir is required")?,
            check_interval: self
                .check_interval
                .unwrap_or_else(|| Duration::from_secs(DEFAULT_CHECK_INTERVAL_SECS)),
            retry_interval: self
                .retry_interval
                .unwrap_or_else(|| Duration::from_secs(DEFAULT_RETRY_INTERVAL_SECS)),
            max_retries: self.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
            metrics_interval: self
                .metrics_interval
                .unwrap_or(telemetry::DEFAULT_METRICS_INTERVAL),
            peer_request_timeout: self
                .peer_request_timeout
                .unwrap_or_else(|| Duration::from_secs(DEFAULT_PEER_REQUEST_TIMEOUT_SECS)),
        };

        BlobFetcherConfig::new(params)
    }
}
