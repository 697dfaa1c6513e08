use std::fs;
use std::sync::Arc;
use std::time::Duration;

use crate::support::{
    fake_da::{FakePeers, FakeProcessor, FakeStorage, PeerBehavior},
    helpers::{block_with_blobs, fast_config, fast_config_builder, init_tracing, wait_until},
};
use anyhow::Result;
use blob_fetcher::{
    BlobFetchRequest, BlobFetcher, BlobFetcherConfig, ChainSpec, DaWindow, MultiPeerRequester,
};
use tempfile::TempDir;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

const WAIT: Duration = Duration::from_secs(5);

pub(crate) type TestFetcher = BlobFetcher<FakeProcessor, MultiPeerRequester<FakePeers>, FakeStorage>;

pub(crate) struct TestNode {
    pub fetcher: TestFetcher,
    pub processor: Arc<FakeProcessor>,
    pub peers: Arc<FakePeers>,
    pub requester: Arc<MultiPeerRequester<FakePeers>>,
    pub storage: Arc<FakeStorage>,
}

impl TestNode {
    pub(crate) fn new(config: BlobFetcherConfig, peers: FakePeers) -> Result<Self> {
        Self::with_chain_spec(config, peers, Arc::new(DaWindow::MAINNET))
    }

    pub(crate) fn with_chain_spec(
        config: BlobFetcherConfig,
        peers: FakePeers,
        chain_spec: Arc<dyn ChainSpec>,
    ) -> Result<Self> {
        let processor = Arc::new(FakeProcessor::default());
        let peers = Arc::new(peers);
        let requester = Arc::new(MultiPeerRequester::from_config(peers.clone(), &config));
        let storage = Arc::new(FakeStorage::default());
        let fetcher = BlobFetcher::new(
            config,
            processor.clone(),
            requester.clone(),
            storage.clone(),
            chain_spec,
        )?;
        Ok(Self {
            fetcher,
            processor,
            peers,
            requester,
            storage,
        })
    }

    pub(crate) fn stored_slots(&self) -> Vec<u64> {
        use blob_fetcher::StorageBackend as _;
        self.storage.availability_store().stored_slots()
    }

    pub(crate) fn queue_len(&self) -> usize {
        self.fetcher.queue().len().unwrap_or(usize::MAX)
    }
}

fn read_request(node: &TestNode, slot: u64) -> BlobFetchRequest {
    let data = fs::read(node.fetcher.queue().entry_path(slot)).expect("request file should exist");
    serde_json::from_slice(&data).expect("request file should decode")
}

#[tokio::test]
async fn queued_blobs_are_fetched_verified_and_stored() -> Result<()> {
    init_tracing();
    let dir = TempDir::new()?;
    let peers = FakePeers::with_peers(&[("honest", PeerBehavior::Honest)]);
    for (slot, blobs) in [(10, 2), (11, 3)] {
        peers.publish(slot, blobs);
    }
    let mut node = TestNode::new(fast_config(dir.path()), peers)?;

    node.fetcher.queue_blob_request(11, &block_with_blobs(11, 3))?;
    node.fetcher.queue_blob_request(10, &block_with_blobs(10, 2))?;
    node.fetcher.queue_blob_request(12, &block_with_blobs(12, 0))?;
    assert_eq!(node.queue_len(), 2, "blocks without blobs are never queued");
    assert!(dir.path().join("blob_fetcher_queue").join("0000000010.json").exists());

    let shutdown = CancellationToken::new();
    node.fetcher.start(&shutdown)?;
    wait_until("queue to drain", WAIT, || node.queue_len() == 0).await?;
    node.fetcher.shutdown().await;

    assert_eq!(node.stored_slots(), vec![10, 11]);
    let snapshot = node.fetcher.telemetry().snapshot();
    assert_eq!(snapshot.requests_queued, 2);
    assert_eq!(snapshot.requests_completed, 2);
    assert_eq!(snapshot.retry_attempts, 0);
    assert_eq!(node.processor.rejections(), 0);
    Ok(())
}

#[tokio::test]
async fn byzantine_peers_cannot_poison_the_store() -> Result<()> {
    init_tracing();
    let dir = TempDir::new()?;
    let peers = FakePeers::with_peers(&[
        ("liar-1", PeerBehavior::Byzantine),
        ("down", PeerBehavior::Offline),
        ("liar-2", PeerBehavior::Byzantine),
        ("honest", PeerBehavior::Honest),
    ]);
    peers.publish(40, 2);
    let mut node = TestNode::new(fast_config(dir.path()), peers)?;
    node.fetcher.queue_blob_request(40, &block_with_blobs(40, 2))?;

    let shutdown = CancellationToken::new();
    node.fetcher.start(&shutdown)?;
    wait_until("blobs to be stored", WAIT, || !node.stored_slots().is_empty()).await?;
    node.fetcher.shutdown().await;

    use blob_fetcher::StorageBackend as _;
    let stored = node
        .storage
        .availability_store()
        .sidecars(40)
        .expect("slot 40 should be stored");
    assert_eq!(stored, crate::support::fake_da::honest_sidecars(40, 2));
    assert_eq!(node.processor.rejections(), 2);

    let attempts = node.requester.metrics();
    assert_eq!(attempts.verify_failed, 2);
    assert_eq!(attempts.request_failed, 1);
    assert_eq!(attempts.success, 1);
    Ok(())
}

#[tokio::test]
async fn failed_fetch_is_persisted_for_retry() -> Result<()> {
    init_tracing();
    let dir = TempDir::new()?;
    let peers = FakePeers::with_peers(&[
        ("liar", PeerBehavior::Byzantine),
        ("down", PeerBehavior::Offline),
    ]);
    peers.publish(70, 1);
    let mut node = TestNode::new(fast_config(dir.path()), peers)?;
    node.fetcher.queue_blob_request(70, &block_with_blobs(70, 1))?;

    let shutdown = CancellationToken::new();
    node.fetcher.start(&shutdown)?;
    let telemetry = node.fetcher.telemetry();
    wait_until("first retry", WAIT, || telemetry.snapshot().retry_attempts == 1).await?;

    // Several more scans happen, but the retry interval keeps the slot parked.
    sleep(Duration::from_millis(100)).await;
    node.fetcher.shutdown().await;

    assert_eq!(telemetry.snapshot().retry_attempts, 1);
    assert_eq!(node.peers.requests(), 2, "each peer is asked once per attempt");
    assert!(node.stored_slots().is_empty());

    let pending = read_request(&node, 70);
    assert_eq!(pending.failure_count, 1);
    assert!(pending.last_retry_time.is_some());
    assert_eq!(pending.commitments, block_with_blobs(70, 1).blob_kzg_commitments());
    Ok(())
}

#[tokio::test]
async fn exhausted_request_is_evicted() -> Result<()> {
    init_tracing();
    let dir = TempDir::new()?;
    let config = fast_config_builder(dir.path())
        .retry_interval(Duration::from_millis(1))
        .max_retries(2)
        .build()?;
    let peers = FakePeers::with_peers(&[("down", PeerBehavior::Offline)]);
    let mut node = TestNode::new(config, peers)?;
    node.fetcher.queue_blob_request(90, &block_with_blobs(90, 1))?;

    let shutdown = CancellationToken::new();
    node.fetcher.start(&shutdown)?;
    let telemetry = node.fetcher.telemetry();
    wait_until("max-retry eviction", WAIT, || {
        telemetry.snapshot().expired_max_retries == 1
    })
    .await?;
    node.fetcher.shutdown().await;

    let snapshot = telemetry.snapshot();
    assert_eq!(snapshot.retry_attempts, 2);
    assert_eq!(snapshot.requests_completed, 0);
    assert_eq!(node.queue_len(), 0);
    Ok(())
}

#[tokio::test]
async fn requests_outside_window_are_dropped_once_head_is_known() -> Result<()> {
    init_tracing();
    let dir = TempDir::new()?;
    let peers = FakePeers::with_peers(&[("honest", PeerBehavior::Honest)]);
    peers.publish(10, 1);
    peers.publish(9_000, 1);
    let mut node = TestNode::with_chain_spec(
        fast_config(dir.path()),
        peers,
        Arc::new(DaWindow::new(32, 4)),
    )?;
    node.fetcher.queue_blob_request(10, &block_with_blobs(10, 1))?;
    node.fetcher.queue_blob_request(9_000, &block_with_blobs(9_000, 1))?;

    node.fetcher.set_head_slot(9_010);
    assert_eq!(node.requester.head_slot(), 9_010);

    let shutdown = CancellationToken::new();
    node.fetcher.start(&shutdown)?;
    wait_until("queue to drain", WAIT, || node.queue_len() == 0).await?;
    node.fetcher.shutdown().await;

    let snapshot = node.fetcher.telemetry().snapshot();
    assert_eq!(snapshot.expired_outside_window, 1);
    assert_eq!(snapshot.requests_completed, 1);
    assert_eq!(node.stored_slots(), vec![9_000]);
    Ok(())
}

#[tokio::test]
async fn unknown_head_keeps_old_requests() -> Result<()> {
    init_tracing();
    let dir = TempDir::new()?;
    let peers = FakePeers::with_peers(&[("down", PeerBehavior::Offline)]);
    let mut node = TestNode::with_chain_spec(
        fast_config(dir.path()),
        peers,
        Arc::new(DaWindow::new(32, 0)),
    )?;
    node.fetcher.queue_blob_request(1, &block_with_blobs(1, 1))?;

    let shutdown = CancellationToken::new();
    node.fetcher.start(&shutdown)?;
    let telemetry = node.fetcher.telemetry();
    wait_until("first attempt", WAIT, || telemetry.snapshot().retry_attempts == 1).await?;
    node.fetcher.shutdown().await;

    assert_eq!(telemetry.snapshot().expired_outside_window, 0);
    assert_eq!(node.queue_len(), 1);
    Ok(())
}

#[tokio::test]
async fn stop_is_idempotent_and_parent_cancellation_stops_the_loop() -> Result<()> {
    init_tracing();
    let dir = TempDir::new()?;
    let mut node = TestNode::new(fast_config(dir.path()), FakePeers::default())?;

    let parent = CancellationToken::new();
    node.fetcher.start(&parent)?;
    assert!(node.fetcher.is_running());
    assert!(node.fetcher.start(&parent).is_err());

    node.fetcher.stop();
    node.fetcher.stop();
    node.fetcher.stop();
    assert!(!node.fetcher.is_running());
    tokio::time::timeout(WAIT, node.fetcher.shutdown()).await?;
    assert!(!parent.is_cancelled());

    node.fetcher.start(&parent)?;
    parent.cancel();
    assert!(!node.fetcher.is_running());
    tokio::time::timeout(WAIT, node.fetcher.shutdown()).await?;
    Ok(())
}

#[test]
fn unusable_data_dir_fails_construction() {
    let dir = TempDir::new().unwrap();
    let blocker = dir.path().join("occupied");
    fs::write(&blocker, b"not a directory").unwrap();

    let result = TestNode::new(fast_config(&blocker), FakePeers::default());
    let err = result.err().expect("construction should fail");
    assert!(format!("{err:#}").contains("failed to open blob fetch queue"));
}
