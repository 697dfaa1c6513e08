use std::fs;
use std::time::Duration;

use crate::fetcher_pipeline::TestNode;
use crate::support::{
    fake_da::{FakePeers, PeerBehavior},
    helpers::{block_with_blobs, fast_config, init_tracing, wait_until},
};
use anyhow::Result;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

const WAIT: Duration = Duration::from_secs(5);

#[tokio::test]
async fn pending_requests_survive_a_restart() -> Result<()> {
    init_tracing();
    let dir = TempDir::new()?;

    {
        let peers = FakePeers::with_peers(&[("down", PeerBehavior::Offline)]);
        let mut node = TestNode::new(fast_config(dir.path()), peers)?;
        for slot in [300, 100, 200] {
            node.fetcher.queue_blob_request(slot, &block_with_blobs(slot, 1))?;
        }

        let shutdown = CancellationToken::new();
        node.fetcher.start(&shutdown)?;
        let telemetry = node.fetcher.telemetry();
        wait_until("every slot to fail once", WAIT, || {
            telemetry.snapshot().retry_attempts == 3
        })
        .await?;
        shutdown.cancel();
        node.fetcher.shutdown().await;
    }

    // A crash between writing and renaming leaves only the temp file behind.
    let queue_dir = dir.path().join("blob_fetcher_queue");
    fs::write(queue_dir.join("0000000400.json.tmp"), b"{\"header\":")?;

    let peers = FakePeers::with_peers(&[("honest", PeerBehavior::Honest)]);
    for slot in [100, 200, 300] {
        peers.publish(slot, 1);
    }
    let config = crate::support::helpers::fast_config_builder(dir.path())
        .retry_interval(Duration::from_millis(20))
        .build()?;
    let mut node = TestNode::new(config, peers)?;
    assert!(!queue_dir.join("0000000400.json.tmp").exists());
    assert_eq!(node.queue_len(), 3);

    let shutdown = CancellationToken::new();
    node.fetcher.start(&shutdown)?;
    wait_until("queue to drain after restart", WAIT, || node.queue_len() == 0).await?;
    node.fetcher.shutdown().await;

    assert_eq!(node.stored_slots(), vec![100, 200, 300]);
    assert_eq!(node.fetcher.head_slot(), 0, "head slot is not persisted");
    Ok(())
}

#[tokio::test]
async fn files_from_older_nodes_and_corrupted_files_are_handled() -> Result<()> {
    init_tracing();
    let dir = TempDir::new()?;
    let queue_dir = dir.path().join("blob_fetcher_queue");
    fs::create_dir_all(&queue_dir)?;

    // Older nodes write header integers as hex quantities and a zero time for
    // "never retried".
    let block = block_with_blobs(5, 1);
    let root = format!("0x{}", "00".repeat(32));
    let commitments = serde_json::to_string(block.blob_kzg_commitments())?;
    let legacy = format!(
        r#"{{"header":{{"slot":"0x5","proposer_index":"0x5","parent_block_root":"{root}","state_root":"{root}","body_root":"{root}"}},"commitments":{commitments},"last_retry_time":"0001-01-01T00:00:00Z","failure_count":0}}"#
    );
    fs::write(queue_dir.join("0000000005.json"), legacy)?;
    fs::write(queue_dir.join("0000000004.json"), b"{not json")?;

    let peers = FakePeers::with_peers(&[("honest", PeerBehavior::Honest)]);
    peers.publish(5, 1);
    let mut node = TestNode::new(fast_config(dir.path()), peers)?;

    let shutdown = CancellationToken::new();
    node.fetcher.start(&shutdown)?;
    wait_until("legacy request to complete", WAIT, || node.queue_len() == 0).await?;
    node.fetcher.shutdown().await;

    assert_eq!(node.stored_slots(), vec![5]);
    assert!(!queue_dir.join("0000000004.json").exists());
    assert!(queue_dir.join("0000000004.json.corrupted").exists());
    assert!(!queue_dir.join("0000000005.json.corrupted").exists());
    Ok(())
}
