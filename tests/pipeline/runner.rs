use std::time::Duration;

use crate::fetcher_pipeline::TestNode;
use crate::support::{
    fake_da::{FakePeers, PeerBehavior},
    helpers::{block_with_blobs, fast_config, init_tracing, wait_until},
};
use anyhow::{Context, Result};
use blob_fetcher::Runner;
use tokio::time::timeout;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn runner_drains_until_token_is_cancelled() -> Result<()> {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let peers = FakePeers::with_peers(&[("honest", PeerBehavior::Honest)]);
    peers.publish(64, 2);
    let node = TestNode::new(fast_config(dir.path()), peers)?;
    node.fetcher.queue_blob_request(64, &block_with_blobs(64, 2))?;
    let queue = node.fetcher.queue().clone();

    let mut runner = Runner::new(node.fetcher);
    let token = runner.cancellation_token();
    let run = tokio::spawn(async move {
        let outcome = runner.run_until_ctrl_c().await;
        (runner, outcome)
    });

    wait_until("queue to drain", Duration::from_secs(5), || {
        queue.is_empty().unwrap_or(false)
    })
    .await?;
    token.cancel();

    let (runner, outcome) = timeout(Duration::from_secs(5), run)
        .await
        .context("runner should stop after cancellation")??;
    outcome?;
    assert!(!runner.fetcher().is_running());
    assert_eq!(runner.fetcher().telemetry().snapshot().requests_completed, 1);
    Ok(())
}

#[tokio::test]
async fn runner_can_restart_after_stop() -> Result<()> {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let node = TestNode::new(fast_config(dir.path()), FakePeers::default())?;
    let mut runner = Runner::new(node.fetcher);

    runner.start()?;
    runner.start()?;
    assert!(runner.fetcher().is_running());

    runner.stop().await;
    assert!(!runner.fetcher().is_running());
    assert!(!runner.cancellation_token().is_cancelled());

    runner.start()?;
    assert!(runner.fetcher().is_running());
    runner.stop().await;
    Ok(())
}
