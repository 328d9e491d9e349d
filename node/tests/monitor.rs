mod common;

use std::sync::Arc;
use std::time::Duration;

use chain::config::DEFAULT_POLL_CONFIG;
use common::{LocalHeaders, ScriptedChain, LOCAL, REFERENCE};
use node::{check_divergence, MonitorError, SyncMonitor};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

fn monitor(chain: Arc<ScriptedChain>, cancel: CancellationToken) -> SyncMonitor {
    SyncMonitor::new(chain, LOCAL, DEFAULT_POLL_CONFIG, cancel)
}

#[tokio::test(start_paused = true)]
async fn test_liveliness_retries_refused_connections_every_half_second() {
    let chain = Arc::new(ScriptedChain::default().with_local_headers([
        LocalHeaders::Refused,
        LocalHeaders::Refused,
        LocalHeaders::Refused,
        LocalHeaders::Epochs { shard: 1, beacon: 1 },
    ]));
    let start = Instant::now();

    monitor(chain.clone(), CancellationToken::new())
        .wait_for_liveliness()
        .await
        .unwrap();

    assert_eq!(*chain.header_calls.lock(), 4);
    assert!(start.elapsed() >= Duration::from_millis(1500));
}

#[tokio::test(start_paused = true)]
async fn test_verify_sync_returns_only_when_all_epochs_agree() {
    let chain = Arc::new(
        ScriptedChain::default()
            .with_local_headers([
                LocalHeaders::Epochs { shard: 3, beacon: 5 },
                LocalHeaders::Epochs { shard: 3, beacon: 5 },
                LocalHeaders::Epochs { shard: 5, beacon: 4 },
                LocalHeaders::Epochs { shard: 6, beacon: 6 },
                LocalHeaders::Epochs { shard: 6, beacon: 6 },
            ])
            .with_reference_epochs([5, 5, 6]),
    );

    let status = monitor(chain, CancellationToken::new())
        .verify_sync(REFERENCE)
        .await
        .unwrap();

    assert!(status.is_synced());
    assert_eq!(status.shard_epoch, 6);
    assert_eq!(status.beacon_epoch, 6);
    assert_eq!(status.reference_epoch, 6);
}

#[tokio::test(start_paused = true)]
async fn test_verify_sync_polls_through_reference_failures() {
    let chain = Arc::new(
        ScriptedChain::default()
            .with_local_headers([LocalHeaders::Epochs { shard: 4, beacon: 4 }])
            .with_reference_epochs([4])
            .with_reference_failures(2),
    );
    let start = Instant::now();

    let status = monitor(chain, CancellationToken::new())
        .verify_sync(REFERENCE)
        .await
        .unwrap();

    assert!(status.is_synced());
    assert!(start.elapsed() >= DEFAULT_POLL_CONFIG.sync_interval * 2);
}

#[tokio::test(start_paused = true)]
async fn test_verify_sync_is_cancellable() {
    let chain = Arc::new(
        ScriptedChain::default()
            .with_local_headers([LocalHeaders::Epochs { shard: 1, beacon: 1 }])
            .with_reference_epochs([2]),
    );
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(30)).await;
        trigger.cancel();
    });

    let err = monitor(chain, cancel).verify_sync(REFERENCE).await.unwrap_err();
    assert!(matches!(err, MonitorError::Cancelled(_)));
}

#[tokio::test(start_paused = true)]
async fn test_wait_for_first_block_skips_genesis() {
    let chain = Arc::new(ScriptedChain::default().with_local_heights([0, 0, 0, 7]));
    let height = monitor(chain, CancellationToken::new())
        .wait_for_first_block()
        .await
        .unwrap();
    assert_eq!(height, 7);
}

#[tokio::test]
async fn test_divergence_compares_fingerprint_blocks() {
    let chain = ScriptedChain::default()
        .with_block_hash(LOCAL, Some("0xAA"))
        .with_block_hash(REFERENCE, Some("0xBB"));
    let divergence = check_divergence(&chain, LOCAL, REFERENCE, 1).await.unwrap();
    assert_eq!(divergence.local_hash.as_deref(), Some("0xAA"));
    assert_eq!(divergence.reference_hash.as_deref(), Some("0xBB"));
    assert!(divergence.requires_hard_reset());

    let chain = ScriptedChain::default().with_block_hash(REFERENCE, Some("0xBB"));
    let divergence = check_divergence(&chain, LOCAL, REFERENCE, 1).await.unwrap();
    assert!(!divergence.requires_hard_reset());
}
