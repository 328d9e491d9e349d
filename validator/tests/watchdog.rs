mod common;

use std::sync::Arc;

use common::{CallLog, MockStaking, ADDRESS};
use validator::EposWatchdog;

#[tokio::test]
async fn test_active_status_submits_nothing() {
    let staking = Arc::new(MockStaking::new(CallLog::default()));
    let watchdog = EposWatchdog::new(staking.clone());

    assert!(!watchdog.reconcile(ADDRESS, "currently elected").await.unwrap());
    assert!(!watchdog.reconcile(ADDRESS, "currently elected").await.unwrap());
    assert_eq!(staking.count("activate:"), 0);
}

#[tokio::test]
async fn test_inactive_status_activates_every_time() {
    let staking = Arc::new(MockStaking::new(CallLog::default()));
    let watchdog = EposWatchdog::new(staking.clone());

    assert!(watchdog.reconcile(ADDRESS, "currently elected, not signing").await.unwrap());
    assert!(watchdog.reconcile(ADDRESS, "currently elected, not signing").await.unwrap());
    assert_eq!(staking.count(&format!("activate:{ADDRESS}")), 2);

    assert!(watchdog
        .reconcile(ADDRESS, "not eligible to be elected next epoch")
        .await
        .unwrap());
    assert_eq!(staking.count("activate:"), 3);
}
