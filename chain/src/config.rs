use std::time::Duration;

/// Assumed block time of the network; every "wait a block" poll uses it.
pub const BLOCK_TIME_SECS: u64 = 8;
pub const LIVELINESS_POLL_MS: u64 = 500;
pub const SYNC_POLL_SECS: u64 = 1;
/// Pause between killing the node and relaunching it on a hard reset.
pub const HARD_RESET_COOLDOWN_SECS: u64 = 10;
/// Height whose block hash fingerprints the chain history a node holds.
pub const FINGERPRINT_HEIGHT: u64 = 1;
/// Shard 0 balance required on top of the stake for transaction fees.
pub const GAS_FEE_MARGIN: f64 = 1.0;
/// Time allowed for each expected prompt of an interactive CLI call.
pub const INTERACTION_TIMEOUT_SECS: u64 = 30;
/// Timeout of a single JSON-RPC request.
pub const RPC_TIMEOUT_SECS: u64 = 10;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PollConfig {
    pub liveliness_interval: Duration,
    pub sync_interval: Duration,
    pub block_time: Duration,
    pub hard_reset_cooldown: Duration,
    pub fingerprint_height: u64,
}

pub const DEFAULT_POLL_CONFIG: PollConfig = PollConfig {
    liveliness_interval: Duration::from_millis(LIVELINESS_POLL_MS),
    sync_interval: Duration::from_secs(SYNC_POLL_SECS),
    block_time: Duration::from_secs(BLOCK_TIME_SECS),
    hard_reset_cooldown: Duration::from_secs(HARD_RESET_COOLDOWN_SECS),
    fingerprint_height: FINGERPRINT_HEIGHT,
};

impl Default for PollConfig {
    fn default() -> Self {
        DEFAULT_POLL_CONFIG
    }
}
