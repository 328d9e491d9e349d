/// Sync classification of the local node.
///
/// Never stored: recomputed on every poll from the epochs the local node
/// reports for its shard and the beacon chain, and the epoch a reference
/// endpoint reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// RPC port not bound yet.
    Unreachable,

    /// Node answers but at least one of its chains lags the reference.
    Syncing,

    /// Shard epoch, beacon epoch and reference epoch are all equal.
    Synced,
}

impl Default for SyncState {
    fn default() -> Self {
        SyncState::Unreachable
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncStatus {
    pub shard_epoch: u64,
    pub beacon_epoch: u64,
    pub reference_epoch: u64,
}

impl SyncStatus {
    pub fn is_synced(&self) -> bool {
        self.shard_epoch == self.reference_epoch && self.beacon_epoch == self.reference_epoch
    }

    pub fn state(&self) -> SyncState {
        if self.is_synced() {
            SyncState::Synced
        } else {
            SyncState::Syncing
        }
    }
}
