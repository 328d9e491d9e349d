//! Hard-fork detection.
//!
//! The hash of an early block fingerprints the chain history a node was
//! bootstrapped with. When the local node and the reference shard endpoint
//! disagree on it, the local database belongs to a different (stale or
//! forked) genesis and only a clean restart recovers it.

use chain::{ChainQuery, RpcError};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Divergence {
    pub height: u64,
    pub local_hash: Option<String>,
    pub reference_hash: Option<String>,
}

impl Divergence {
    /// True only when both hashes are known and differ.
    pub fn requires_hard_reset(&self) -> bool {
        matches!(
            (&self.local_hash, &self.reference_hash),
            (Some(local), Some(reference)) if local != reference
        )
    }
}

/// Compare the block at `height` between the local node and `reference`.
pub async fn check_divergence(
    chain: &dyn ChainQuery,
    local_endpoint: &str,
    reference_endpoint: &str,
    height: u64,
) -> Result<Divergence, RpcError> {
    let reference_hash = chain
        .block_by_number(reference_endpoint, height)
        .await?
        .and_then(|b| b.hash);
    let local_hash = chain
        .block_by_number(local_endpoint, height)
        .await?
        .and_then(|b| b.hash);

    let divergence = Divergence {
        height,
        local_hash,
        reference_hash,
    };
    debug!(
        height,
        local = ?divergence.local_hash,
        reference = ?divergence.reference_hash,
        "Compared fingerprint block"
    );
    Ok(divergence)
}
