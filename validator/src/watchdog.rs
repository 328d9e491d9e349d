use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::StakingError;
use crate::staking::StakingClient;

/// EPOS status fragments meaning the validator dropped out and must be
/// re-activated.
pub const INACTIVE_SENTINELS: [&str; 2] = ["not eligible", "not signing"];

pub fn is_inactive(epos_status: &str) -> bool {
    INACTIVE_SENTINELS
        .iter()
        .any(|sentinel| epos_status.contains(sentinel))
}

/// EPOS Activation Watchdog.
///
/// Stateless: every call with an inactive status sends a new activation
/// transaction, so calling it each cycle keeps retrying until the chain
/// reports the validator active again.
pub struct EposWatchdog {
    staking: Arc<dyn StakingClient>,
}

impl EposWatchdog {
    pub fn new(staking: Arc<dyn StakingClient>) -> Self {
        Self { staking }
    }

    /// Returns whether an activation transaction was sent.
    pub async fn reconcile(&self, address: &str, epos_status: &str) -> Result<bool, StakingError> {
        if !is_inactive(epos_status) {
            debug!(%address, epos_status, "Validator active");
            return Ok(false);
        }
        warn!(%address, epos_status, "Node not active, reactivating...");
        let response = self.staking.activate(address).await?;
        debug!(%response, "Activation transaction sent");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("currently elected", false)]
    #[case("eligible to be elected next epoch", false)]
    #[case("not eligible to be elected next epoch", true)]
    #[case("currently elected, not signing", true)]
    #[case("", false)]
    fn test_inactive_sentinels(#[case] status: &str, #[case] inactive: bool) {
        assert_eq!(is_inactive(status), inactive);
    }
}
