//! Cancellable waiting.
//!
//! The supervisory waits (liveliness, sync, staking epoch) are unbounded:
//! when the network is not ready the right move is to keep waiting. They
//! still must stop when the operator interrupts the process, so every sleep
//! goes through [`pause`].

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::Cancelled;

/// Sleep for `period`, returning early with [`Cancelled`] once `cancel` fires.
pub async fn pause(cancel: &CancellationToken, period: Duration) -> Result<(), Cancelled> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Cancelled),
        _ = tokio::time::sleep(period) => Ok(()),
    }
}

pub fn check(cancel: &CancellationToken) -> Result<(), Cancelled> {
    if cancel.is_cancelled() {
        Err(Cancelled)
    } else {
        Ok(())
    }
}
