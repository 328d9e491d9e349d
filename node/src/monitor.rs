use std::sync::Arc;

use chain::config::PollConfig;
use chain::{ChainQuery, RpcError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::MonitorError;
use crate::poll::{check, pause};
use crate::states::SyncStatus;

/// Watches the local node until it answers RPC and has caught up with a
/// reference endpoint.
///
/// None of the waits time out. A freshly started node may take arbitrarily
/// long to bind its RPC port or to sync, and giving up would only restart
/// the same wait. They return early only on cancellation.
#[derive(Clone)]
pub struct SyncMonitor {
    chain: Arc<dyn ChainQuery>,
    local_endpoint: String,
    poll: PollConfig,
    cancel: CancellationToken,
}

impl SyncMonitor {
    pub fn new(
        chain: Arc<dyn ChainQuery>,
        local_endpoint: impl Into<String>,
        poll: PollConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            chain,
            local_endpoint: local_endpoint.into(),
            poll,
            cancel,
        }
    }

    pub fn local_endpoint(&self) -> &str {
        &self.local_endpoint
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Poll the local header endpoint until it stops refusing connections.
    ///
    /// Transient failures are retried; an RPC-level error is returned to the
    /// caller.
    pub async fn wait_for_liveliness(&self) -> Result<(), MonitorError> {
        loop {
            check(&self.cancel)?;
            match self.chain.latest_headers(&self.local_endpoint).await {
                Ok(_) => break,
                Err(e) if e.is_connection_error() => {
                    debug!(endpoint = %self.local_endpoint, "Node RPC not reachable yet");
                    pause(&self.cancel, self.poll.liveliness_interval).await?;
                }
                Err(e) if e.is_transient() => {
                    warn!(
                        endpoint = %self.local_endpoint,
                        error = %e,
                        "Node RPC not answering yet"
                    );
                    pause(&self.cancel, self.poll.liveliness_interval).await?;
                }
                Err(e) => return Err(e.into()),
            }
        }
        info!(endpoint = %self.local_endpoint, "Node launched, RPC is live");
        Ok(())
    }

    pub async fn sync_status(&self, reference_endpoint: &str) -> Result<SyncStatus, RpcError> {
        let headers = self.chain.latest_headers(&self.local_endpoint).await?;
        let reference = self.chain.latest_header(reference_endpoint).await?;
        Ok(SyncStatus {
            shard_epoch: headers.shard_chain_header.epoch,
            beacon_epoch: headers.beacon_chain_header.epoch,
            reference_epoch: reference.epoch,
        })
    }

    /// Block until the local shard epoch, local beacon epoch and the
    /// reference epoch are all equal. A poll that fails transiently counts
    /// as not synced yet.
    pub async fn verify_sync(&self, reference_endpoint: &str) -> Result<SyncStatus, MonitorError> {
        info!("Verifying node sync...");
        self.wait_for_liveliness().await?;
        loop {
            check(&self.cancel)?;
            let status = match self.sync_status(reference_endpoint).await {
                Ok(status) => status,
                Err(e) if e.is_transient() => {
                    warn!(reference = %reference_endpoint, error = %e, "Sync status unavailable");
                    pause(&self.cancel, self.poll.sync_interval).await?;
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            if status.is_synced() {
                info!(epoch = status.reference_epoch, "Node synced to current epoch");
                return Ok(status);
            }
            info!(
                shard_epoch = status.shard_epoch,
                beacon_epoch = status.beacon_epoch,
                reference_epoch = status.reference_epoch,
                "Waiting for node to sync"
            );
            pause(&self.cancel, self.poll.sync_interval).await?;
        }
    }

    /// Spin until the local node reports a block past genesis.
    ///
    /// This phase is short right after liveliness, so it polls back to back
    /// and only yields to the runtime between requests. Transport errors are
    /// retried.
    pub async fn wait_for_first_block(&self) -> Result<u64, MonitorError> {
        loop {
            check(&self.cancel)?;
            match self.chain.latest_header(&self.local_endpoint).await {
                Ok(header) if header.block_number > 0 => {
                    info!(block = header.block_number, "Node is producing blocks");
                    return Ok(header.block_number);
                }
                Ok(_) => {}
                Err(e) => debug!(error = %e, "Latest header unavailable"),
            }
            tokio::task::yield_now().await;
        }
    }
}
