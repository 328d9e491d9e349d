use std::path::PathBuf;

use chain::RpcError;
use thiserror::Error;

/// The operator asked the process to stop while it was waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("operation cancelled")]
pub struct Cancelled;

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("unable to fetch node bootstrap script from {url}: {source}")]
    BootstrapFetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("node bootstrap script source {url} answered HTTP {status}")]
    BootstrapStatus { url: String, status: u16 },

    #[error("{action} {path:?}: {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to launch node: {0}")]
    Spawn(#[source] std::io::Error),
}

impl SupervisorError {
    /// Without the bootstrap script no node can ever be started.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SupervisorError::BootstrapFetch { .. } | SupervisorError::BootstrapStatus { .. }
        )
    }
}

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error(transparent)]
    Rpc(#[from] RpcError),

    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}
