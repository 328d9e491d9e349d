use std::path::PathBuf;

use chain::RpcError;
use node::{Cancelled, MonitorError, SupervisorError};
use thiserror::Error;
use validator::{KeyError, RegistrationError, StakingError};

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("key provisioning failed: {0}")]
    Keys(#[from] KeyError),

    #[error("writing shared info file {path:?}: {source}")]
    SharedFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no BLS key available to determine the home shard")]
    NoBlsKeys,

    #[error(transparent)]
    Supervisor(#[from] SupervisorError),

    #[error(transparent)]
    Monitor(#[from] MonitorError),

    #[error(transparent)]
    Rpc(#[from] RpcError),

    #[error(transparent)]
    Staking(#[from] StakingError),

    #[error(transparent)]
    Registration(#[from] RegistrationError),

    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}

impl OrchestratorError {
    /// Setup failures the process cannot recover from; it exits non-zero.
    pub fn is_fatal(&self) -> bool {
        match self {
            OrchestratorError::Keys(_)
            | OrchestratorError::SharedFile { .. }
            | OrchestratorError::NoBlsKeys => true,
            OrchestratorError::Supervisor(e) => e.is_fatal(),
            _ => false,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        match self {
            OrchestratorError::Cancelled(_) => true,
            OrchestratorError::Monitor(MonitorError::Cancelled(_)) => true,
            OrchestratorError::Registration(e) => e.is_cancelled(),
            _ => false,
        }
    }

    /// Label for the cycle error counter.
    pub fn kind(&self) -> &'static str {
        match self {
            OrchestratorError::Keys(_) => "keys",
            OrchestratorError::SharedFile { .. } => "shared_file",
            OrchestratorError::NoBlsKeys => "keys",
            OrchestratorError::Supervisor(_) => "supervisor",
            OrchestratorError::Monitor(_) => "monitor",
            OrchestratorError::Rpc(_) => "rpc",
            OrchestratorError::Staking(_) => "staking",
            OrchestratorError::Registration(_) => "registration",
            OrchestratorError::Cancelled(_) => "cancelled",
        }
    }
}
