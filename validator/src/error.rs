use std::path::PathBuf;
use std::time::Duration;

use chain::RpcError;
use node::{Cancelled, MonitorError};
use thiserror::Error;

use crate::interact::Prompt;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading validator config {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing validator config {path:?}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Failure of the scripted prompt/response exchange with an interactive
/// CLI call.
#[derive(Debug, Error)]
pub enum InteractError {
    #[error("output ended after {answered} answered prompt(s) while waiting for {expected:?}")]
    UnexpectedEof {
        expected: Prompt,
        answered: usize,
        output: String,
    },

    #[error("unexpected {prompt:?} prompt after all expected prompts were answered")]
    UnexpectedPrompt { prompt: Prompt, output: String },

    #[error("interactive call did not finish within {0:?}")]
    TimedOut(Duration),

    #[error("terminal i/o: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum StakingError {
    #[error("failed to run {binary:?}: {source}")]
    Spawn {
        binary: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("malformed output of `{command}`: {source}")]
    Decode {
        command: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("pseudo-terminal: {0}")]
    Pty(String),

    #[error(transparent)]
    Interaction(#[from] InteractError),
}

#[derive(Debug, Error)]
pub enum KeyError {
    #[error(transparent)]
    Staking(#[from] StakingError),

    #[error("{action} {path:?}: {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot use validator {0}: address is not in the shared CLI keystore")]
    AddressNotInKeystore(String),

    #[error("shared CLI keystore has no wallets")]
    EmptyKeystore,

    #[error("could not import any BLS key")]
    NoUsableKeys,

    #[error("reading passphrase: {0}")]
    Prompt(#[source] std::io::Error),
}

#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error(transparent)]
    Staking(#[from] StakingError),

    #[error(transparent)]
    Rpc(#[from] RpcError),

    #[error(transparent)]
    Monitor(#[from] MonitorError),
}

impl RegistrationError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RegistrationError::Monitor(MonitorError::Cancelled(_)))
    }
}

impl From<Cancelled> for RegistrationError {
    fn from(cancelled: Cancelled) -> Self {
        RegistrationError::Monitor(MonitorError::Cancelled(cancelled))
    }
}
