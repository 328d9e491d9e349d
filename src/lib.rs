//! Harmony validator node lifecycle orchestrator.

pub mod confirm;
pub mod error;
pub mod orchestrator;
pub mod shared_files;

pub use confirm::{AutoConfirm, Confirm, StdinConfirm};
pub use error::OrchestratorError;
pub use orchestrator::{Collaborators, Orchestrator, OrchestratorOptions};
