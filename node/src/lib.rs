//! Supervision of the local node process: launching it, waiting until it is
//! live and synced, and detecting when its chain history has forked away
//! from the reference network.

pub mod error;
pub mod fork;
pub mod monitor;
pub mod poll;
pub mod states;
pub mod supervisor;
pub mod workspace;

pub use error::{Cancelled, MonitorError, SupervisorError};
pub use fork::{check_divergence, Divergence};
pub use monitor::SyncMonitor;
pub use states::{SyncState, SyncStatus};
pub use supervisor::{LaunchOptions, NodeProcessHandle, NodeSupervisor, ScriptSupervisor};
pub use workspace::{Workspace, WorkspaceGuard};
