use std::sync::Arc;

use env_config::NodePaths;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::trace;

/// Shared on-disk state of the node container: the node directory with its
/// bootstrap script and logs, the CLI directory with key files, and the
/// passphrase files.
///
/// One lock serializes everything that mutates those files or runs a
/// subprocess which depends on them. Cloning shares the lock.
#[derive(Clone, Debug)]
pub struct Workspace {
    paths: Arc<NodePaths>,
    lock: Arc<Mutex<()>>,
}

/// Critical section over the [`Workspace`]; released when dropped.
#[derive(Debug)]
pub struct WorkspaceGuard {
    _guard: OwnedMutexGuard<()>,
}

impl Drop for WorkspaceGuard {
    fn drop(&mut self) {
        trace!("workspace lock released");
    }
}

impl Workspace {
    pub fn new(paths: NodePaths) -> Self {
        Self {
            paths: Arc::new(paths),
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn paths(&self) -> &NodePaths {
        &self.paths
    }

    pub async fn lock(&self) -> WorkspaceGuard {
        let guard = self.lock.clone().lock_owned().await;
        trace!("workspace lock acquired");
        WorkspaceGuard { _guard: guard }
    }

    pub fn is_locked(&self) -> bool {
        self.lock.try_lock().is_err()
    }
}
