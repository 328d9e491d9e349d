use std::path::{Path, PathBuf};
use std::process::Stdio;

use env_config::{Network, NodePaths, NODE_BINARY_NAME, NODE_SCRIPT_SOURCE};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::error::SupervisorError;
use crate::workspace::Workspace;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchOptions {
    pub network: Network,
    /// Directory handed to `node.sh -f` as the foreground keystore.
    pub bls_key_dir: PathBuf,
    /// Wipe the node database before starting.
    pub clean: bool,
}

/// The currently running node. A restart replaces the handle, it is never
/// reused.
#[derive(Debug)]
pub struct NodeProcessHandle {
    pub pid: Option<u32>,
    pub stdout_log: PathBuf,
    pub stderr_log: PathBuf,
    pub working_dir: PathBuf,
    child: Option<Child>,
}

impl NodeProcessHandle {
    /// Handle for a process this supervisor did not spawn itself.
    pub fn detached(pid: Option<u32>, paths: &NodePaths) -> Self {
        Self {
            pid,
            stdout_log: paths.node_stdout_log.clone(),
            stderr_log: paths.node_stderr_log.clone(),
            working_dir: paths.node_dir.clone(),
            child: None,
        }
    }
}

/// Owns the node process lifecycle.
#[async_trait::async_trait]
pub trait NodeSupervisor: Send + Sync {
    async fn start(
        &self,
        workspace: &Workspace,
        options: &LaunchOptions,
    ) -> Result<NodeProcessHandle, SupervisorError>;

    /// Forcefully stop `handle` and sweep any stray node processes.
    async fn terminate(&self, handle: NodeProcessHandle);

    /// Best-effort stop of every node process, used on shutdown.
    async fn terminate_all(&self);
}

/// Launches the node through the upstream `node.sh` bootstrap script.
pub struct ScriptSupervisor {
    http: reqwest::Client,
    script_source: String,
    binary_name: String,
}

impl ScriptSupervisor {
    pub fn new(http: reqwest::Client) -> Self {
        Self {
            http,
            script_source: NODE_SCRIPT_SOURCE.to_string(),
            binary_name: NODE_BINARY_NAME.to_string(),
        }
    }

    pub fn with_script_source(mut self, url: impl Into<String>) -> Self {
        self.script_source = url.into();
        self
    }

    pub fn with_binary_name(mut self, name: impl Into<String>) -> Self {
        self.binary_name = name.into();
        self
    }

    async fn fetch_script(&self) -> Result<String, SupervisorError> {
        let fetch_err = |source: reqwest::Error| SupervisorError::BootstrapFetch {
            url: self.script_source.clone(),
            source,
        };
        let response = self
            .http
            .get(&self.script_source)
            .send()
            .await
            .map_err(fetch_err)?;
        let status = response.status();
        if !status.is_success() {
            return Err(SupervisorError::BootstrapStatus {
                url: self.script_source.clone(),
                status: status.as_u16(),
            });
        }
        response.text().await.map_err(fetch_err)
    }

    /// Write the patched script and open the log files. Runs under the
    /// workspace lock.
    async fn prepare(
        &self,
        paths: &NodePaths,
    ) -> Result<(std::fs::File, std::fs::File), SupervisorError> {
        let script_path = paths.node_script();
        if script_path.exists() {
            tokio::fs::remove_file(&script_path)
                .await
                .map_err(io_err("removing", &script_path))?;
        }

        let script = self.fetch_script().await?;
        tokio::fs::write(&script_path, patch_node_script(&script))
            .await
            .map_err(io_err("writing", &script_path))?;
        make_executable(&script_path)?;

        for log in [&paths.node_stdout_log, &paths.node_stderr_log] {
            if let Some(dir) = log.parent() {
                tokio::fs::create_dir_all(dir)
                    .await
                    .map_err(io_err("creating", dir))?;
            }
        }
        let stdout = std::fs::File::create(&paths.node_stdout_log)
            .map_err(io_err("opening", &paths.node_stdout_log))?;
        let stderr = std::fs::File::create(&paths.node_stderr_log)
            .map_err(io_err("opening", &paths.node_stderr_log))?;
        Ok((stdout, stderr))
    }

    async fn sweep(&self, signal: Option<&str>) {
        let mut killall = Command::new("killall");
        if let Some(signal) = signal {
            killall.arg(signal);
        }
        killall
            .arg(&self.binary_name)
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        match killall.status().await {
            Ok(status) => debug!(binary = %self.binary_name, ?status, "Swept node processes"),
            Err(e) => warn!(binary = %self.binary_name, error = %e, "killall failed"),
        }
    }
}

#[async_trait::async_trait]
impl NodeSupervisor for ScriptSupervisor {
    async fn start(
        &self,
        workspace: &Workspace,
        options: &LaunchOptions,
    ) -> Result<NodeProcessHandle, SupervisorError> {
        let paths = workspace.paths();
        let guard = workspace.lock().await;
        let (stdout, stderr) = self.prepare(paths).await?;
        let args = node_args(options);
        info!(network = %options.network, clean = options.clean, "Starting node");
        // The node runs for as long as we supervise it; do not hold the lock
        // across its lifetime.
        drop(guard);

        let child = Command::new(paths.node_script())
            .args(&args)
            .current_dir(&paths.node_dir)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr)
            .spawn()
            .map_err(SupervisorError::Spawn)?;

        let pid = child.id();
        info!(?pid, stdout = ?paths.node_stdout_log, "Node process spawned");
        Ok(NodeProcessHandle {
            pid,
            stdout_log: paths.node_stdout_log.clone(),
            stderr_log: paths.node_stderr_log.clone(),
            working_dir: paths.node_dir.clone(),
            child: Some(child),
        })
    }

    async fn terminate(&self, handle: NodeProcessHandle) {
        match (handle.child, handle.pid) {
            (Some(mut child), pid) => {
                if let Err(e) = child.kill().await {
                    warn!(?pid, error = %e, "Failed to kill node process");
                }
            }
            (None, Some(pid)) => {
                let status = Command::new("kill")
                    .arg("-9")
                    .arg(pid.to_string())
                    .stdout(Stdio::null())
                    .stderr(Stdio::null())
                    .status()
                    .await;
                if let Err(e) = status {
                    warn!(pid, error = %e, "Failed to kill node process");
                }
            }
            (None, None) => {}
        }
        // node.sh may have forked the real binary; make sure nothing survives.
        self.sweep(Some("-9")).await;
        info!(pid = ?handle.pid, "Node terminated");
    }

    async fn terminate_all(&self) {
        info!("Killing all node processes...");
        self.sweep(None).await;
    }
}

/// Adapt the upstream bootstrap script to unattended container use:
/// passphrase files are always persisted and no privilege elevation is
/// attempted.
pub fn patch_node_script(script: &str) -> String {
    script
        .replace("save_pass_file=false", "save_pass_file=true")
        .replace("sudo", "")
}

pub fn node_args(options: &LaunchOptions) -> Vec<String> {
    let mut args = vec![
        "-N".to_string(),
        options.network.as_str().to_string(),
        "-z".to_string(),
        "-f".to_string(),
        options.bls_key_dir.display().to_string(),
        "-M".to_string(),
    ];
    if options.clean {
        args.push("-c".to_string());
    }
    args
}

fn io_err<'a>(
    action: &'static str,
    path: &'a Path,
) -> impl FnOnce(std::io::Error) -> SupervisorError + 'a {
    move |source| SupervisorError::Io {
        action,
        path: path.to_path_buf(),
        source,
    }
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<(), SupervisorError> {
    use std::os::unix::fs::PermissionsExt;

    let mut permissions = std::fs::metadata(path)
        .map_err(io_err("inspecting", path))?
        .permissions();
    permissions.set_mode(permissions.mode() | 0o111);
    std::fs::set_permissions(path, permissions).map_err(io_err("chmod", path))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<(), SupervisorError> {
    Ok(())
}
