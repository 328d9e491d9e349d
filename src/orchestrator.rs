//! Lifecycle Orchestrator Loop.
//!
//! Provisions the validator identity, launches the node, drives
//! registration, then runs the timed monitoring cycle: fork check (with hard
//! reset), validator status narration and the EPOS watchdog, all under the
//! workspace lock.

use std::sync::Arc;
use std::time::Duration;

use chain::config::PollConfig;
use chain::ChainQuery;
use env_config::{Network, LOCAL_ENDPOINT};
use metrics::Metrics;
use node::poll::{check, pause};
use node::{
    check_divergence, Cancelled, Divergence, LaunchOptions, NodeProcessHandle, NodeSupervisor,
    SyncMonitor, Workspace,
};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use validator::{
    EposWatchdog, KeyProvisioner, NodeIdentity, Registrar, StakingClient, ValidatorConfig,
};

use crate::confirm::Confirm;
use crate::error::OrchestratorError;
use crate::shared_files::{write_shared_info, SharedInfo};

#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    pub network: Network,
    /// Shard 0 endpoint: staking transactions and the sync reference.
    pub beacon_endpoint: String,
    /// Re-activate the validator when EPOS reports it inactive.
    pub auto_active: bool,
    /// Hard reset the node when its chain history diverges.
    pub auto_reset: bool,
    /// Skip the operator confirmation before registration.
    pub auto_interaction: bool,
    /// Wipe the node database on the first start.
    pub clean: bool,
    /// How long to keep monitoring; `None` is forever.
    pub duration: Option<Duration>,
    pub poll: PollConfig,
}

impl OrchestratorOptions {
    pub fn new(network: Network) -> Self {
        Self {
            network,
            beacon_endpoint: network.default_beacon_endpoint().to_string(),
            auto_active: false,
            auto_reset: false,
            auto_interaction: false,
            clean: false,
            duration: None,
            poll: PollConfig::default(),
        }
    }
}

/// External services the orchestrator drives.
#[derive(Clone)]
pub struct Collaborators {
    pub chain: Arc<dyn ChainQuery>,
    pub staking: Arc<dyn StakingClient>,
    pub supervisor: Arc<dyn NodeSupervisor>,
    pub provisioner: Arc<dyn KeyProvisioner>,
    pub confirm: Arc<dyn Confirm>,
}

pub struct Orchestrator {
    options: OrchestratorOptions,
    config: ValidatorConfig,
    workspace: Workspace,
    collaborators: Collaborators,
    metrics: Arc<Metrics>,
    cancel: CancellationToken,
}

/// State owned by one run of the loop.
struct Lifecycle {
    identity: NodeIdentity,
    shard_endpoint: String,
    node: Option<NodeProcessHandle>,
    registrar: Registrar,
    monitor: SyncMonitor,
    watchdog: EposWatchdog,
}

impl Orchestrator {
    pub fn new(
        options: OrchestratorOptions,
        config: ValidatorConfig,
        workspace: Workspace,
        collaborators: Collaborators,
        metrics: Arc<Metrics>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            options,
            config,
            workspace,
            collaborators,
            metrics,
            cancel,
        }
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Run until the configured duration elapses. Recoverable cycle errors
    /// are logged and never end the run; setup errors and cancellation do.
    pub async fn run(&self) -> Result<(), OrchestratorError> {
        let mut lifecycle = self.prepare().await?;
        let started = Instant::now();

        lifecycle.node = Some(self.launch(self.options.clean).await?);
        self.setup_validator(&mut lifecycle.registrar).await?;
        lifecycle.monitor.wait_for_liveliness().await?;
        let height = lifecycle.monitor.wait_for_first_block().await?;
        self.metrics.set_local_block_height(height);

        while self.within_duration(started) {
            check(&self.cancel)?;
            match self.cycle(&mut lifecycle).await {
                Ok(()) => self.metrics.inc_monitoring_cycles(),
                Err(e) if e.is_cancelled() => return Err(e),
                Err(e) => {
                    warn!(error = %e, kind = e.kind(), "Error when checking validator");
                    self.metrics.inc_cycle_errors(e.kind());
                    pause(&self.cancel, self.options.poll.block_time).await?;
                }
            }
        }

        info!(elapsed = ?started.elapsed(), "Run duration reached, stopping node");
        if let Some(node) = lifecycle.node.take() {
            self.collaborators.supervisor.terminate(node).await;
        }
        Ok(())
    }

    /// Identity, shared info files and the home shard endpoint.
    async fn prepare(&self) -> Result<Lifecycle, OrchestratorError> {
        let Collaborators {
            chain,
            staking,
            provisioner,
            ..
        } = &self.collaborators;

        // passphrase prompts may be waiting on the operator
        let identity = tokio::select! {
            identity = provisioner.provision() => identity?,
            () = self.cancel.cancelled() => return Err(Cancelled.into()),
        };
        write_shared_info(
            self.workspace.paths(),
            &SharedInfo {
                identity: &identity,
                network: self.options.network,
                beacon_endpoint: &self.options.beacon_endpoint,
                duration: self.options.duration,
            },
        )
        .await?;

        let first_key = identity.bls_keys.first().ok_or(OrchestratorError::NoBlsKeys)?;
        let shard = staking.shard_for_bls(first_key).await?;
        let shard_endpoint = chain
            .shard_endpoint(&self.options.beacon_endpoint, shard)
            .await?;
        info!(shard, endpoint = %shard_endpoint, "Resolved home shard");

        let monitor = SyncMonitor::new(
            chain.clone(),
            LOCAL_ENDPOINT,
            self.options.poll.clone(),
            self.cancel.clone(),
        );
        let registrar = Registrar::new(
            staking.clone(),
            chain.clone(),
            monitor.clone(),
            self.workspace.clone(),
            self.config.clone().with_address(identity.address.clone()),
            identity.clone(),
            self.options.beacon_endpoint.clone(),
            self.options.poll.clone(),
        );
        Ok(Lifecycle {
            identity,
            shard_endpoint,
            node: None,
            registrar,
            monitor,
            watchdog: EposWatchdog::new(staking.clone()),
        })
    }

    fn within_duration(&self, started: Instant) -> bool {
        self.options
            .duration
            .map_or(true, |duration| started.elapsed() < duration)
    }

    async fn launch(&self, clean: bool) -> Result<NodeProcessHandle, OrchestratorError> {
        let options = LaunchOptions {
            network: self.options.network,
            bls_key_dir: self.workspace.paths().bls_key_dir.clone(),
            clean,
        };
        let node = self
            .collaborators
            .supervisor
            .start(&self.workspace, &options)
            .await?;
        self.metrics.inc_node_starts();
        Ok(node)
    }

    /// Plan registration, ask the operator if needed, execute. Transaction
    /// and query failures are logged; only cancellation propagates.
    async fn setup_validator(&self, registrar: &mut Registrar) -> Result<(), OrchestratorError> {
        info!(config = ?self.config, "Validator config");
        let plan = match registrar.plan().await {
            Ok(plan) => plan,
            Err(e) if e.is_cancelled() => return Err(e.into()),
            Err(e) => {
                warn!(error = %e, "Could not determine validator registration");
                return Ok(());
            }
        };

        let approved = self.options.auto_interaction || self.ask(plan.question()).await?;
        if !approved {
            info!(?plan, "Validator setup skipped by operator");
        } else {
            match registrar.execute(plan).await {
                Ok(outcome) => {
                    info!(?outcome, state = ?registrar.state(), "Validator setup finished")
                }
                Err(e) if e.is_cancelled() => return Err(e.into()),
                Err(e) => warn!(error = %e, "Validator setup failed"),
            }
        }
        self.metrics
            .set_validator_registered(registrar.state().is_on_chain());
        Ok(())
    }

    /// Operator confirmation; an interrupt while the question is open
    /// cancels the run.
    async fn ask(&self, question: &str) -> Result<bool, OrchestratorError> {
        tokio::select! {
            answer = self.collaborators.confirm.confirm(question) => Ok(answer),
            () = self.cancel.cancelled() => Err(Cancelled.into()),
        }
    }

    /// One monitoring cycle; the workspace lock is held throughout except
    /// while a hard reset runs.
    async fn cycle(&self, lifecycle: &mut Lifecycle) -> Result<(), OrchestratorError> {
        let chain = &self.collaborators.chain;
        let beacon = self.options.beacon_endpoint.as_str();

        let mut guard = self.workspace.lock().await;
        let divergence = check_divergence(
            &**chain,
            LOCAL_ENDPOINT,
            &lifecycle.shard_endpoint,
            self.options.poll.fingerprint_height,
        )
        .await?;
        if divergence.requires_hard_reset() {
            if self.options.auto_reset {
                drop(guard);
                self.hard_reset(lifecycle, &divergence).await?;
                guard = self.workspace.lock().await;
            } else {
                warn!(
                    local = ?divergence.local_hash,
                    reference = ?divergence.reference_hash,
                    "Chain history diverged from the shard endpoint, auto reset disabled"
                );
            }
        }

        let address = lifecycle.identity.address.as_str();
        let info = chain.validator_information(beacon, address).await?;
        info!(epos_status = %info.epos_status, "EPOS status");
        info!(performance = %info.current_epoch_performance, "Current epoch performance");

        let headers = chain.latest_headers(LOCAL_ENDPOINT).await?;
        let reference_epoch = chain.current_epoch(beacon).await?;
        info!(
            at = %chrono::Utc::now(),
            shard_block = headers.shard_chain_header.block_number,
            shard_epoch = headers.shard_chain_header.epoch,
            beacon_block = headers.beacon_chain_header.block_number,
            beacon_epoch = headers.beacon_chain_header.epoch,
            reference_epoch,
            "This node's latest header"
        );
        self.metrics.set_sync_epochs(
            headers.shard_chain_header.epoch,
            headers.beacon_chain_header.epoch,
            reference_epoch,
        );
        self.metrics
            .set_local_block_height(headers.shard_chain_header.block_number);

        if self.options.auto_active {
            let activated = lifecycle.watchdog.reconcile(address, &info.epos_status).await?;
            if activated {
                self.metrics.inc_activation_transactions();
            }
        }

        pause(&self.cancel, self.options.poll.block_time).await?;
        drop(guard);
        Ok(())
    }

    /// Kill the node, wait out the cool-down and bring up a clean one, fully
    /// live and synced before monitoring resumes.
    async fn hard_reset(
        &self,
        lifecycle: &mut Lifecycle,
        divergence: &Divergence,
    ) -> Result<(), OrchestratorError> {
        warn!(
            height = divergence.height,
            local = ?divergence.local_hash,
            reference = ?divergence.reference_hash,
            "== HARD RESETTING NODE =="
        );
        self.metrics.inc_hard_resets();

        let node = lifecycle
            .node
            .take()
            .unwrap_or_else(|| NodeProcessHandle::detached(None, self.workspace.paths()));
        self.collaborators.supervisor.terminate(node).await;
        pause(&self.cancel, self.options.poll.hard_reset_cooldown).await?;

        lifecycle.node = Some(self.launch(true).await?);
        self.setup_validator(&mut lifecycle.registrar).await?;

        // monitoring must never see a half-started node
        let height = loop {
            match self.recover(&lifecycle.monitor).await {
                Ok(height) => break height,
                Err(e) if e.is_cancelled() => return Err(e),
                Err(e) => {
                    warn!(error = %e, "Node not back yet after hard reset, retrying");
                    pause(&self.cancel, self.options.poll.block_time).await?;
                }
            }
        };
        self.metrics.set_local_block_height(height);
        info!(height, "Node back after hard reset");
        Ok(())
    }

    async fn recover(&self, monitor: &SyncMonitor) -> Result<u64, OrchestratorError> {
        monitor.wait_for_liveliness().await?;
        monitor.verify_sync(&self.options.beacon_endpoint).await?;
        Ok(monitor.wait_for_first_block().await?)
    }
}
