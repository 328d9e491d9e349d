use std::net::IpAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use auto_node::{
    AutoConfirm, Collaborators, Confirm, Orchestrator, OrchestratorOptions, StdinConfirm,
};
use chain::config::{PollConfig, RPC_TIMEOUT_SECS};
use chain::RpcClient;
use clap::Parser;
use env_config::{Network, NodePaths};
use metrics::server::{run_metrics_server, MetricsServerConfig};
use metrics::Metrics;
use node::{NodeSupervisor, ScriptSupervisor, Workspace};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use validator::{HmyCli, KeyManager, PassphraseSource, ValidatorConfig};

/// Run a Harmony node & validator automagically.
#[derive(Parser, Debug)]
#[command(name = "auto_node")]
struct Args {
    /// Always try to set active when EPOS status is inactive.
    #[arg(long)]
    auto_active: bool,

    /// Automatically reset node during hard resets.
    #[arg(long)]
    auto_reset: bool,

    /// Say yes to all interaction (except wallet passphrase).
    #[arg(long)]
    auto_interaction: bool,

    /// Clean shared node directory before starting node.
    #[arg(long)]
    clean: bool,

    /// Enter the wallet passphrase interactively instead of using the CLI default.
    #[arg(long)]
    wallet_passphrase: bool,

    /// Passphrase of the validator's wallet. May be exposed on the host.
    #[arg(long)]
    wallet_passphrase_string: Option<String>,

    /// Enter the BLS key passphrase interactively instead of using the CLI default.
    #[arg(long)]
    bls_passphrase: bool,

    /// Passphrase of the validator's BLS keys. May be exposed on the host.
    #[arg(long)]
    bls_passphrase_string: Option<String>,

    /// Shard of the generated BLS key. Ignored when BLS keys are provided.
    #[arg(long)]
    shard: Option<u32>,

    /// Network to connect to (staking, partner, stress).
    #[arg(long, default_value_t = Network::Staking)]
    network: Network,

    /// How long the node is to run, in seconds. Default is forever.
    #[arg(long)]
    duration: Option<u64>,

    /// Beacon chain (shard 0) endpoint for staking transactions. Defaults to
    /// the network's public endpoint.
    #[arg(long)]
    beacon_endpoint: Option<String>,

    #[arg(long, default_value = "./node/validator_config.json")]
    validator_config: PathBuf,

    /// Path of the staking CLI binary.
    #[arg(long, default_value = "/root/bin/hmy")]
    hmy: PathBuf,

    #[arg(long, default_value = "127.0.0.1")]
    metrics_address: IpAddr,

    /// Serve prometheus metrics on this port.
    #[arg(long)]
    metrics_port: Option<u16>,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => interrupt.cancel(),
            Err(e) => warn!(error = %e, "Cannot listen for interrupts"),
        }
    });

    let paths = NodePaths::default();
    let supervisor: Arc<dyn NodeSupervisor> =
        Arc::new(ScriptSupervisor::new(reqwest::Client::new()));
    let metrics = match Metrics::new() {
        Ok(metrics) => Arc::new(metrics),
        Err(e) => {
            error!(error = %e, "Failed to register metrics");
            return ExitCode::FAILURE;
        }
    };

    let built = build(&args, paths, supervisor.clone(), metrics.clone(), cancel.clone());
    let orchestrator = match built {
        Ok(orchestrator) => orchestrator,
        Err(e) => {
            error!("Auto node setup failed: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    if let Some(port) = args.metrics_port {
        let config = MetricsServerConfig {
            metrics_address: args.metrics_address,
            metrics_port: port,
        };
        let shutdown = cancel.clone();
        tokio::spawn(async move {
            if let Err(e) = run_metrics_server(config, metrics, shutdown).await {
                warn!(error = %e, "Metrics server stopped");
            }
        });
    }

    match orchestrator.run().await {
        Ok(()) => {
            info!("Auto node finished");
            cancel.cancel();
            ExitCode::SUCCESS
        }
        Err(e) if e.is_cancelled() => {
            info!("Killing all harmony processes...");
            supervisor.terminate_all().await;
            ExitCode::SUCCESS
        }
        Err(e) if e.is_fatal() => {
            error!(error = %e, "Auto node failed");
            ExitCode::FAILURE
        }
        Err(e) => {
            error!(error = %e, "Auto node failed with error");
            info!("Container still running; auto_node.sh commands will still work. Interrupt to exit.");
            cancel.cancelled().await;
            info!("Killing all harmony processes...");
            supervisor.terminate_all().await;
            ExitCode::SUCCESS
        }
    }
}

fn build(
    args: &Args,
    paths: NodePaths,
    supervisor: Arc<dyn NodeSupervisor>,
    metrics: Arc<Metrics>,
    cancel: CancellationToken,
) -> anyhow::Result<Orchestrator> {
    let config = ValidatorConfig::load_from_file(&args.validator_config)
        .with_context(|| format!("loading {:?}", args.validator_config))?;

    let beacon_endpoint = args
        .beacon_endpoint
        .clone()
        .unwrap_or_else(|| args.network.default_beacon_endpoint().to_string());
    let options = OrchestratorOptions {
        network: args.network,
        beacon_endpoint: beacon_endpoint.clone(),
        auto_active: args.auto_active,
        auto_reset: args.auto_reset,
        auto_interaction: args.auto_interaction,
        clean: args.clean,
        duration: args.duration.map(Duration::from_secs),
        poll: PollConfig::default(),
    };
    info!(
        network = %options.network,
        beacon = %options.beacon_endpoint,
        auto_active = options.auto_active,
        auto_reset = options.auto_reset,
        auto_interaction = options.auto_interaction,
        "Starting auto node"
    );

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(RPC_TIMEOUT_SECS))
        .build()
        .context("building HTTP client")?;
    let chain = Arc::new(RpcClient::with_client(http));
    let staking = Arc::new(HmyCli::new(&args.hmy, beacon_endpoint, &paths));
    let provisioner = KeyManager::new(staking.clone(), paths.clone())
        .with_address(config.validator_addr.clone())
        .with_passphrases(
            PassphraseSource::from_flags(
                args.wallet_passphrase,
                args.wallet_passphrase_string.clone(),
            ),
            PassphraseSource::from_flags(args.bls_passphrase, args.bls_passphrase_string.clone()),
        )
        .with_shard(args.shard);
    let confirm: Arc<dyn Confirm> = if args.auto_interaction {
        Arc::new(AutoConfirm)
    } else {
        Arc::new(StdinConfirm)
    };

    Ok(Orchestrator::new(
        options,
        config,
        Workspace::new(paths),
        Collaborators {
            chain,
            staking,
            supervisor,
            provisioner: Arc::new(provisioner),
            confirm,
        },
        metrics,
        cancel,
    ))
}
