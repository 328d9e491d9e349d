pub mod server;

use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    // Sync
    local_shard_epoch: IntGauge,
    local_beacon_epoch: IntGauge,
    reference_epoch: IntGauge,
    local_block_height: IntGauge,
    // Node lifecycle
    node_starts: IntCounter,
    hard_resets: IntCounter,
    // Validator
    validator_registered: IntGauge,
    activation_transactions: IntCounter,
    // Monitoring loop
    monitoring_cycles: IntCounter,
    cycle_errors: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let local_shard_epoch = IntGauge::with_opts(Opts::new(
            "auto_node_local_shard_epoch",
            "Shard chain epoch reported by the local node",
        ))?;
        registry.register(Box::new(local_shard_epoch.clone()))?;

        let local_beacon_epoch = IntGauge::with_opts(Opts::new(
            "auto_node_local_beacon_epoch",
            "Beacon chain epoch reported by the local node",
        ))?;
        registry.register(Box::new(local_beacon_epoch.clone()))?;

        let reference_epoch = IntGauge::with_opts(Opts::new(
            "auto_node_reference_epoch",
            "Epoch reported by the reference endpoint",
        ))?;
        registry.register(Box::new(reference_epoch.clone()))?;

        let local_block_height = IntGauge::with_opts(Opts::new(
            "auto_node_local_block_height",
            "Latest block number of the local node",
        ))?;
        registry.register(Box::new(local_block_height.clone()))?;

        let node_starts = IntCounter::with_opts(Opts::new(
            "auto_node_node_starts_total",
            "Total number of node process launches",
        ))?;
        registry.register(Box::new(node_starts.clone()))?;

        let hard_resets = IntCounter::with_opts(Opts::new(
            "auto_node_hard_resets_total",
            "Total number of hard resets after chain divergence",
        ))?;
        registry.register(Box::new(hard_resets.clone()))?;

        let validator_registered = IntGauge::with_opts(Opts::new(
            "auto_node_validator_registered",
            "1 once the validator address has been seen on chain",
        ))?;
        registry.register(Box::new(validator_registered.clone()))?;

        let activation_transactions = IntCounter::with_opts(Opts::new(
            "auto_node_activation_transactions_total",
            "Total number of edit-validator --active transactions sent",
        ))?;
        registry.register(Box::new(activation_transactions.clone()))?;

        let monitoring_cycles = IntCounter::with_opts(Opts::new(
            "auto_node_monitoring_cycles_total",
            "Total number of completed monitoring cycles",
        ))?;
        registry.register(Box::new(monitoring_cycles.clone()))?;

        let cycle_errors = IntCounterVec::new(
            Opts::new(
                "auto_node_cycle_errors_total",
                "Total number of recoverable monitoring cycle errors",
            ),
            &["kind"],
        )?;
        registry.register(Box::new(cycle_errors.clone()))?;

        Ok(Self {
            registry,
            local_shard_epoch,
            local_beacon_epoch,
            reference_epoch,
            local_block_height,
            node_starts,
            hard_resets,
            validator_registered,
            activation_transactions,
            monitoring_cycles,
            cycle_errors,
        })
    }

    pub fn gather(&self) -> Result<String, prometheus::Error> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::<u8>::new();
        TextEncoder::new().encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }

    // Sync
    pub fn set_sync_epochs(&self, shard: u64, beacon: u64, reference: u64) {
        self.local_shard_epoch.set(gauge(shard));
        self.local_beacon_epoch.set(gauge(beacon));
        self.reference_epoch.set(gauge(reference));
    }

    pub fn set_local_block_height(&self, height: u64) {
        self.local_block_height.set(gauge(height));
    }

    // Node lifecycle
    pub fn inc_node_starts(&self) {
        self.node_starts.inc();
    }

    pub fn inc_hard_resets(&self) {
        self.hard_resets.inc();
    }

    // Validator
    pub fn set_validator_registered(&self, registered: bool) {
        self.validator_registered.set(i64::from(registered));
    }

    pub fn inc_activation_transactions(&self) {
        self.activation_transactions.inc();
    }

    // Monitoring loop
    pub fn inc_monitoring_cycles(&self) {
        self.monitoring_cycles.inc();
    }

    pub fn inc_cycle_errors(&self, kind: &str) {
        self.cycle_errors.with_label_values(&[kind]).inc();
    }
}

fn gauge(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
