//! Validator Registration State Machine.
//!
//! ```text
//! Unregistered --create--> PendingCreate --observed on chain--> Registered
//!       \                        |
//!        \                       +--tx failed / no funds--> Unregistered
//!         \
//!          +--observed on chain--> Registered --missing keys--> PendingEdit --> Registered
//! ```
//!
//! Once the address has been seen in the on-chain validator set the machine
//! never goes back: every later plan is an edit.

use std::sync::Arc;

use chain::config::{PollConfig, GAS_FEE_MARGIN};
use chain::ChainQuery;
use node::poll::pause;
use node::{SyncMonitor, Workspace};
use tracing::{info, warn};

use crate::error::RegistrationError;
use crate::keys::NodeIdentity;
use crate::staking::StakingClient;
use crate::ValidatorConfig;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RegistrationState {
    #[default]
    Unregistered,
    /// A create-validator transaction was sent; waiting to see the address on
    /// chain.
    PendingCreate,
    /// Adding BLS keys to a validator that exists on chain.
    PendingEdit,
    Registered,
}

impl RegistrationState {
    pub fn is_on_chain(&self) -> bool {
        matches!(self, RegistrationState::PendingEdit | RegistrationState::Registered)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationPlan {
    Create,
    Edit,
}

impl RegistrationPlan {
    /// Question put to the operator before the plan runs.
    pub fn question(&self) -> &'static str {
        match self {
            RegistrationPlan::Create => "Create validator?",
            RegistrationPlan::Edit => "Add BLS key to existing validator?",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RegistrationOutcome {
    Created(serde_json::Value),
    KeysAdded { added: Vec<String>, failed: Vec<String> },
    InsufficientFunds { balance: f64, required: f64 },
    TransactionFailed(String),
    /// The operator said no.
    Declined,
}

pub struct Registrar {
    staking: Arc<dyn StakingClient>,
    chain: Arc<dyn ChainQuery>,
    monitor: SyncMonitor,
    workspace: Workspace,
    config: ValidatorConfig,
    identity: NodeIdentity,
    beacon_endpoint: String,
    poll: PollConfig,
    state: RegistrationState,
}

impl Registrar {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        staking: Arc<dyn StakingClient>,
        chain: Arc<dyn ChainQuery>,
        monitor: SyncMonitor,
        workspace: Workspace,
        config: ValidatorConfig,
        identity: NodeIdentity,
        beacon_endpoint: impl Into<String>,
        poll: PollConfig,
    ) -> Self {
        Self {
            staking,
            chain,
            monitor,
            workspace,
            config,
            identity,
            beacon_endpoint: beacon_endpoint.into(),
            poll,
            state: RegistrationState::Unregistered,
        }
    }

    pub fn state(&self) -> RegistrationState {
        self.state
    }

    pub fn address(&self) -> &str {
        &self.identity.address
    }

    /// Look the address up in the on-chain validator set and decide between
    /// create and edit.
    pub async fn plan(&mut self) -> Result<RegistrationPlan, RegistrationError> {
        let validators = self.staking.all_validators().await?;
        let listed = validators.iter().any(|v| v == &self.identity.address);

        if listed {
            if !self.state.is_on_chain() {
                info!(address = %self.identity.address, "Validator found on chain");
            }
            self.state = RegistrationState::Registered;
            return Ok(RegistrationPlan::Edit);
        }
        if self.state.is_on_chain() {
            warn!(
                address = %self.identity.address,
                "Validator missing from the validator list after being registered, not creating it again"
            );
            return Ok(RegistrationPlan::Edit);
        }
        Ok(RegistrationPlan::Create)
    }

    pub async fn execute(
        &mut self,
        plan: RegistrationPlan,
    ) -> Result<RegistrationOutcome, RegistrationError> {
        match plan {
            RegistrationPlan::Edit => self.add_missing_keys().await,
            RegistrationPlan::Create if self.state.is_on_chain() => {
                warn!(
                    address = %self.identity.address,
                    "Refusing to create a validator that is already on chain"
                );
                self.add_missing_keys().await
            }
            RegistrationPlan::Create => {
                let previous = self.state;
                self.state = RegistrationState::PendingCreate;
                let outcome = self.create().await;
                match &outcome {
                    Ok(RegistrationOutcome::Created(_)) => {}
                    _ => self.state = previous,
                }
                outcome
            }
        }
    }

    async fn create(&mut self) -> Result<RegistrationOutcome, RegistrationError> {
        info!("Checking validator...");
        let staking_epoch = self.chain.staking_epoch(&self.beacon_endpoint).await?;
        let mut epoch = self.chain.current_epoch(&self.beacon_endpoint).await?;
        while epoch < staking_epoch {
            info!(staking_epoch, current_epoch = epoch, "Waiting for staking epoch");
            pause(self.monitor.cancel_token(), self.poll.block_time).await?;
            epoch = self.chain.current_epoch(&self.beacon_endpoint).await?;
        }
        info!(epoch, "Network is at or past staking epoch");

        let required = self.config.amount + GAS_FEE_MARGIN;
        let balance = self
            .staking
            .balances(&self.identity.address)
            .await?
            .into_iter()
            .find(|b| b.shard == 0)
            .map(|b| b.amount)
            .unwrap_or(0.0);
        if balance < required {
            warn!(
                address = %self.identity.address,
                balance,
                required,
                "Cannot create validator, insufficient funds on shard 0"
            );
            return Ok(RegistrationOutcome::InsufficientFunds { balance, required });
        }
        info!(address = %self.identity.address, balance, "Address has enough funds");

        self.monitor.verify_sync(&self.beacon_endpoint).await?;

        info!("Sending create validator transaction...");
        let guard = self.workspace.lock().await;
        let response = self
            .staking
            .create_validator(
                &self.config,
                &self.identity.address,
                &self.identity.bls_keys,
                &self.identity.bls_passphrase,
            )
            .await;
        drop(guard);

        match response {
            Ok(response) => {
                info!(%response, "Created validator");
                Ok(RegistrationOutcome::Created(response))
            }
            Err(e) => {
                warn!(error = %e, "Failed to create validator");
                Ok(RegistrationOutcome::TransactionFailed(e.to_string()))
            }
        }
    }

    async fn add_missing_keys(&mut self) -> Result<RegistrationOutcome, RegistrationError> {
        let address = self.identity.address.clone();
        info!(%address, "Validator already in list of validators");
        let on_chain = self.staking.validator_information(&address).await?;
        let missing: Vec<String> = self
            .identity
            .bls_keys
            .missing_from(&on_chain.validator.bls_public_keys)
            .into_iter()
            .map(str::to_string)
            .collect();

        let mut added = Vec::new();
        let mut failed = Vec::new();
        if !missing.is_empty() {
            self.state = RegistrationState::PendingEdit;
            let guard = self.workspace.lock().await;
            for key in missing {
                info!(%key, %address, "Adding BLS key to validator");
                match self
                    .staking
                    .add_bls_key(&address, &key, &self.identity.bls_passphrase)
                    .await
                {
                    Ok(response) => {
                        info!(%response, "Edit-validator transaction response");
                        added.push(key);
                    }
                    Err(e) => {
                        warn!(%key, error = %e, "Failed to add BLS key");
                        failed.push(key);
                    }
                }
            }
            drop(guard);
        }
        self.state = RegistrationState::Registered;

        let updated = self.staking.validator_information(&address).await?;
        info!(%address, keys = ?updated.validator.bls_public_keys, "Updated BLS keys");
        self.monitor.verify_sync(&self.beacon_endpoint).await?;
        Ok(RegistrationOutcome::KeysAdded { added, failed })
    }
}
