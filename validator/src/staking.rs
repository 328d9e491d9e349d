//! Staking Action Client: transaction-producing and keystore calls through
//! the `hmy` CLI.
//!
//! Plain calls run the binary with an argument vector and decode its JSON
//! stdout. Calls that ask for BLS passphrases run it on a pseudo-terminal and
//! answer the prompts through [`crate::interact`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use chain::config::INTERACTION_TIMEOUT_SECS;
use chain::ValidatorInformation;
use env_config::NodePaths;
use portable_pty::{native_pty_system, Child as _, ChildKiller as _, CommandBuilder, PtySize};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::{InteractError, StakingError};
use crate::interact::{run_exchange, Prompt, PromptScript};
use crate::keys::{BlsKeySet, Passphrase};
use crate::ValidatorConfig;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ShardBalance {
    pub shard: u32,
    pub amount: f64,
}

/// One wallet of the CLI keystore.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeystoreAccount {
    pub name: String,
    pub address: String,
}

/// Output of `keys recover-bls-key` / `keys generate-bls-key`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BlsKeyRecord {
    pub public_key: String,
    #[serde(default)]
    pub encrypted_private_key_path: Option<PathBuf>,
}

#[derive(Deserialize)]
struct Envelope<T> {
    result: T,
}

#[derive(Deserialize)]
struct ShardForBls {
    #[serde(rename = "shard-id")]
    shard_id: u32,
}

/// Staking operations against the beacon endpoint.
///
/// Abstracted so registration and activation can be exercised without the
/// CLI binary.
#[async_trait::async_trait]
pub trait StakingClient: Send + Sync {
    async fn balances(&self, address: &str) -> Result<Vec<ShardBalance>, StakingError>;

    async fn shard_for_bls(&self, public_key: &str) -> Result<u32, StakingError>;

    async fn validator_information(
        &self,
        address: &str,
    ) -> Result<ValidatorInformation, StakingError>;

    /// Addresses of every validator known on chain.
    async fn all_validators(&self) -> Result<Vec<String>, StakingError>;

    async fn keystore_accounts(&self) -> Result<Vec<KeystoreAccount>, StakingError>;

    async fn recover_bls_key(
        &self,
        key_file: &Path,
        passphrase_file: &Path,
    ) -> Result<BlsKeyRecord, StakingError>;

    async fn generate_bls_key(&self, passphrase_file: &Path) -> Result<BlsKeyRecord, StakingError>;

    /// Submit create-validator, answering one BLS passphrase prompt per key.
    async fn create_validator(
        &self,
        config: &ValidatorConfig,
        address: &str,
        keys: &BlsKeySet,
        bls_passphrase: &Passphrase,
    ) -> Result<serde_json::Value, StakingError>;

    /// Submit edit-validator adding `key`. Returns the CLI's response.
    async fn add_bls_key(
        &self,
        address: &str,
        key: &str,
        bls_passphrase: &Passphrase,
    ) -> Result<String, StakingError>;

    /// Submit edit-validator setting the active flag.
    async fn activate(&self, address: &str) -> Result<String, StakingError>;
}

pub struct HmyCli {
    binary: PathBuf,
    endpoint: String,
    passphrase_file: PathBuf,
    cli_dir: PathBuf,
    prompt_timeout: Duration,
}

impl HmyCli {
    pub fn new(binary: impl Into<PathBuf>, endpoint: impl Into<String>, paths: &NodePaths) -> Self {
        Self {
            binary: binary.into(),
            endpoint: endpoint.into(),
            passphrase_file: paths.wallet_passphrase_file(),
            cli_dir: paths.cli_dir.clone(),
            prompt_timeout: Duration::from_secs(INTERACTION_TIMEOUT_SECS),
        }
    }

    pub fn with_prompt_timeout(mut self, timeout: Duration) -> Self {
        self.prompt_timeout = timeout;
        self
    }

    fn node_arg(&self) -> String {
        format!("--node={}", self.endpoint)
    }

    fn passphrase_args(&self) -> [String; 2] {
        [
            "--passphrase-file".to_string(),
            self.passphrase_file.display().to_string(),
        ]
    }

    async fn single_call(&self, args: Vec<String>) -> Result<String, StakingError> {
        let command = render(&args);
        debug!(%command, "hmy single call");
        let output = Command::new(&self.binary)
            .args(&args)
            .current_dir(&self.cli_dir)
            .output()
            .await
            .map_err(|source| StakingError::Spawn {
                binary: self.binary.clone(),
                source,
            })?;
        if !output.status.success() {
            return Err(StakingError::CommandFailed {
                command,
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn json_call<T: DeserializeOwned>(&self, args: Vec<String>) -> Result<T, StakingError> {
        let command = render(&args);
        let stdout = self.single_call(args).await?;
        serde_json::from_str(&stdout).map_err(|source| StakingError::Decode { command, source })
    }

    /// Run on a pseudo-terminal in the CLI directory (the CLI finds the BLS
    /// key files there) and walk `script` until output ends.
    async fn expect_call(
        &self,
        args: Vec<String>,
        script: PromptScript,
    ) -> Result<String, StakingError> {
        debug!(command = %render(&args), prompts = script.len(), "hmy interactive call");
        let pair = native_pty_system()
            .openpty(PtySize {
                rows: 24,
                cols: 200,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| StakingError::Pty(format!("failed to open pty: {e}")))?;

        let mut cmd = CommandBuilder::new(&self.binary);
        cmd.args(&args);
        cmd.cwd(&self.cli_dir);
        let mut child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| StakingError::Pty(format!("failed to spawn {:?}: {e}", self.binary)))?;
        // The master only reports end of output once no slave handle is open.
        drop(pair.slave);

        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| StakingError::Pty(format!("failed to clone pty reader: {e}")))?;
        let writer = pair
            .master
            .take_writer()
            .map_err(|e| StakingError::Pty(format!("failed to take pty writer: {e}")))?;
        let mut killer = child.clone_killer();

        let limit = self.prompt_timeout * (script.len().max(1) as u32);
        let exchange = tokio::task::spawn_blocking(move || {
            let transcript = run_exchange(&script, reader, writer);
            let _ = child.wait();
            transcript
        });

        let transcript = match tokio::time::timeout(limit, exchange).await {
            Ok(Ok(transcript)) => transcript?,
            Ok(Err(join)) => return Err(StakingError::Pty(format!("exchange task failed: {join}"))),
            Err(_) => {
                if let Err(e) = killer.kill() {
                    warn!(error = %e, "Failed to kill timed out CLI call");
                }
                return Err(InteractError::TimedOut(limit).into());
            }
        };
        drop(pair.master);
        Ok(transcript)
    }
}

#[async_trait::async_trait]
impl StakingClient for HmyCli {
    async fn balances(&self, address: &str) -> Result<Vec<ShardBalance>, StakingError> {
        self.json_call(vec![self.node_arg(), "balances".into(), address.into()])
            .await
    }

    async fn shard_for_bls(&self, public_key: &str) -> Result<u32, StakingError> {
        let key = public_key.trim_start_matches("0x");
        let answer: ShardForBls = self
            .json_call(vec![
                self.node_arg(),
                "utility".into(),
                "shard-for-bls".into(),
                key.into(),
            ])
            .await?;
        Ok(answer.shard_id)
    }

    async fn validator_information(
        &self,
        address: &str,
    ) -> Result<ValidatorInformation, StakingError> {
        let envelope: Envelope<ValidatorInformation> = self
            .json_call(vec![
                self.node_arg(),
                "blockchain".into(),
                "validator".into(),
                "information".into(),
                address.into(),
            ])
            .await?;
        Ok(envelope.result)
    }

    async fn all_validators(&self) -> Result<Vec<String>, StakingError> {
        let envelope: Envelope<Vec<String>> = self
            .json_call(vec![
                self.node_arg(),
                "blockchain".into(),
                "validator".into(),
                "all".into(),
            ])
            .await?;
        Ok(envelope.result)
    }

    async fn keystore_accounts(&self) -> Result<Vec<KeystoreAccount>, StakingError> {
        let listing = self
            .single_call(vec!["keys".into(), "list".into()])
            .await?;
        Ok(parse_keys_list(&listing))
    }

    async fn recover_bls_key(
        &self,
        key_file: &Path,
        passphrase_file: &Path,
    ) -> Result<BlsKeyRecord, StakingError> {
        self.json_call(vec![
            "keys".into(),
            "recover-bls-key".into(),
            key_file.display().to_string(),
            "--passphrase-file".into(),
            passphrase_file.display().to_string(),
        ])
        .await
    }

    async fn generate_bls_key(&self, passphrase_file: &Path) -> Result<BlsKeyRecord, StakingError> {
        self.json_call(vec![
            "keys".into(),
            "generate-bls-key".into(),
            "--passphrase-file".into(),
            passphrase_file.display().to_string(),
        ])
        .await
    }

    async fn create_validator(
        &self,
        config: &ValidatorConfig,
        address: &str,
        keys: &BlsKeySet,
        bls_passphrase: &Passphrase,
    ) -> Result<serde_json::Value, StakingError> {
        let mut args = vec![self.node_arg()];
        args.extend(create_validator_args(config, address, keys));
        args.extend(self.passphrase_args());
        let command = render(&args);

        let script = PromptScript::repeated(Prompt::BlsPassphrase, bls_passphrase, keys.len());
        let transcript = self.expect_call(args, script).await?;
        serde_json::from_str(&transcript).map_err(|source| StakingError::Decode { command, source })
    }

    async fn add_bls_key(
        &self,
        address: &str,
        key: &str,
        bls_passphrase: &Passphrase,
    ) -> Result<String, StakingError> {
        let mut args = vec![
            self.node_arg(),
            "staking".into(),
            "edit-validator".into(),
            "--validator-addr".into(),
            address.into(),
            "--add-bls-key".into(),
            key.into(),
        ];
        args.extend(self.passphrase_args());
        let script = PromptScript::new().expect(Prompt::BlsPassphrase, bls_passphrase.clone());
        self.expect_call(args, script).await
    }

    async fn activate(&self, address: &str) -> Result<String, StakingError> {
        let mut args = vec![
            "staking".into(),
            "edit-validator".into(),
            "--validator-addr".into(),
            address.into(),
            "--active".into(),
            "true".into(),
            self.node_arg(),
        ];
        args.extend(self.passphrase_args());
        self.single_call(args).await
    }
}

pub fn create_validator_args(
    config: &ValidatorConfig,
    address: &str,
    keys: &BlsKeySet,
) -> Vec<String> {
    let pairs = [
        ("--validator-addr", address.to_string()),
        ("--name", config.name.clone()),
        ("--identity", config.identity.clone()),
        ("--website", config.website.clone()),
        ("--security-contact", config.security_contact.clone()),
        ("--details", config.details.clone()),
        ("--rate", config.rate.to_string()),
        ("--max-rate", config.max_rate.to_string()),
        ("--max-change-rate", config.max_change_rate.to_string()),
        ("--min-self-delegation", config.min_self_delegation.to_string()),
        ("--max-total-delegation", config.max_total_delegation.to_string()),
        ("--amount", config.amount.to_string()),
        ("--bls-pubkeys", keys.joined()),
    ];
    let mut args = vec!["staking".to_string(), "create-validator".to_string()];
    for (flag, value) in pairs {
        args.push(flag.to_string());
        args.push(value);
    }
    args
}

/// Parse the `NAME  ADDRESS` table printed by `hmy keys list`.
pub fn parse_keys_list(listing: &str) -> Vec<KeystoreAccount> {
    listing
        .lines()
        .filter_map(|line| {
            let mut columns = line.split_whitespace();
            let name = columns.next()?;
            let address = columns.last()?;
            if name.eq_ignore_ascii_case("NAME") {
                return None;
            }
            Some(KeystoreAccount {
                name: name.to_string(),
                address: address.to_string(),
            })
        })
        .collect()
}

fn render(args: &[String]) -> String {
    format!("hmy {}", args.join(" "))
}
