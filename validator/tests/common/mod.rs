#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chain::{
    Block, ChainHeader, ChainQuery, Header, LatestHeaders, RpcError, ShardEndpoint,
    ValidatorInformation, ValidatorRecord,
};
use parking_lot::Mutex;
use validator::{
    BlsKeyRecord, BlsKeySet, KeystoreAccount, Passphrase, ShardBalance, StakingClient,
    StakingError, ValidatorConfig,
};

pub const LOCAL: &str = "http://localhost:9500/";
pub const BEACON: &str = "https://api.s0.example/";
pub const ADDRESS: &str = "one1validator";

/// Calls seen by the mocks, in order, shared between chain and staking.
pub type CallLog = Arc<Mutex<Vec<String>>>;

pub fn config() -> ValidatorConfig {
    ValidatorConfig {
        validator_addr: Some(ADDRESS.to_string()),
        name: "auto node".into(),
        identity: "auto".into(),
        website: "harmony.one".into(),
        security_contact: "ops".into(),
        details: "test".into(),
        rate: 0.1,
        max_rate: 0.75,
        max_change_rate: 0.05,
        min_self_delegation: 10000.0,
        max_total_delegation: 100000000.0,
        amount: 10000.0,
    }
}

/// Beacon chain whose epoch advances through a queue (the last value
/// repeats). The local node always reports the final epoch, so sync checks
/// pass once the beacon reaches it.
pub struct MockChain {
    epochs: Mutex<VecDeque<u64>>,
    staking_epoch: u64,
    log: CallLog,
}

impl MockChain {
    pub fn new(log: CallLog, staking_epoch: u64, epochs: impl IntoIterator<Item = u64>) -> Self {
        Self {
            epochs: Mutex::new(epochs.into_iter().collect()),
            staking_epoch,
            log,
        }
    }

    fn final_epoch(&self) -> u64 {
        self.epochs.lock().back().copied().unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl ChainQuery for MockChain {
    async fn latest_headers(&self, _endpoint: &str) -> Result<LatestHeaders, RpcError> {
        let epoch = self.final_epoch();
        let header = ChainHeader {
            epoch,
            ..Default::default()
        };
        Ok(LatestHeaders {
            shard_chain_header: header.clone(),
            beacon_chain_header: header,
        })
    }

    async fn latest_header(&self, _endpoint: &str) -> Result<Header, RpcError> {
        let epoch = {
            let mut epochs = self.epochs.lock();
            if epochs.len() > 1 {
                epochs.pop_front().unwrap()
            } else {
                epochs.front().copied().unwrap_or_default()
            }
        };
        self.log.lock().push(format!("epoch:{epoch}"));
        Ok(Header {
            epoch,
            block_number: 1,
            ..Default::default()
        })
    }

    async fn block_by_number(
        &self,
        _endpoint: &str,
        _height: u64,
    ) -> Result<Option<Block>, RpcError> {
        Ok(None)
    }

    async fn sharding_structure(&self, _endpoint: &str) -> Result<Vec<ShardEndpoint>, RpcError> {
        Ok(vec![])
    }

    async fn staking_epoch(&self, _endpoint: &str) -> Result<u64, RpcError> {
        Ok(self.staking_epoch)
    }

    async fn validator_information(
        &self,
        _endpoint: &str,
        _address: &str,
    ) -> Result<ValidatorInformation, RpcError> {
        Ok(ValidatorInformation::default())
    }
}

/// A key the mock keystore hands out on `generate-bls-key`.
#[derive(Clone, Debug)]
pub struct GeneratedKey {
    pub public_key: String,
    pub shard: u32,
}

#[derive(Default)]
pub struct MockStaking {
    pub log: CallLog,
    pub validators: Mutex<Vec<String>>,
    pub on_chain_keys: Mutex<Vec<String>>,
    pub shard0_balance: Mutex<f64>,
    pub accounts: Vec<KeystoreAccount>,
    pub generated: Mutex<VecDeque<GeneratedKey>>,
    /// Where generated key files are written (the CLI directory).
    pub key_dir: Option<PathBuf>,
    pub fail_create: bool,
}

impl MockStaking {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.log.lock().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    fn record(&self, call: String) {
        self.log.lock().push(call);
    }
}

#[async_trait::async_trait]
impl StakingClient for MockStaking {
    async fn balances(&self, address: &str) -> Result<Vec<ShardBalance>, StakingError> {
        self.record(format!("balances:{address}"));
        Ok(vec![
            ShardBalance {
                shard: 0,
                amount: *self.shard0_balance.lock(),
            },
            ShardBalance {
                shard: 1,
                amount: 1_000_000.0,
            },
        ])
    }

    async fn shard_for_bls(&self, public_key: &str) -> Result<u32, StakingError> {
        self.record(format!("shard-for-bls:{public_key}"));
        let shard = self
            .generated
            .lock()
            .iter()
            .find(|k| k.public_key == public_key)
            .map(|k| k.shard)
            .unwrap_or_default();
        Ok(shard)
    }

    async fn validator_information(
        &self,
        address: &str,
    ) -> Result<ValidatorInformation, StakingError> {
        self.record(format!("information:{address}"));
        Ok(ValidatorInformation {
            validator: ValidatorRecord {
                address: address.to_string(),
                bls_public_keys: self.on_chain_keys.lock().clone(),
            },
            epos_status: "currently elected".into(),
            ..Default::default()
        })
    }

    async fn all_validators(&self) -> Result<Vec<String>, StakingError> {
        self.record("all-validators".into());
        Ok(self.validators.lock().clone())
    }

    async fn keystore_accounts(&self) -> Result<Vec<KeystoreAccount>, StakingError> {
        self.record("keys-list".into());
        Ok(self.accounts.clone())
    }

    async fn recover_bls_key(
        &self,
        key_file: &Path,
        _passphrase_file: &Path,
    ) -> Result<BlsKeyRecord, StakingError> {
        let stem = key_file
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
        self.record(format!("recover:{stem}"));
        if stem.starts_with("bad") {
            return Err(StakingError::CommandFailed {
                command: "hmy keys recover-bls-key".into(),
                status: "exit status: 1".into(),
                stderr: "could not decrypt".into(),
            });
        }
        Ok(BlsKeyRecord {
            public_key: format!("0x{stem}"),
            encrypted_private_key_path: None,
        })
    }

    async fn generate_bls_key(
        &self,
        _passphrase_file: &Path,
    ) -> Result<BlsKeyRecord, StakingError> {
        let key = {
            let mut generated = self.generated.lock();
            let key = generated.pop_front().expect("no generated keys scripted");
            // keep it around so shard-for-bls can answer for it
            generated.push_back(key.clone());
            key
        };
        self.record(format!("generate:{}", key.public_key));
        let file = format!("{}.key", key.public_key.trim_start_matches("0x"));
        if let Some(dir) = &self.key_dir {
            std::fs::write(dir.join(&file), "encrypted").unwrap();
        }
        Ok(BlsKeyRecord {
            public_key: key.public_key,
            encrypted_private_key_path: Some(PathBuf::from(file)),
        })
    }

    async fn create_validator(
        &self,
        _config: &ValidatorConfig,
        address: &str,
        keys: &BlsKeySet,
        _bls_passphrase: &Passphrase,
    ) -> Result<serde_json::Value, StakingError> {
        self.record(format!("create:{address}:{}", keys.joined()));
        if self.fail_create {
            return Err(StakingError::Pty("terminal went away".into()));
        }
        Ok(serde_json::json!({ "transaction-hash": "0x1234" }))
    }

    async fn add_bls_key(
        &self,
        address: &str,
        key: &str,
        _bls_passphrase: &Passphrase,
    ) -> Result<String, StakingError> {
        self.record(format!("add-key:{address}:{key}"));
        self.on_chain_keys.lock().push(key.to_string());
        Ok("{\"transaction-hash\": \"0x5678\"}".into())
    }

    async fn activate(&self, address: &str) -> Result<String, StakingError> {
        self.record(format!("activate:{address}"));
        Ok("{\"transaction-hash\": \"0x9abc\"}".into())
    }
}
