// Validator identity, staking transactions and the registration lifecycle
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

pub mod error;
pub mod interact;
pub mod keys;
pub mod registration;
pub mod staking;
pub mod watchdog;

pub use error::{ConfigError, InteractError, KeyError, RegistrationError, StakingError};
pub use keys::{BlsKeySet, KeyManager, KeyProvisioner, NodeIdentity, Passphrase, PassphraseSource};
pub use registration::{RegistrationOutcome, RegistrationPlan, RegistrationState, Registrar};
pub use staking::{BlsKeyRecord, HmyCli, KeystoreAccount, ShardBalance, StakingClient};
pub use watchdog::{is_inactive, EposWatchdog};

/// Validator parameters supplied by the operator. Read-only once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ValidatorConfig {
    /// Unset means "pick any wallet from the CLI keystore".
    #[serde(default)]
    pub validator_addr: Option<String>,
    pub name: String,
    #[serde(default)]
    pub identity: String,
    #[serde(default)]
    pub website: String,
    #[serde(default)]
    pub security_contact: String,
    #[serde(default)]
    pub details: String,
    pub rate: f64,
    pub max_rate: f64,
    pub max_change_rate: f64,
    pub min_self_delegation: f64,
    pub max_total_delegation: f64,
    pub amount: f64,
}

impl ValidatorConfig {
    // yaml by extension, json otherwise
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let is_yaml = matches!(
            path.extension().and_then(|ext| ext.to_str()),
            Some("yaml" | "yml")
        );
        let parsed = if is_yaml {
            serde_yaml::from_str(&raw).map_err(|e| e.to_string())
        } else {
            serde_json::from_str(&raw).map_err(|e| e.to_string())
        };
        let config: Self = parsed.map_err(|message| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        })?;

        info!(name = %config.name, address = ?config.validator_addr, "Validator config loaded...");
        Ok(config)
    }

    /// Pin the validator address once key provisioning has resolved it.
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.validator_addr = Some(address.into());
        self
    }

    pub fn address(&self) -> Option<&str> {
        self.validator_addr.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const JSON: &str = r#"{
        "validator-addr": null,
        "name": "harmony autonode",
        "website": "harmony.one",
        "security-contact": "Daniel-VDM",
        "identity": "auto-node",
        "amount": 10100,
        "min-self-delegation": 10000,
        "rate": 0.1,
        "max-rate": 0.75,
        "max-change-rate": 0.05,
        "max-total-delegation": 100000000.0,
        "details": "None"
    }"#;

    #[test]
    fn test_loads_json_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("validator_config.json");
        std::fs::write(&path, JSON).unwrap();

        let config = ValidatorConfig::load_from_file(&path).unwrap();
        assert_eq!(config.address(), None);
        assert_eq!(config.security_contact, "Daniel-VDM");
        assert_eq!(config.amount, 10100.0);
        assert_eq!(config.max_change_rate, 0.05);
    }

    #[test]
    fn test_loads_yaml_config_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("validator.yaml");
        std::fs::write(
            &path,
            "validator-addr: one1abc\nname: node\nrate: 0.1\nmax-rate: 0.2\nmax-change-rate: 0.01\n\
             min-self-delegation: 10000\nmax-total-delegation: 20000\namount: 10000\n",
        )
        .unwrap();

        let config = ValidatorConfig::load_from_file(&path).unwrap();
        assert_eq!(config.address(), Some("one1abc"));
        assert_eq!(config.identity, "");
    }

    #[test]
    fn test_malformed_config_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{\"name\": ").unwrap();

        let err = ValidatorConfig::load_from_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(matches!(
            ValidatorConfig::load_from_file(dir.path().join("absent.json")),
            Err(ConfigError::Io { .. })
        ));
    }
}
