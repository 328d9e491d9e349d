//! Plain-text files other container tooling reads to learn about the
//! running validator.

use std::path::Path;
use std::time::Duration;

use env_config::{Network, NodePaths};
use tracing::info;
use validator::NodeIdentity;

use crate::error::OrchestratorError;

pub const VALIDATOR_ADDRESS: &str = ".val_address";
pub const WALLET_PASSPHRASE: &str = ".wallet_passphrase";
pub const BLS_KEYS: &str = ".bls_keys";
pub const BLS_PASSPHRASE: &str = ".bls_passphrase";
pub const NETWORK: &str = ".network";
pub const BEACON_ENDPOINT: &str = ".beacon_endpoint";
pub const DURATION: &str = ".duration";

pub struct SharedInfo<'a> {
    pub identity: &'a NodeIdentity,
    pub network: Network,
    pub beacon_endpoint: &'a str,
    /// `None` runs forever.
    pub duration: Option<Duration>,
}

impl SharedInfo<'_> {
    fn entries(&self) -> [(&'static str, String); 7] {
        let duration = match self.duration {
            Some(duration) => duration.as_secs().to_string(),
            None => "inf".to_string(),
        };
        [
            (VALIDATOR_ADDRESS, self.identity.address.clone()),
            (
                WALLET_PASSPHRASE,
                self.identity.wallet_passphrase.expose().to_string(),
            ),
            (BLS_KEYS, self.identity.bls_keys.to_string()),
            (
                BLS_PASSPHRASE,
                self.identity.bls_passphrase.expose().to_string(),
            ),
            (NETWORK, self.network.to_string()),
            (BEACON_ENDPOINT, self.beacon_endpoint.to_string()),
            (DURATION, duration),
        ]
    }
}

pub async fn write_shared_info(
    paths: &NodePaths,
    info: &SharedInfo<'_>,
) -> Result<(), OrchestratorError> {
    tokio::fs::create_dir_all(&paths.shared_info_dir)
        .await
        .map_err(shared_file_err(&paths.shared_info_dir))?;
    for (name, contents) in info.entries() {
        let path = paths.shared_file(name);
        tokio::fs::write(&path, contents)
            .await
            .map_err(shared_file_err(&path))?;
    }
    info!(
        address = %info.identity.address,
        bls_keys = %info.identity.bls_keys,
        network = %info.network,
        beacon_endpoint = info.beacon_endpoint,
        duration = ?info.duration,
        default_wallet_passphrase = info.identity.wallet_passphrase.is_default(),
        default_bls_passphrase = info.identity.bls_passphrase.is_default(),
        "Saved node info for other tools"
    );
    Ok(())
}

fn shared_file_err(path: &Path) -> impl FnOnce(std::io::Error) -> OrchestratorError + '_ {
    move |source| OrchestratorError::SharedFile {
        path: path.to_path_buf(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::{BlsKeySet, Passphrase};

    #[tokio::test]
    async fn writes_bls_passphrase_distinct_from_wallet_passphrase() {
        let root = tempfile::tempdir().unwrap();
        let paths = NodePaths::rooted_at(root.path());
        let identity = NodeIdentity {
            address: "one1val".into(),
            bls_keys: BlsKeySet::new(vec!["0xaa".into(), "0xbb".into()]),
            wallet_passphrase: Passphrase::new("wallet-secret"),
            bls_passphrase: Passphrase::new("bls-secret"),
        };

        write_shared_info(
            &paths,
            &SharedInfo {
                identity: &identity,
                network: Network::Partner,
                beacon_endpoint: "https://api.s0.ps.hmny.io/",
                duration: None,
            },
        )
        .await
        .unwrap();

        let read = |name: &str| std::fs::read_to_string(paths.shared_file(name)).unwrap();
        assert_eq!(read(VALIDATOR_ADDRESS), "one1val");
        assert_eq!(read(WALLET_PASSPHRASE), "wallet-secret");
        assert_eq!(read(BLS_PASSPHRASE), "bls-secret");
        assert_eq!(read(BLS_KEYS), "[\"0xaa\", \"0xbb\"]");
        assert_eq!(read(NETWORK), "partner");
        assert_eq!(read(DURATION), "inf");
    }
}
