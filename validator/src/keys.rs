use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use env_config::NodePaths;
use rand::seq::SliceRandom;
use tokio::sync::oneshot;
use tracing::{info, warn};

use crate::error::KeyError;
use crate::staking::{BlsKeyRecord, StakingClient};

/// A wallet or BLS key passphrase. Empty means the CLI default.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Passphrase(String);

impl Passphrase {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_default(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Passphrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_default() {
            f.write_str("Passphrase(<default>)")
        } else {
            f.write_str("Passphrase(<redacted>)")
        }
    }
}

/// Ordered BLS public keys of the validator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlsKeySet(Vec<String>);

impl BlsKeySet {
    pub fn new(keys: Vec<String>) -> Self {
        Self(keys)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn first(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Comma separated, as the CLI takes them.
    pub fn joined(&self) -> String {
        self.0.join(",")
    }

    /// Keys of this set that `on_chain` does not list yet. The chain may
    /// report keys with or without the `0x` prefix and in either case.
    pub fn missing_from<'a>(&'a self, on_chain: &[String]) -> Vec<&'a str> {
        self.iter()
            .filter(|key| {
                let key = normalize(key);
                !on_chain.iter().any(|listed| normalize(listed) == key)
            })
            .collect()
    }
}

impl fmt::Display for BlsKeySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

fn normalize(key: &str) -> String {
    key.trim().trim_start_matches("0x").to_ascii_lowercase()
}

/// Everything the orchestrator needs to know about who it validates as.
#[derive(Debug, Clone)]
pub struct NodeIdentity {
    pub address: String,
    pub bls_keys: BlsKeySet,
    pub wallet_passphrase: Passphrase,
    pub bls_passphrase: Passphrase,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PassphraseSource {
    /// The CLI's default (empty) passphrase.
    #[default]
    Default,
    Given(Passphrase),
    /// Ask on the controlling terminal.
    Prompt,
}

impl PassphraseSource {
    /// Interactive wins over an explicit string, which wins over the default.
    pub fn from_flags(interactive: bool, given: Option<String>) -> Self {
        match (interactive, given) {
            (true, _) => PassphraseSource::Prompt,
            (false, Some(secret)) => PassphraseSource::Given(Passphrase::new(secret)),
            (false, None) => PassphraseSource::Default,
        }
    }

    pub async fn resolve(&self, prompt: String) -> Result<Passphrase, KeyError> {
        match self {
            PassphraseSource::Default => Ok(Passphrase::default()),
            PassphraseSource::Given(passphrase) => Ok(passphrase.clone()),
            PassphraseSource::Prompt => {
                // detached so an abandoned prompt does not hold up shutdown
                let (tx, rx) = oneshot::channel();
                std::thread::spawn(move || {
                    let _ = tx.send(rpassword::prompt_password(prompt));
                });
                let exited = || std::io::Error::other("passphrase prompt exited");
                let answer = rx
                    .await
                    .map_err(|_| KeyError::Prompt(exited()))?
                    .map_err(KeyError::Prompt)?;
                Ok(Passphrase::new(answer))
            }
        }
    }
}

/// Produces the validator identity before the node starts.
#[async_trait::async_trait]
pub trait KeyProvisioner: Send + Sync {
    async fn provision(&self) -> Result<NodeIdentity, KeyError>;
}

/// Provisions the identity from the shared CLI keystore and the operator's
/// BLS key files, generating a fresh BLS key when none are supplied.
pub struct KeyManager {
    staking: Arc<dyn StakingClient>,
    paths: NodePaths,
    configured_address: Option<String>,
    wallet_passphrase: PassphraseSource,
    bls_passphrase: PassphraseSource,
    shard: Option<u32>,
}

impl KeyManager {
    pub fn new(staking: Arc<dyn StakingClient>, paths: NodePaths) -> Self {
        Self {
            staking,
            paths,
            configured_address: None,
            wallet_passphrase: PassphraseSource::Default,
            bls_passphrase: PassphraseSource::Default,
            shard: None,
        }
    }

    pub fn with_address(mut self, address: Option<String>) -> Self {
        self.configured_address = address;
        self
    }

    pub fn with_passphrases(mut self, wallet: PassphraseSource, bls: PassphraseSource) -> Self {
        self.wallet_passphrase = wallet;
        self.bls_passphrase = bls;
        self
    }

    /// Only honoured when a key has to be generated.
    pub fn with_shard(mut self, shard: Option<u32>) -> Self {
        self.shard = shard;
        self
    }

    async fn resolve_address(&self) -> Result<String, KeyError> {
        let accounts = self.staking.keystore_accounts().await?;
        match &self.configured_address {
            Some(address) => {
                if accounts.iter().any(|account| &account.address == address) {
                    Ok(address.clone())
                } else {
                    Err(KeyError::AddressNotInKeystore(address.clone()))
                }
            }
            None => {
                info!("Selecting random address in shared CLI keystore to be validator");
                accounts
                    .choose(&mut rand::thread_rng())
                    .map(|account| account.address.clone())
                    .ok_or(KeyError::EmptyKeystore)
            }
        }
    }

    async fn import_bls_keys(&self, passphrase: &Passphrase) -> Result<BlsKeySet, KeyError> {
        let scratch = &self.paths.bls_pass_scratch;
        if let Some(dir) = scratch.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(io_err("creating", dir))?;
        }
        tokio::fs::write(scratch, passphrase.expose())
            .await
            .map_err(io_err("writing", scratch))?;
        reset_dir(&self.paths.bls_key_dir).await?;

        let provided = key_files(&self.paths.imported_bls_key_dir).await?;
        if provided.is_empty() {
            let record = self.generate_bls_key(scratch).await?;
            if let Some(file) = &record.encrypted_private_key_path {
                self.install_key_file(file, &record.public_key, passphrase)
                    .await?;
            }
            return Ok(BlsKeySet::new(vec![record.public_key]));
        }

        if self.shard.is_some() {
            warn!(
                dir = ?self.paths.imported_bls_key_dir,
                "Shard option ignored since BLS keys were provided"
            );
        }
        let mut keys = Vec::new();
        for file in provided {
            let imported = match self.staking.recover_bls_key(&file, scratch).await {
                Ok(record) => self
                    .install_key_file(&file, &record.public_key, passphrase)
                    .await
                    .map(|()| record.public_key),
                Err(e) => Err(e.into()),
            };
            match imported {
                Ok(key) => {
                    info!(%key, file = ?file, "Imported BLS key");
                    keys.push(key);
                }
                Err(e) => warn!(file = ?file, error = %e, "Failed to load BLS key"),
            }
        }
        if keys.is_empty() {
            return Err(KeyError::NoUsableKeys);
        }
        Ok(BlsKeySet::new(keys))
    }

    /// Generate keys until one lands on the requested shard, if any.
    async fn generate_bls_key(&self, scratch: &Path) -> Result<BlsKeyRecord, KeyError> {
        loop {
            let record = self.staking.generate_bls_key(scratch).await?;
            let shard = self.staking.shard_for_bls(&record.public_key).await?;
            match self.shard {
                Some(wanted) if wanted != shard => {
                    if let Some(file) = &record.encrypted_private_key_path {
                        let file = self.paths.cli_dir.join(file);
                        if let Err(e) = tokio::fs::remove_file(&file).await {
                            warn!(file = ?file, error = %e, "Failed to remove discarded BLS key");
                        }
                    }
                }
                _ => {
                    info!(shard, key = %record.public_key, "Generated BLS key");
                    return Ok(record);
                }
            }
        }
    }

    /// Place a key file where the node and the CLI expect it and write the
    /// node's `<pubkey>.pass` next to it.
    async fn install_key_file(
        &self,
        file: &Path,
        public_key: &str,
        passphrase: &Passphrase,
    ) -> Result<(), KeyError> {
        let source = self.paths.cli_dir.join(file);
        let Some(name) = source.file_name() else {
            return Err(KeyError::Io {
                action: "naming",
                path: source.clone(),
                source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a key file"),
            });
        };
        for dir in [&self.paths.bls_key_dir, &self.paths.cli_dir] {
            let target = dir.join(name);
            if target != source {
                tokio::fs::copy(&source, &target)
                    .await
                    .map_err(io_err("copying", &target))?;
            }
        }
        let pass_file = self
            .paths
            .bls_key_dir
            .join(format!("{}.pass", public_key.trim_start_matches("0x")));
        tokio::fs::write(&pass_file, passphrase.expose())
            .await
            .map_err(io_err("writing", &pass_file))
    }
}

#[async_trait::async_trait]
impl KeyProvisioner for KeyManager {
    async fn provision(&self) -> Result<NodeIdentity, KeyError> {
        info!("Importing node info...");
        let address = self.resolve_address().await?;
        let wallet_passphrase = self
            .wallet_passphrase
            .resolve(format!("Enter wallet passphrase for {address}\n> "))
            .await?;
        let bls_passphrase = self
            .bls_passphrase
            .resolve("Enter passphrase for all given BLS keys\n> ".to_string())
            .await?;
        let bls_keys = self.import_bls_keys(&bls_passphrase).await?;

        info!(
            %address,
            %bls_keys,
            default_wallet_passphrase = wallet_passphrase.is_default(),
            default_bls_passphrase = bls_passphrase.is_default(),
            "Node identity ready"
        );
        Ok(NodeIdentity {
            address,
            bls_keys,
            wallet_passphrase,
            bls_passphrase,
        })
    }
}

async fn reset_dir(dir: &Path) -> Result<(), KeyError> {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(io_err("clearing", dir)(e)),
    }
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(io_err("creating", dir))
}

/// `*.key` files in `dir`, sorted. A missing directory has none.
async fn key_files(dir: &Path) -> Result<Vec<PathBuf>, KeyError> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(io_err("listing", dir)(e)),
    };
    let mut files = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(io_err("listing", dir))?
    {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "key") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn io_err<'a>(
    action: &'static str,
    path: &'a Path,
) -> impl FnOnce(std::io::Error) -> KeyError + 'a {
    move |source| KeyError::Io {
        action,
        path: path.to_path_buf(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn passphrase_debug_never_shows_the_secret() {
        let secret = Passphrase::new("hunter2");
        assert_eq!(format!("{secret:?}"), "Passphrase(<redacted>)");
        assert_eq!(format!("{:?}", Passphrase::default()), "Passphrase(<default>)");
        assert!(Passphrase::default().is_default());
    }

    #[test]
    fn missing_keys_ignore_prefix_and_case() {
        let local = BlsKeySet::new(vec!["0xAAAA".into(), "bbbb".into(), "0xcccc".into()]);
        let on_chain = vec!["aaaa".to_string(), "0xCCCC".to_string()];
        assert_eq!(local.missing_from(&on_chain), vec!["bbbb"]);
    }

    #[test]
    fn passphrase_flags_prefer_interactive_then_explicit() {
        assert_eq!(
            PassphraseSource::from_flags(true, Some("x".into())),
            PassphraseSource::Prompt
        );
        assert_eq!(
            PassphraseSource::from_flags(false, Some("x".into())),
            PassphraseSource::Given(Passphrase::new("x"))
        );
        assert_eq!(PassphraseSource::from_flags(false, None), PassphraseSource::Default);
    }
}
