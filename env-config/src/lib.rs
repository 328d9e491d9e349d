//! Network presets and the on-disk layout shared with the node bootstrap
//! script and sibling container tooling.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Bootstrap script materialized into the node directory on every start.
pub const NODE_SCRIPT_SOURCE: &str =
    "https://raw.githubusercontent.com/harmony-one/harmony/master/scripts/node.sh";

/// Process name swept by `killall` when the node is torn down.
pub const NODE_BINARY_NAME: &str = "harmony";

/// RPC endpoint of the locally launched node.
pub const LOCAL_ENDPOINT: &str = "http://localhost:9500/";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Network {
    Staking,
    Partner,
    Stress,
}

impl Network {
    pub const ALL: [Network; 3] = [Network::Staking, Network::Partner, Network::Stress];

    /// Value handed to `node.sh -N`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Staking => "staking",
            Network::Partner => "partner",
            Network::Stress => "stress",
        }
    }

    /// Shard 0 endpoint used for staking transactions and as sync reference.
    pub fn default_beacon_endpoint(&self) -> &'static str {
        match self {
            Network::Staking => "https://api.s0.os.hmny.io/",
            Network::Partner => "https://api.s0.ps.hmny.io/",
            Network::Stress => "https://api.s0.stn.hmny.io/",
        }
    }
}

impl Default for Network {
    fn default() -> Self {
        Network::Staking
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownNetwork(pub String);

impl fmt::Display for UnknownNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown network '{}', expected one of: staking, partner, stress",
            self.0
        )
    }
}

impl std::error::Error for UnknownNetwork {}

impl FromStr for Network {
    type Err = UnknownNetwork;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Network::ALL
            .into_iter()
            .find(|n| n.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownNetwork(s.to_string()))
    }
}

/// Fixed path conventions of the container image.
#[derive(Clone, Debug)]
pub struct NodePaths {
    /// Working directory of `node.sh` and the node binary.
    pub node_dir: PathBuf,
    /// Directory of the staking CLI; interactive staking calls run here so
    /// the CLI finds BLS key files next to itself.
    pub cli_dir: PathBuf,
    /// BLS keys (and `.pass` files) handed to `node.sh -f`.
    pub bls_key_dir: PathBuf,
    /// Operator supplied `*.key` files to import.
    pub imported_bls_key_dir: PathBuf,
    pub node_stdout_log: PathBuf,
    pub node_stderr_log: PathBuf,
    /// Directory holding the `.val_address`, `.wallet_passphrase`, ... files.
    pub shared_info_dir: PathBuf,
    /// Scratch file used to pass the BLS passphrase to key import calls.
    pub bls_pass_scratch: PathBuf,
}

impl NodePaths {
    /// Layout rooted at `root` (`/` inside the container).
    pub fn rooted_at(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        let node_dir = root.join("root/node");
        let logs = node_dir.join("node_sh_logs");
        NodePaths {
            cli_dir: root.join("root/bin"),
            bls_key_dir: node_dir.join("bls_keys"),
            imported_bls_key_dir: root.join("root/harmony_bls_keys"),
            node_stdout_log: logs.join("out.log"),
            node_stderr_log: logs.join("err.log"),
            shared_info_dir: root.to_path_buf(),
            bls_pass_scratch: root.join("tmp/bls_pass"),
            node_dir,
        }
    }

    pub fn node_script(&self) -> PathBuf {
        self.node_dir.join("node.sh")
    }

    pub fn shared_file(&self, name: &str) -> PathBuf {
        self.shared_info_dir.join(name)
    }

    /// Passphrase file handed to the staking CLI via `--passphrase-file`.
    pub fn wallet_passphrase_file(&self) -> PathBuf {
        self.shared_file(".wallet_passphrase")
    }
}

impl Default for NodePaths {
    fn default() -> Self {
        NodePaths::rooted_at("/")
    }
}
