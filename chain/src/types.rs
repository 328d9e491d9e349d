use serde::{Deserialize, Serialize};

/// Summary header as returned by `hmy_latestHeader`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Header {
    #[serde(default)]
    pub block_hash: Option<String>,
    pub block_number: u64,
    #[serde(rename = "shardID", default)]
    pub shard_id: u32,
    pub epoch: u64,
    #[serde(default)]
    pub view_id: Option<u64>,
}

/// One side of `hmy_getLatestChainHeaders`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ChainHeader {
    #[serde(default)]
    pub block_header_hash: Option<String>,
    #[serde(default)]
    pub block_number: u64,
    pub epoch: u64,
    #[serde(default)]
    pub shard_id: u32,
}

/// Headers of the shard chain a node follows and of the beacon chain it
/// tracks alongside.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct LatestHeaders {
    pub shard_chain_header: ChainHeader,
    pub beacon_chain_header: ChainHeader,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    #[serde(default)]
    pub hash: Option<String>,
    #[serde(default)]
    pub number: Option<u64>,
    #[serde(default)]
    pub epoch: Option<u64>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardEndpoint {
    #[serde(rename = "shardID")]
    pub shard_id: u32,
    pub http: String,
    #[serde(default)]
    pub ws: Option<String>,
    #[serde(default)]
    pub current: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ChainConfig {
    pub staking_epoch: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct NodeMetadata {
    pub chain_config: ChainConfig,
    #[serde(default)]
    pub network: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ValidatorRecord {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub bls_public_keys: Vec<String>,
}

/// On-chain view of a validator (`hmy_getValidatorInformation`, or the
/// `result` of `hmy blockchain validator information`).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ValidatorInformation {
    pub validator: ValidatorRecord,
    #[serde(default)]
    pub epos_status: String,
    #[serde(default)]
    pub current_epoch_performance: serde_json::Value,
    #[serde(default)]
    pub active_status: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn decodes_latest_chain_headers() {
        let raw = r#"{
            "beacon-chain-header": {"block-header-hash": "0x01", "block-number": 90, "epoch": 7, "shard-id": 0},
            "shard-chain-header": {"block-header-hash": "0x02", "block-number": 44, "epoch": 7, "shard-id": 1}
        }"#;
        let headers: LatestHeaders = serde_json::from_str(raw).unwrap();
        assert_eq!(headers.beacon_chain_header.epoch, 7);
        assert_eq!(headers.shard_chain_header.shard_id, 1);
        assert_eq!(headers.shard_chain_header.block_number, 44);
    }

    #[test]
    fn decodes_validator_information() {
        let raw = r#"{
            "validator": {"address": "one1abc", "bls-public-keys": ["0xaa", "0xbb"]},
            "epos-status": "currently elected",
            "current-epoch-performance": {"current-epoch-signing-percent": {"current-epoch-signed": 10}}
        }"#;
        let info: ValidatorInformation = serde_json::from_str(raw).unwrap();
        assert_eq!(info.validator.bls_public_keys, vec!["0xaa", "0xbb"]);
        assert_eq!(info.epos_status, "currently elected");
        assert!(info.current_epoch_performance.is_object());
    }

    #[test]
    fn block_without_hash_decodes() {
        let block: Block = serde_json::from_str("{}").unwrap();
        assert_eq!(block.hash, None);
    }
}
