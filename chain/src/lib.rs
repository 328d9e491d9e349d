//! Read-only chain queries against the local node and reference endpoints.

pub mod config;
pub mod error;
pub mod rpc;
pub mod types;

pub use error::RpcError;
pub use rpc::RpcClient;
pub use types::{
    Block, ChainHeader, Header, LatestHeaders, NodeMetadata, ShardEndpoint, ValidatorInformation,
    ValidatorRecord,
};

/// Read-only RPC surface of a node.
///
/// Every call names its endpoint so the same client serves the local node,
/// the home shard and the beacon chain. Abstracted so the supervisory logic
/// can be driven by scripted chains in tests.
#[async_trait::async_trait]
pub trait ChainQuery: Send + Sync {
    /// Latest shard-chain and beacon-chain headers known to the node.
    async fn latest_headers(&self, endpoint: &str) -> Result<LatestHeaders, RpcError>;

    async fn latest_header(&self, endpoint: &str) -> Result<Header, RpcError>;

    /// Block at `height`, or `None` when the node does not have it.
    async fn block_by_number(&self, endpoint: &str, height: u64) -> Result<Option<Block>, RpcError>;

    async fn sharding_structure(&self, endpoint: &str) -> Result<Vec<ShardEndpoint>, RpcError>;

    /// First epoch at which create-validator transactions are accepted.
    async fn staking_epoch(&self, endpoint: &str) -> Result<u64, RpcError>;

    async fn validator_information(
        &self,
        endpoint: &str,
        address: &str,
    ) -> Result<ValidatorInformation, RpcError>;

    async fn current_epoch(&self, endpoint: &str) -> Result<u64, RpcError> {
        Ok(self.latest_header(endpoint).await?.epoch)
    }

    /// HTTP endpoint of `shard` according to `endpoint`'s sharding structure.
    async fn shard_endpoint(&self, endpoint: &str, shard: u32) -> Result<String, RpcError> {
        self.sharding_structure(endpoint)
            .await?
            .into_iter()
            .find(|s| s.shard_id == shard)
            .map(|s| s.http)
            .ok_or(RpcError::UnknownShard { shard })
    }
}
