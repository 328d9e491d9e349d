use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::trace;

use crate::config::RPC_TIMEOUT_SECS;
use crate::error::RpcError;
use crate::types::{
    Block, Header, LatestHeaders, NodeMetadata, ShardEndpoint, ValidatorInformation,
};
use crate::ChainQuery;

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

/// JSON-RPC 2.0 over HTTP against any node endpoint.
#[derive(Debug)]
pub struct RpcClient {
    client: reqwest::Client,
    next_id: AtomicU64,
}

impl RpcClient {
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(RPC_TIMEOUT_SECS))
            .build()?;
        Ok(Self::with_client(client))
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            next_id: AtomicU64::new(1),
        }
    }

    /// Issue `method` and return the raw `result`, which may be JSON `null`.
    pub async fn call(
        &self,
        endpoint: &str,
        method: &str,
        params: Value,
    ) -> Result<Value, RpcError> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };
        trace!(%endpoint, %method, "rpc call");

        let response = self
            .client
            .post(endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|source| RpcError::Transport {
                endpoint: endpoint.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RpcError::Http {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(|source| RpcError::Transport {
            endpoint: endpoint.to_string(),
            source,
        })?;
        let decoded: JsonRpcResponse =
            serde_json::from_slice(&body).map_err(|source| RpcError::Decode {
                method: method.to_string(),
                source,
            })?;

        if let Some(error) = decoded.error {
            return Err(RpcError::Rpc {
                method: method.to_string(),
                code: error.code,
                message: error.message,
            });
        }
        Ok(decoded.result.unwrap_or(Value::Null))
    }

    /// Like [`RpcClient::call`] but requires a non-null result of type `T`.
    pub async fn call_typed<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        method: &str,
        params: Value,
    ) -> Result<T, RpcError> {
        let result = self.call(endpoint, method, params).await?;
        if result.is_null() {
            return Err(RpcError::MissingResult {
                method: method.to_string(),
            });
        }
        serde_json::from_value(result).map_err(|source| RpcError::Decode {
            method: method.to_string(),
            source,
        })
    }
}

#[async_trait::async_trait]
impl ChainQuery for RpcClient {
    async fn latest_headers(&self, endpoint: &str) -> Result<LatestHeaders, RpcError> {
        self.call_typed(endpoint, "hmy_getLatestChainHeaders", json!([]))
            .await
    }

    async fn latest_header(&self, endpoint: &str) -> Result<Header, RpcError> {
        self.call_typed(endpoint, "hmy_latestHeader", json!([])).await
    }

    async fn block_by_number(
        &self,
        endpoint: &str,
        height: u64,
    ) -> Result<Option<Block>, RpcError> {
        let method = "hmyv2_getBlockByNumber";
        let result = self
            .call(
                endpoint,
                method,
                json!([height, {"fullTx": false, "inclTx": false, "InclStaking": false}]),
            )
            .await?;
        if result.is_null() {
            return Ok(None);
        }
        serde_json::from_value(result)
            .map(Some)
            .map_err(|source| RpcError::Decode {
                method: method.to_string(),
                source,
            })
    }

    async fn sharding_structure(&self, endpoint: &str) -> Result<Vec<ShardEndpoint>, RpcError> {
        self.call_typed(endpoint, "hmy_getShardingStructure", json!([]))
            .await
    }

    async fn staking_epoch(&self, endpoint: &str) -> Result<u64, RpcError> {
        let metadata: NodeMetadata = self
            .call_typed(endpoint, "hmy_getNodeMetadata", json!([]))
            .await?;
        Ok(metadata.chain_config.staking_epoch)
    }

    async fn validator_information(
        &self,
        endpoint: &str,
        address: &str,
    ) -> Result<ValidatorInformation, RpcError> {
        self.call_typed(endpoint, "hmy_getValidatorInformation", json!([address]))
            .await
    }
}
