use thiserror::Error;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{endpoint} answered HTTP {status}")]
    Http { endpoint: String, status: u16 },

    #[error("{method} returned RPC error {code}: {message}")]
    Rpc {
        method: String,
        code: i64,
        message: String,
    },

    #[error("malformed {method} response: {source}")]
    Decode {
        method: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{method} response carried no result")]
    MissingResult { method: String },

    #[error("shard {shard} not present in sharding structure")]
    UnknownShard { shard: u32 },
}

impl RpcError {
    /// Connection refused / reset / DNS failures: the endpoint is not up (yet).
    pub fn is_connection_error(&self) -> bool {
        match self {
            RpcError::Transport { source, .. } => {
                source.is_connect() || source.is_timeout()
            }
            _ => false,
        }
    }

    /// Failures worth polling through: the endpoint may answer properly on
    /// the next attempt. JSON-RPC errors and unknown shards are answers.
    pub fn is_transient(&self) -> bool {
        match self {
            RpcError::Transport { .. }
            | RpcError::Decode { .. }
            | RpcError::MissingResult { .. } => true,
            RpcError::Http { status, .. } => *status >= 500,
            RpcError::Rpc { .. } | RpcError::UnknownShard { .. } => false,
        }
    }
}
