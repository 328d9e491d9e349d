#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};

use chain::{
    Block, ChainHeader, ChainQuery, Header, LatestHeaders, RpcError, ShardEndpoint,
    ValidatorInformation,
};
use parking_lot::Mutex;

pub const LOCAL: &str = "http://localhost:9500/";
pub const REFERENCE: &str = "https://api.s0.example/";

/// One scripted answer of the local node's header endpoint.
#[derive(Clone, Copy, Debug)]
pub enum LocalHeaders {
    Refused,
    Epochs { shard: u64, beacon: u64 },
}

/// Chain whose answers are replayed from queues; the last entry of each
/// queue repeats forever.
#[derive(Default)]
pub struct ScriptedChain {
    local_headers: Mutex<VecDeque<LocalHeaders>>,
    reference_epochs: Mutex<VecDeque<u64>>,
    local_heights: Mutex<VecDeque<u64>>,
    blocks: Mutex<HashMap<String, Option<String>>>,
    reference_failures: Mutex<usize>,
    pub header_calls: Mutex<usize>,
}

impl ScriptedChain {
    pub fn with_local_headers(self, answers: impl IntoIterator<Item = LocalHeaders>) -> Self {
        self.local_headers.lock().extend(answers);
        self
    }

    pub fn with_reference_epochs(self, epochs: impl IntoIterator<Item = u64>) -> Self {
        self.reference_epochs.lock().extend(epochs);
        self
    }

    /// The next `count` reference header requests come back without a result.
    pub fn with_reference_failures(self, count: usize) -> Self {
        *self.reference_failures.lock() = count;
        self
    }

    pub fn with_local_heights(self, heights: impl IntoIterator<Item = u64>) -> Self {
        self.local_heights.lock().extend(heights);
        self
    }

    pub fn with_block_hash(self, endpoint: &str, hash: Option<&str>) -> Self {
        self.blocks
            .lock()
            .insert(endpoint.to_string(), hash.map(str::to_string));
        self
    }
}

fn next<T: Copy>(queue: &Mutex<VecDeque<T>>) -> T {
    let mut queue = queue.lock();
    if queue.len() > 1 {
        queue.pop_front().unwrap()
    } else {
        *queue.front().expect("scripted queue is empty")
    }
}

/// A genuine connection-refused error: `reqwest::Error` cannot be built by
/// hand, so connect to a port that was just closed.
pub fn refused() -> RpcError {
    let source = std::thread::spawn(|| {
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
            .block_on(async move {
                reqwest::Client::new()
                    .get(format!("http://127.0.0.1:{port}/"))
                    .send()
                    .await
                    .unwrap_err()
            })
    })
    .join()
    .unwrap();
    RpcError::Transport {
        endpoint: LOCAL.to_string(),
        source,
    }
}

#[async_trait::async_trait]
impl ChainQuery for ScriptedChain {
    async fn latest_headers(&self, _endpoint: &str) -> Result<LatestHeaders, RpcError> {
        *self.header_calls.lock() += 1;
        match next(&self.local_headers) {
            LocalHeaders::Refused => Err(refused()),
            LocalHeaders::Epochs { shard, beacon } => Ok(LatestHeaders {
                shard_chain_header: ChainHeader {
                    epoch: shard,
                    ..Default::default()
                },
                beacon_chain_header: ChainHeader {
                    epoch: beacon,
                    ..Default::default()
                },
            }),
        }
    }

    async fn latest_header(&self, endpoint: &str) -> Result<Header, RpcError> {
        if endpoint == LOCAL {
            Ok(Header {
                block_number: next(&self.local_heights),
                ..Default::default()
            })
        } else {
            let mut failures = self.reference_failures.lock();
            if *failures > 0 {
                *failures -= 1;
                return Err(RpcError::MissingResult {
                    method: "hmy_latestHeader".into(),
                });
            }
            Ok(Header {
                epoch: next(&self.reference_epochs),
                ..Default::default()
            })
        }
    }

    async fn block_by_number(
        &self,
        endpoint: &str,
        _height: u64,
    ) -> Result<Option<Block>, RpcError> {
        Ok(self.blocks.lock().get(endpoint).cloned().map(|hash| Block {
            hash,
            ..Default::default()
        }))
    }

    async fn sharding_structure(&self, _endpoint: &str) -> Result<Vec<ShardEndpoint>, RpcError> {
        Ok(vec![])
    }

    async fn staking_epoch(&self, _endpoint: &str) -> Result<u64, RpcError> {
        Ok(0)
    }

    async fn validator_information(
        &self,
        _endpoint: &str,
        _address: &str,
    ) -> Result<ValidatorInformation, RpcError> {
        Ok(ValidatorInformation::default())
    }
}
