//! Chain data source — current head and scoped log streams.
//!
//! The engine reads two things from a node: the head block number and the
//! logs for one (contract, signature, range) query. [`EthRpcClient`] speaks
//! JSON-RPC 2.0 over HTTP (`eth_blockNumber`, `eth_getLogs`); tests swap in
//! a scripted client behind the same trait.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use alloy_primitives::{Address, B256};
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use stakeindex_core::error::IndexError;

use crate::log::{parse_hex_u64, RawLog};

/// A finite, one-shot sequence of raw logs for one scanned range.
///
/// Dropping the stream releases whatever backs it; a new range requires a
/// new [`ChainClient::filter_logs`] call.
pub type LogStream = BoxStream<'static, Result<RawLog, IndexError>>;

/// Read-only boundary to an Ethereum-compatible node.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Current chain head block number.
    async fn head_block_number(&self) -> Result<u64, IndexError>;

    /// Logs emitted by `contract` with topic0 = `signature` in `[from, to]`,
    /// streamed in node order.
    async fn filter_logs(
        &self,
        contract: Address,
        signature: B256,
        from: u64,
        to: u64,
    ) -> Result<LogStream, IndexError>;
}

// ─── JSON-RPC wire types ─────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: Value,
    id: u64,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    result: Option<Value>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

/// Builds the single filter object `eth_getLogs` expects.
fn logs_params(contract: Address, signature: B256, from: u64, to: u64) -> Value {
    json!([{
        "address": contract.to_checksum(None),
        "topics": [signature.to_string()],
        "fromBlock": format!("0x{from:x}"),
        "toBlock": format!("0x{to:x}"),
    }])
}

// ─── HTTP client ─────────────────────────────────────────────────────────────

/// Configuration for [`EthRpcClient`].
#[derive(Debug, Clone)]
pub struct EthClientConfig {
    /// Upper bound on each RPC round trip. A timed-out call fails the pass;
    /// the scheduler retries on the next tick.
    pub request_timeout: Duration,
}

impl Default for EthClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// JSON-RPC client for `eth_blockNumber` and `eth_getLogs` over HTTP.
pub struct EthRpcClient {
    url: String,
    http: reqwest::Client,
    next_id: AtomicU64,
}

impl EthRpcClient {
    /// Create a new client for the given JSON-RPC endpoint URL.
    pub fn new(url: impl Into<String>, config: EthClientConfig) -> Result<Self, IndexError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| IndexError::Rpc(e.to_string()))?;

        Ok(Self {
            url: url.into(),
            http,
            next_id: AtomicU64::new(1),
        })
    }

    /// Create with default configuration.
    pub fn default_for(url: impl Into<String>) -> Result<Self, IndexError> {
        Self::new(url, EthClientConfig::default())
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value, IndexError> {
        let req = JsonRpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
        };

        let resp = self
            .http
            .post(&self.url)
            .json(&req)
            .send()
            .await
            .map_err(|e| IndexError::Rpc(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(IndexError::Rpc(format!("HTTP {status}: {body}")));
        }

        let resp: JsonRpcResponse = resp
            .json()
            .await
            .map_err(|e| IndexError::Rpc(e.to_string()))?;

        if let Some(err) = resp.error {
            return Err(IndexError::Rpc(format!(
                "JSON-RPC error {}: {}",
                err.code, err.message
            )));
        }
        Ok(resp.result.unwrap_or(Value::Null))
    }
}

#[async_trait]
impl ChainClient for EthRpcClient {
    async fn head_block_number(&self) -> Result<u64, IndexError> {
        let result = self.call("eth_blockNumber", json!([])).await?;
        let hex = result
            .as_str()
            .ok_or_else(|| IndexError::Rpc("eth_blockNumber: non-string result".into()))?;
        Ok(parse_hex_u64(hex))
    }

    async fn filter_logs(
        &self,
        contract: Address,
        signature: B256,
        from: u64,
        to: u64,
    ) -> Result<LogStream, IndexError> {
        let result = self
            .call("eth_getLogs", logs_params(contract, signature, from, to))
            .await?;
        let logs: Vec<RawLog> = serde_json::from_value(result)
            .map_err(|e| IndexError::Rpc(format!("eth_getLogs: {e}")))?;

        Ok(stream::iter(logs.into_iter().map(Ok)).boxed())
    }
}
