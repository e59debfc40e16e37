//! Read-only chain access for contract-wallet verification.

use std::time::Duration;

use async_trait::async_trait;
use cubixles_types::{decode_hex, Address};
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug)]
pub enum RpcError {
    /// Request never produced a response (connect, timeout, HTTP status).
    Transport(String),
    /// Node answered with a JSON-RPC error (includes execution reverts).
    Rpc(String),
    /// Response was not a hex result.
    Decode(String),
}

impl std::fmt::Display for RpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RpcError::Transport(msg) => write!(f, "RPC transport error: {msg}"),
            RpcError::Rpc(msg) => write!(f, "RPC error: {msg}"),
            RpcError::Decode(msg) => write!(f, "RPC decode error: {msg}"),
        }
    }
}

impl std::error::Error for RpcError {}

#[async_trait]
pub trait ChainReader: Send + Sync {
    /// Deployed bytecode at `address`; empty for accounts without code.
    async fn get_code(&self, address: &Address) -> Result<Vec<u8>, RpcError>;

    /// `eth_call` against the latest block.
    async fn call(&self, to: &Address, data: &[u8]) -> Result<Vec<u8>, RpcError>;
}

/// Ethereum JSON-RPC over HTTP.
pub struct JsonRpcReader {
    http: reqwest::Client,
    url: String,
}

#[derive(Deserialize)]
struct RpcResponse {
    result: Option<Value>,
    error: Option<RpcErrorBody>,
}

#[derive(Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

impl JsonRpcReader {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, RpcError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .pool_max_idle_per_host(4)
            .build()
            .map_err(|e| RpcError::Transport(format!("client build failed: {e}")))?;
        Ok(Self {
            http,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn request(&self, method: &str, params: Value) -> Result<Vec<u8>, RpcError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });
        let response = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| RpcError::Transport(format!("{method}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RpcError::Transport(format!("{method}: HTTP {status}")));
        }

        let parsed: RpcResponse = response
            .json()
            .await
            .map_err(|e| RpcError::Decode(format!("{method}: {e}")))?;
        if let Some(err) = parsed.error {
            return Err(RpcError::Rpc(format!("{method}: {} ({})", err.message, err.code)));
        }
        let result = parsed
            .result
            .ok_or_else(|| RpcError::Decode(format!("{method}: missing result")))?;
        let hex = result
            .as_str()
            .ok_or_else(|| RpcError::Decode(format!("{method}: result is not a string")))?;
        decode_hex(hex).ok_or_else(|| RpcError::Decode(format!("{method}: result is not hex")))
    }
}

#[async_trait]
impl ChainReader for JsonRpcReader {
    async fn get_code(&self, address: &Address) -> Result<Vec<u8>, RpcError> {
        self.request("eth_getCode", json!([address.to_lower_hex(), "latest"]))
            .await
    }

    async fn call(&self, to: &Address, data: &[u8]) -> Result<Vec<u8>, RpcError> {
        let tx = json!({
            "to": to.to_lower_hex(),
            "data": format!("0x{}", hex::encode(data)),
        });
        self.request("eth_call", json!([tx, "latest"])).await
    }
}
