//! Response types for the gateway API.

use cubixles_types::Address;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Response from the health endpoint.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub backend: &'static str,
    pub uptime_secs: u64,
    pub requests: u64,
}

/// Response from the nonce endpoint.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NonceResponse {
    pub nonce: String,
    pub expires_at: u64,
    /// EIP-712 payload the wallet signs.
    pub typed_data: Value,
}

/// Response from the auth endpoint.
#[derive(Serialize)]
pub struct AuthResponse {
    pub success: bool,
    pub address: Address,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WalletKind {
    Eoa,
    Contract,
}

/// Response from the wallet lookup endpoint.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletKindResponse {
    pub address: Address,
    pub chain_id: u64,
    pub kind: WalletKind,
    pub cached: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainQuery {
    pub chain_id: Option<u64>,
}
