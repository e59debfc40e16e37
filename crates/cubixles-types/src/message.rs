//! EIP-712 pin authorization message.
//!
//! Everything in the message is derived from the nonce itself, so there is no
//! second source of truth for issue/expiry times.

use serde_json::{json, Value};

use crate::crypto::keccak256;
use crate::nonce::NonceToken;
use crate::Rejection;

pub const PIN_DOMAIN_NAME: &str = "cubixles_";
pub const PIN_DOMAIN_VERSION: &str = "1";
pub const PIN_STATEMENT: &str = "cubixles_ wants you to authorize metadata pinning.";
pub const PIN_PRIMARY_TYPE: &str = "MetadataPin";

const DOMAIN_TYPE: &str = "EIP712Domain(string name,string version,uint256 chainId)";
const PIN_TYPE: &str =
    "MetadataPin(string statement,string nonce,uint256 issuedAt,uint256 expiresAt)";

/// Mainnet, Base, Sepolia.
pub const SUPPORTED_CHAIN_IDS: [u64; 3] = [1, 8453, 11_155_111];

pub fn is_supported_chain(chain_id: u64) -> bool {
    SUPPORTED_CHAIN_IDS.contains(&chain_id)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinMessage {
    pub chain_id: u64,
    pub nonce: String,
    pub issued_at: u64,
    pub expires_at: u64,
}

impl PinMessage {
    /// Build the message by re-parsing the nonce. Does not authenticate it.
    pub fn from_nonce(nonce: &str, chain_id: u64) -> Result<Self, Rejection> {
        let token = NonceToken::parse(nonce)?;
        Ok(Self {
            chain_id,
            nonce: nonce.to_string(),
            issued_at: token.issued_at,
            expires_at: token.expires_at(),
        })
    }

    pub fn domain_separator(&self) -> [u8; 32] {
        let mut buf = Vec::with_capacity(32 * 4);
        buf.extend_from_slice(&keccak256(DOMAIN_TYPE.as_bytes()));
        buf.extend_from_slice(&keccak256(PIN_DOMAIN_NAME.as_bytes()));
        buf.extend_from_slice(&keccak256(PIN_DOMAIN_VERSION.as_bytes()));
        buf.extend_from_slice(&encode_uint(self.chain_id));
        keccak256(&buf)
    }

    pub fn struct_hash(&self) -> [u8; 32] {
        let mut buf = Vec::with_capacity(32 * 5);
        buf.extend_from_slice(&keccak256(PIN_TYPE.as_bytes()));
        buf.extend_from_slice(&keccak256(PIN_STATEMENT.as_bytes()));
        buf.extend_from_slice(&keccak256(self.nonce.as_bytes()));
        buf.extend_from_slice(&encode_uint(self.issued_at));
        buf.extend_from_slice(&encode_uint(self.expires_at));
        keccak256(&buf)
    }

    /// `0x1901 ‖ domainSeparator ‖ structHash` (66 bytes).
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(66);
        out.extend_from_slice(&[0x19, 0x01]);
        out.extend_from_slice(&self.domain_separator());
        out.extend_from_slice(&self.struct_hash());
        out
    }

    pub fn digest(&self) -> [u8; 32] {
        keccak256(&self.encode())
    }

    /// `eth_signTypedData_v4` payload for wallets.
    pub fn typed_data(&self) -> Value {
        json!({
            "types": {
                "EIP712Domain": [
                    { "name": "name", "type": "string" },
                    { "name": "version", "type": "string" },
                    { "name": "chainId", "type": "uint256" },
                ],
                PIN_PRIMARY_TYPE: [
                    { "name": "statement", "type": "string" },
                    { "name": "nonce", "type": "string" },
                    { "name": "issuedAt", "type": "uint256" },
                    { "name": "expiresAt", "type": "uint256" },
                ],
            },
            "primaryType": PIN_PRIMARY_TYPE,
            "domain": {
                "name": PIN_DOMAIN_NAME,
                "version": PIN_DOMAIN_VERSION,
                "chainId": self.chain_id,
            },
            "message": {
                "statement": PIN_STATEMENT,
                "nonce": self.nonce,
                "issuedAt": self.issued_at,
                "expiresAt": self.expires_at,
            },
        })
    }
}

/// ABI `uint256` word for a value that fits in 64 bits.
pub fn encode_uint(value: u64) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[24..].copy_from_slice(&value.to_be_bytes());
    word
}
