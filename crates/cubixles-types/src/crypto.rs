//! Keccak hashing and Ethereum address handling.

use sha3::{Digest, Keccak256};

use crate::Rejection;

pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// 20-byte account address. `Display` renders the EIP-55 checksummed form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address([u8; 20]);

impl Address {
    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Derive from the 64-byte uncompressed public key (without the `0x04` tag).
    pub fn from_public_key(uncompressed: &[u8]) -> Option<Self> {
        if uncompressed.len() != 64 {
            return None;
        }
        let hash = keccak256(uncompressed);
        let mut out = [0u8; 20];
        out.copy_from_slice(&hash[12..]);
        Some(Self(out))
    }

    /// Accepts `0x` + 40 hex chars. All-lower or all-upper input is taken as-is;
    /// mixed case must match the EIP-55 checksum.
    pub fn parse(input: &str) -> Result<Self, Rejection> {
        let hex_part = input
            .trim()
            .strip_prefix("0x")
            .or_else(|| input.trim().strip_prefix("0X"))
            .ok_or(Rejection::InvalidAddress)?;
        if hex_part.len() != 40 {
            return Err(Rejection::InvalidAddress);
        }
        let raw = hex::decode(hex_part).map_err(|_| Rejection::InvalidAddress)?;
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&raw);
        let address = Self(bytes);

        let has_lower = hex_part.chars().any(|c| c.is_ascii_lowercase());
        let has_upper = hex_part.chars().any(|c| c.is_ascii_uppercase());
        if has_lower && has_upper && address.to_checksum()[2..] != *hex_part {
            return Err(Rejection::InvalidAddress);
        }
        Ok(address)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn to_checksum(&self) -> String {
        let lower = hex::encode(self.0);
        let hash = keccak256(lower.as_bytes());
        let mut out = String::with_capacity(42);
        out.push_str("0x");
        for (i, c) in lower.chars().enumerate() {
            let nibble = if i % 2 == 0 {
                hash[i / 2] >> 4
            } else {
                hash[i / 2] & 0x0f
            };
            if c.is_ascii_alphabetic() && nibble >= 8 {
                out.push(c.to_ascii_uppercase());
            } else {
                out.push(c);
            }
        }
        out
    }

    /// Lowercase `0x…` form, used for JSON-RPC params and cache keys.
    pub fn to_lower_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_checksum())
    }
}

impl std::str::FromStr for Address {
    type Err = Rejection;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl serde::Serialize for Address {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_checksum())
    }
}

/// Decode `0x`-prefixed (or bare) hex into bytes.
pub fn decode_hex(input: &str) -> Option<Vec<u8>> {
    let trimmed = input.trim();
    let body = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    hex::decode(body).ok()
}
