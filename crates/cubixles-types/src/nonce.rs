//! Nonce wire format: `<hex-rand>.<issuedAtMs>.<ttlMs>.<base64url-hmac>`.
//!
//! Clients parse the expiry out of this string, so the shape is fixed.

use crate::Rejection;

/// A parsed (not yet authenticated) nonce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NonceToken<'a> {
    pub rand: &'a str,
    pub issued_at: u64,
    pub ttl_ms: u64,
    pub signature: &'a str,
}

impl<'a> NonceToken<'a> {
    pub fn parse(nonce: &'a str) -> Result<Self, Rejection> {
        if nonce.is_empty() {
            return Err(Rejection::MissingNonce);
        }
        let mut parts = nonce.split('.');
        let (Some(rand), Some(issued_raw), Some(ttl_raw), Some(signature), None) = (
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
        ) else {
            return Err(Rejection::MalformedNonce);
        };
        if rand.is_empty() || signature.is_empty() {
            return Err(Rejection::MalformedNonce);
        }
        let issued_at = issued_raw.parse::<u64>().map_err(|_| Rejection::MalformedNonce)?;
        let ttl_ms = ttl_raw.parse::<u64>().map_err(|_| Rejection::MalformedNonce)?;
        // An expiry past u64 range cannot have been issued by us.
        issued_at.checked_add(ttl_ms).ok_or(Rejection::MalformedNonce)?;

        Ok(Self {
            rand,
            issued_at,
            ttl_ms,
            signature,
        })
    }

    /// The HMAC-covered prefix: `rand.issuedAt.ttlMs`.
    pub fn payload(&self) -> String {
        signing_payload(self.rand, self.issued_at, self.ttl_ms)
    }

    pub fn expires_at(&self) -> u64 {
        self.issued_at.saturating_add(self.ttl_ms)
    }
}

pub fn signing_payload(rand: &str, issued_at: u64, ttl_ms: u64) -> String {
    format!("{rand}.{issued_at}.{ttl_ms}")
}

pub fn format_nonce(payload: &str, signature: &str) -> String {
    format!("{payload}.{signature}")
}
