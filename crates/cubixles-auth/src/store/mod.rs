//! Key-value backends shared by the rate limiter, nonce replay set, and cache.
//!
//! ```text
//! ratelimit:{key}   → token bucket {tokens, lastRefill} (sliding TTL)
//! nonce:{nonce}     → replay marker, set-if-absent (TTL = nonce lifetime)
//! {cache key}       → opaque JSON string (optional TTL)
//! ```
//!
//! [`RedisStore`] keys are additionally prefixed with the deployment prefix.

mod fallback;
mod memory;
mod redis_store;
#[cfg(test)]
pub(crate) mod test_support;

pub use self::fallback::FallbackStore;
pub use self::memory::MemoryStore;
pub use self::redis_store::RedisStore;

use async_trait::async_trait;

use crate::rate_limit::{RateLimitDecision, RateLimitOptions};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Redis,
    Memory,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Redis => "redis",
            BackendKind::Memory => "memory",
        }
    }
}

/// Store error type.
#[derive(Debug)]
pub enum StoreError {
    /// Command failed or connection could not be established.
    Backend(String),
    /// Round trip exceeded the configured timeout.
    Timeout,
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Backend(msg) => write!(f, "store backend error: {msg}"),
            StoreError::Timeout => write!(f, "store round trip timed out"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<redis::RedisError> for StoreError {
    fn from(e: redis::RedisError) -> Self {
        StoreError::Backend(e.to_string())
    }
}

#[async_trait]
pub trait Store: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Atomic refill-and-consume on the bucket at `key`, refreshing its TTL.
    async fn take_token(
        &self,
        key: &str,
        options: &RateLimitOptions,
        now_ms: u64,
    ) -> Result<RateLimitDecision, StoreError>;

    /// Insert `key` unless present. `Ok(false)` means it already existed.
    async fn insert_if_absent(&self, key: &str, ttl_ms: u64) -> Result<bool, StoreError>;

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Overwrite `key`. `None` or zero TTL stores without expiry.
    async fn set(&self, key: &str, value: &str, ttl_ms: Option<u64>) -> Result<(), StoreError>;

    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}
