//! Redis-backed store shared by every gateway instance.
//!
//! The bucket update runs as a Lua script so read-refill-consume-write is a
//! single atomic step on the server. The connection is established lazily,
//! with a single attempt per call, and then reused; [`ConnectionManager`] reconnects on its own after a drop.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use tokio::sync::OnceCell;
use tracing::debug;

use super::{BackendKind, Store, StoreError};
use crate::rate_limit::{RateLimitDecision, RateLimitOptions};

/// Mirrors [`crate::rate_limit::TokenBucket::take`].
///
/// KEYS[1] bucket key. ARGV: capacity, refill per second, now (ms), ttl (ms).
/// Returns `{allowed, floor(tokens), retryAfterSecs}`.
const TOKEN_BUCKET_SCRIPT: &str = r#"
local key = KEYS[1]
local capacity = tonumber(ARGV[1])
local refill_per_sec = tonumber(ARGV[2])
local now = tonumber(ARGV[3])
local ttl = tonumber(ARGV[4])

local data = redis.call('HMGET', key, 'tokens', 'lastRefill')
local tokens = tonumber(data[1])
local last_refill = tonumber(data[2])
if tokens == nil or last_refill == nil then
  tokens = capacity
  last_refill = now
end

local elapsed = math.max(0, now - last_refill)
tokens = math.min(capacity, tokens + elapsed * refill_per_sec / 1000)

local allowed = 0
local retry_after = 0
if tokens >= 1 then
  allowed = 1
  tokens = tokens - 1
elseif refill_per_sec > 0 then
  retry_after = math.ceil((1 - tokens) / refill_per_sec)
end

redis.call('HSET', key, 'tokens', tostring(tokens), 'lastRefill', tostring(now))
redis.call('PEXPIRE', key, ttl)

local remaining = 0
if allowed == 1 then
  remaining = math.floor(math.max(tokens, 0))
end
return { allowed, remaining, retry_after }
"#;

pub struct RedisStore {
    client: redis::Client,
    connection: OnceCell<ConnectionManager>,
    prefix: String,
    timeout: Duration,
    bucket_script: redis::Script,
}

impl RedisStore {
    /// Parses `url` without connecting.
    pub fn open(url: &str, prefix: &str, timeout: Duration) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)?;
        Ok(Self {
            client,
            connection: OnceCell::new(),
            prefix: prefix.trim_end_matches(':').to_string(),
            timeout,
            bucket_script: redis::Script::new(TOKEN_BUCKET_SCRIPT),
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub(crate) fn namespaced(&self, key: &str) -> String {
        if self.prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}:{}", self.prefix, key)
        }
    }

    async fn connection(&self) -> Result<ConnectionManager, StoreError> {
        let manager = self
            .connection
            .get_or_try_init(|| async {
                debug!(prefix = %self.prefix, "Connecting to Redis");
                // One attempt per call; the caller's fallback handles failure.
                let config = ConnectionManagerConfig::new().set_number_of_retries(0);
                self.client.get_connection_manager_with_config(config).await
            })
            .await?;
        Ok(manager.clone())
    }

    /// Bound a round trip (including the first connect) by the store timeout.
    async fn bounded<T, F>(&self, fut: F) -> Result<T, StoreError>
    where
        F: std::future::Future<Output = Result<T, StoreError>>,
    {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| StoreError::Timeout)?
    }
}

#[async_trait]
impl Store for RedisStore {
    fn kind(&self) -> BackendKind {
        BackendKind::Redis
    }

    async fn take_token(
        &self,
        key: &str,
        options: &RateLimitOptions,
        now_ms: u64,
    ) -> Result<RateLimitDecision, StoreError> {
        let key = self.namespaced(key);
        self.bounded(async {
            let mut con = self.connection().await?;
            let (allowed, remaining, retry_after): (i64, i64, i64) = self
                .bucket_script
                .key(&key)
                .arg(options.capacity)
                .arg(options.refill_per_sec)
                .arg(now_ms)
                .arg(options.ttl_ms)
                .invoke_async(&mut con)
                .await?;
            Ok(RateLimitDecision {
                ok: allowed == 1,
                remaining: u32::try_from(remaining.max(0)).unwrap_or(u32::MAX),
                retry_after: u64::try_from(retry_after.max(0)).unwrap_or_default(),
            })
        })
        .await
    }

    async fn insert_if_absent(&self, key: &str, ttl_ms: u64) -> Result<bool, StoreError> {
        let key = self.namespaced(key);
        self.bounded(async {
            let mut con = self.connection().await?;
            let reply: Option<String> = redis::cmd("SET")
                .arg(&key)
                .arg("1")
                .arg("NX")
                .arg("PX")
                .arg(ttl_ms.max(1))
                .query_async(&mut con)
                .await?;
            Ok(reply.is_some())
        })
        .await
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let key = self.namespaced(key);
        self.bounded(async {
            let mut con = self.connection().await?;
            let value: Option<String> = redis::cmd("GET").arg(&key).query_async(&mut con).await?;
            Ok(value)
        })
        .await
    }

    async fn set(&self, key: &str, value: &str, ttl_ms: Option<u64>) -> Result<(), StoreError> {
        let key = self.namespaced(key);
        self.bounded(async {
            let mut con = self.connection().await?;
            let mut cmd = redis::cmd("SET");
            cmd.arg(&key).arg(value);
            if let Some(ttl) = ttl_ms.filter(|ttl| *ttl > 0) {
                cmd.arg("PX").arg(ttl);
            }
            let _: () = cmd.query_async(&mut con).await?;
            Ok(())
        })
        .await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let key = self.namespaced(key);
        self.bounded(async {
            let mut con = self.connection().await?;
            let _: i64 = redis::cmd("DEL").arg(&key).query_async(&mut con).await?;
            Ok(())
        })
        .await
    }
}
