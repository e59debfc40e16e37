//! Per-key token-bucket admission control.
//!
//! Buckets refill continuously at `refill_per_sec` up to `capacity`; each
//! admitted request consumes exactly one token. The arithmetic lives in
//! [`TokenBucket::take`] and is mirrored by the Redis script so both backends
//! agree on every decision.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::metrics::{Metrics, METRICS};
use crate::store::Store;

/// Bucket parameters. Not clamped: `capacity < 1` rejects every request once
/// the initial allowance is gone, `refill_per_sec = 0` makes it a fixed quota.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimitOptions {
    pub capacity: f64,
    pub refill_per_sec: f64,
    /// Idle buckets expire after this long.
    pub ttl_ms: u64,
    /// Local fallback table size before pruning.
    pub max_entries: usize,
}

impl RateLimitOptions {
    pub const DEFAULT_TTL_MS: u64 = 5 * 60 * 1000;
    pub const DEFAULT_MAX_ENTRIES: usize = 2000;

    pub const fn new(capacity: f64, refill_per_sec: f64) -> Self {
        Self {
            capacity,
            refill_per_sec,
            ttl_ms: Self::DEFAULT_TTL_MS,
            max_entries: Self::DEFAULT_MAX_ENTRIES,
        }
    }
}

impl Default for RateLimitOptions {
    fn default() -> Self {
        Self::new(10.0, 1.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitDecision {
    pub ok: bool,
    pub remaining: u32,
    /// Whole seconds until one token is available; 0 when admitted or when the
    /// bucket never refills.
    pub retry_after: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TokenBucket {
    pub tokens: f64,
    pub last_refill: u64,
    pub last_seen: u64,
}

impl TokenBucket {
    pub fn full(capacity: f64, now_ms: u64) -> Self {
        Self {
            tokens: capacity,
            last_refill: now_ms,
            last_seen: now_ms,
        }
    }

    /// Refill for the elapsed time, then try to consume one token.
    pub fn take(&mut self, options: &RateLimitOptions, now_ms: u64) -> RateLimitDecision {
        let elapsed = now_ms.saturating_sub(self.last_refill) as f64;
        let refill = elapsed * options.refill_per_sec / 1000.0;
        self.tokens = (self.tokens + refill).min(options.capacity);
        self.last_refill = now_ms;
        self.last_seen = now_ms;

        if self.tokens < 1.0 {
            return RateLimitDecision {
                ok: false,
                remaining: 0,
                retry_after: retry_after_secs(self.tokens, options.refill_per_sec),
            };
        }

        self.tokens -= 1.0;
        RateLimitDecision {
            ok: true,
            remaining: floor_tokens(self.tokens),
            retry_after: 0,
        }
    }
}

pub fn retry_after_secs(tokens: f64, refill_per_sec: f64) -> u64 {
    if refill_per_sec > 0.0 {
        ((1.0 - tokens) / refill_per_sec).ceil().max(0.0) as u64
    } else {
        0
    }
}

pub(crate) fn floor_tokens(tokens: f64) -> u32 {
    tokens.max(0.0).floor() as u32
}

/// Rate limiter over any [`Store`]. Keys are namespaced under `ratelimit:`.
pub struct RateLimiter {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub async fn check(&self, key: &str, options: &RateLimitOptions) -> RateLimitDecision {
        let now = self.clock.now_ms();
        let bucket_key = format!("ratelimit:{key}");

        match self.store.take_token(&bucket_key, options, now).await {
            Ok(decision) => {
                if decision.ok {
                    Metrics::incr(&METRICS.ratelimit_allowed);
                } else {
                    Metrics::incr(&METRICS.ratelimit_blocked);
                    debug!(key, retry_after = decision.retry_after, "Rate limit exceeded");
                }
                decision
            }
            Err(e) => {
                // Only reachable with a bare remote store; FallbackStore never errors here.
                Metrics::incr(&METRICS.backend_errors);
                warn!(key, error = %e, "Rate limit store failed, admitting request");
                RateLimitDecision {
                    ok: true,
                    remaining: floor_tokens(options.capacity - 1.0),
                    retry_after: 0,
                }
            }
        }
    }
}
