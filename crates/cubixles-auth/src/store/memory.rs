//! Process-local store used when no distributed backend is configured, or as
//! the fallback when it is unreachable.
//!
//! Each table sits behind its own mutex so every read-modify-write is
//! serialized within the process. Nothing here is shared across instances.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use linked_hash_map::LinkedHashMap;

use super::{BackendKind, Store, StoreError};
use crate::clock::Clock;
use crate::rate_limit::{RateLimitDecision, RateLimitOptions, TokenBucket};

/// Full sweep interval for the replay table.
const REPLAY_SWEEP_INTERVAL_MS: u64 = 30_000;

struct CacheEntry {
    value: String,
    expires_at: Option<u64>,
}

#[derive(Default)]
struct ReplayTable {
    /// nonce key → expiry (ms).
    entries: HashMap<String, u64>,
    last_sweep: u64,
}

pub struct MemoryStore {
    clock: Arc<dyn Clock>,
    /// Ordered least- to most-recently seen.
    buckets: Mutex<LinkedHashMap<String, TokenBucket>>,
    replay: Mutex<ReplayTable>,
    /// Ordered least- to most-recently used.
    cache: Mutex<LinkedHashMap<String, CacheEntry>>,
    cache_capacity: usize,
}

impl MemoryStore {
    pub fn new(clock: Arc<dyn Clock>, cache_capacity: usize) -> Self {
        Self {
            clock,
            buckets: Mutex::new(LinkedHashMap::new()),
            replay: Mutex::new(ReplayTable::default()),
            cache: Mutex::new(LinkedHashMap::new()),
            cache_capacity,
        }
    }

    pub fn bucket_count(&self) -> usize {
        lock(&self.buckets).len()
    }

    pub fn replay_count(&self) -> usize {
        lock(&self.replay).entries.len()
    }

    pub fn cache_len(&self) -> usize {
        lock(&self.cache).len()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Drop stale buckets first, then least-recently-seen ones, until within budget.
fn prune_buckets(
    buckets: &mut LinkedHashMap<String, TokenBucket>,
    max_entries: usize,
    ttl_ms: u64,
    now_ms: u64,
) {
    if buckets.len() <= max_entries {
        return;
    }
    let cutoff = now_ms.saturating_sub(ttl_ms);
    let excess = buckets.len() - max_entries;
    let stale: Vec<String> = buckets
        .iter()
        .filter(|(_, bucket)| bucket.last_seen < cutoff)
        .map(|(key, _)| key.clone())
        .take(excess)
        .collect();
    for key in stale {
        buckets.remove(&key);
    }
    while buckets.len() > max_entries {
        if buckets.pop_front().is_none() {
            break;
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    fn kind(&self) -> BackendKind {
        BackendKind::Memory
    }

    async fn take_token(
        &self,
        key: &str,
        options: &RateLimitOptions,
        now_ms: u64,
    ) -> Result<RateLimitDecision, StoreError> {
        let mut buckets = lock(&self.buckets);
        let idle_cutoff = now_ms.saturating_sub(options.ttl_ms);
        let mut bucket = match buckets.remove(key) {
            Some(existing) if existing.last_seen >= idle_cutoff => existing,
            _ => TokenBucket::full(options.capacity, now_ms),
        };
        let decision = bucket.take(options, now_ms);
        buckets.insert(key.to_string(), bucket);
        prune_buckets(&mut buckets, options.max_entries, options.ttl_ms, now_ms);
        Ok(decision)
    }

    async fn insert_if_absent(&self, key: &str, ttl_ms: u64) -> Result<bool, StoreError> {
        let now = self.clock.now_ms();
        let mut replay = lock(&self.replay);

        if now.saturating_sub(replay.last_sweep) >= REPLAY_SWEEP_INTERVAL_MS {
            replay.entries.retain(|_, expires_at| *expires_at > now);
            replay.last_sweep = now;
        }

        if let Some(expires_at) = replay.entries.get(key) {
            if *expires_at > now {
                return Ok(false);
            }
        }
        replay
            .entries
            .insert(key.to_string(), now.saturating_add(ttl_ms));
        Ok(true)
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let now = self.clock.now_ms();
        let mut cache = lock(&self.cache);
        match cache.get_refresh(key) {
            None => return Ok(None),
            Some(entry) => match entry.expires_at {
                Some(at) if at <= now => {}
                _ => return Ok(Some(entry.value.clone())),
            },
        }
        cache.remove(key);
        Ok(None)
    }

    async fn set(&self, key: &str, value: &str, ttl_ms: Option<u64>) -> Result<(), StoreError> {
        let now = self.clock.now_ms();
        let expires_at = ttl_ms.filter(|ttl| *ttl > 0).map(|ttl| now.saturating_add(ttl));
        let mut cache = lock(&self.cache);
        cache.insert(
            key.to_string(),
            CacheEntry {
                value: value.to_string(),
                expires_at,
            },
        );
        while cache.len() > self.cache_capacity {
            if cache.pop_front().is_none() {
                break;
            }
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        lock(&self.cache).remove(key);
        Ok(())
    }
}
