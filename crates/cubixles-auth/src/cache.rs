//! Memoization for read-heavy routes. Strictly best-effort: every fault is
//! reported as a miss, never as an error.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use crate::metrics::{Metrics, METRICS};
use crate::store::Store;

pub struct ResponseCache {
    store: Arc<dyn Store>,
}

impl ResponseCache {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.store.get(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                Metrics::incr(&METRICS.cache_misses);
                return None;
            }
            Err(e) => {
                Metrics::incr(&METRICS.cache_misses);
                warn!(key, error = %e, "Cache read failed");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => {
                Metrics::incr(&METRICS.cache_hits);
                Some(value)
            }
            Err(e) => {
                Metrics::incr(&METRICS.cache_misses);
                warn!(key, error = %e, "Cached value does not deserialize");
                None
            }
        }
    }

    /// `ttl_ms` of `None` or zero stores without expiry.
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl_ms: Option<u64>) {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(key, error = %e, "Cache value does not serialize");
                return;
            }
        };
        if let Err(e) = self.store.set(key, &raw, ttl_ms).await {
            warn!(key, error = %e, "Cache write failed");
        }
    }

    pub async fn clear(&self, key: &str) {
        if let Err(e) = self.store.delete(key).await {
            warn!(key, error = %e, "Cache clear failed");
        }
    }
}
