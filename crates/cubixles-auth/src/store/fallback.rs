//! Distributed store with per-request degradation to a local store.
//!
//! A remote fault never fails the caller: the operation is answered by the
//! local store and the fault is logged and counted. The one exception is
//! replay tracking when `replay_fail_closed` is set, where a remote fault is
//! returned so the nonce is rejected instead of tracked per-instance.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use super::{BackendKind, Store, StoreError};
use crate::metrics::{Metrics, METRICS};
use crate::rate_limit::{RateLimitDecision, RateLimitOptions};

pub struct FallbackStore {
    remote: Arc<dyn Store>,
    local: Arc<dyn Store>,
    replay_fail_closed: bool,
}

impl FallbackStore {
    pub fn new(remote: Arc<dyn Store>, local: Arc<dyn Store>, replay_fail_closed: bool) -> Self {
        Self {
            remote,
            local,
            replay_fail_closed,
        }
    }

    fn degrade(&self, op: &'static str, key: &str, error: &StoreError) {
        Metrics::incr(&METRICS.backend_errors);
        warn!(op, key, error = %error, "Distributed store failed, using local fallback");
    }
}

#[async_trait]
impl Store for FallbackStore {
    fn kind(&self) -> BackendKind {
        self.remote.kind()
    }

    async fn take_token(
        &self,
        key: &str,
        options: &RateLimitOptions,
        now_ms: u64,
    ) -> Result<RateLimitDecision, StoreError> {
        match self.remote.take_token(key, options, now_ms).await {
            Ok(decision) => Ok(decision),
            Err(e) => {
                self.degrade("take_token", key, &e);
                self.local.take_token(key, options, now_ms).await
            }
        }
    }

    async fn insert_if_absent(&self, key: &str, ttl_ms: u64) -> Result<bool, StoreError> {
        match self.remote.insert_if_absent(key, ttl_ms).await {
            Ok(inserted) => Ok(inserted),
            Err(e) if self.replay_fail_closed => {
                Metrics::incr(&METRICS.backend_errors);
                warn!(key, error = %e, "Replay tracking unavailable, rejecting");
                Err(e)
            }
            Err(e) => {
                self.degrade("insert_if_absent", key, &e);
                self.local.insert_if_absent(key, ttl_ms).await
            }
        }
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match self.remote.get(key).await {
            Ok(value) => Ok(value),
            Err(e) => {
                self.degrade("get", key, &e);
                self.local.get(key).await
            }
        }
    }

    async fn set(&self, key: &str, value: &str, ttl_ms: Option<u64>) -> Result<(), StoreError> {
        match self.remote.set(key, value, ttl_ms).await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.degrade("set", key, &e);
                self.local.set(key, value, ttl_ms).await
            }
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        // Clear both so a stale local copy cannot resurface after a fault.
        let local = self.local.delete(key).await;
        match self.remote.delete(key).await {
            Ok(()) => local,
            Err(e) => {
                self.degrade("delete", key, &e);
                local
            }
        }
    }
}
