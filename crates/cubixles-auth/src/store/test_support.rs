use async_trait::async_trait;

use super::{BackendKind, Store, StoreError};
use crate::rate_limit::{RateLimitDecision, RateLimitOptions};

/// Remote that is always down.
pub(crate) struct DownStore;

#[async_trait]
impl Store for DownStore {
    fn kind(&self) -> BackendKind {
        BackendKind::Redis
    }

    async fn take_token(
        &self,
        _key: &str,
        _options: &RateLimitOptions,
        _now_ms: u64,
    ) -> Result<RateLimitDecision, StoreError> {
        Err(StoreError::Timeout)
    }

    async fn insert_if_absent(&self, _key: &str, _ttl_ms: u64) -> Result<bool, StoreError> {
        Err(StoreError::Backend("connection refused".into()))
    }

    async fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
        Err(StoreError::Timeout)
    }

    async fn set(&self, _key: &str, _value: &str, _ttl: Option<u64>) -> Result<(), StoreError> {
        Err(StoreError::Timeout)
    }

    async fn delete(&self, _key: &str) -> Result<(), StoreError> {
        Err(StoreError::Timeout)
    }
}
