//! Distributed backend detection and the per-process client handle.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tracing::{error, info};

use crate::store::{BackendKind, FallbackStore, MemoryStore, RedisStore, Store};

pub struct BackendSelector {
    redis_url: Option<String>,
    key_prefix: String,
    timeout: Duration,
    client: OnceLock<Option<Arc<RedisStore>>>,
}

impl BackendSelector {
    /// An empty or whitespace URL counts as unconfigured.
    pub fn new(redis_url: Option<String>, key_prefix: impl Into<String>, timeout: Duration) -> Self {
        Self {
            redis_url: redis_url.filter(|url| !url.trim().is_empty()),
            key_prefix: key_prefix.into(),
            timeout,
            client: OnceLock::new(),
        }
    }

    /// No distributed backend; every primitive runs on process-local state.
    pub fn local_only() -> Self {
        Self::new(None, "", Duration::ZERO)
    }

    pub fn has_distributed_backend(&self) -> bool {
        self.redis_url.is_some()
    }

    /// Memoized client. `None` when unconfigured or the URL does not parse.
    pub fn client(&self) -> Option<Arc<RedisStore>> {
        self.client
            .get_or_init(|| {
                let url = self.redis_url.as_deref()?;
                match RedisStore::open(url, &self.key_prefix, self.timeout) {
                    Ok(store) => {
                        info!(prefix = %self.key_prefix, "Distributed backend configured");
                        Some(Arc::new(store))
                    }
                    Err(e) => {
                        error!(error = %e, "Invalid REDIS_URL, using process-local state");
                        None
                    }
                }
            })
            .clone()
    }

    pub fn kind(&self) -> BackendKind {
        if self.client().is_some() {
            BackendKind::Redis
        } else {
            BackendKind::Memory
        }
    }

    /// The store every primitive should share: the distributed client wrapped
    /// with `local` as fallback, or `local` alone.
    pub fn store(&self, local: Arc<MemoryStore>, replay_fail_closed: bool) -> Arc<dyn Store> {
        match self.client() {
            Some(remote) => Arc::new(FallbackStore::new(remote, local, replay_fail_closed)),
            None => local,
        }
    }
}
