//! Application state shared across handlers.

use crate::config::Config;
use crate::guard::RouteGuard;
use cubixles_auth::{
    BackendSelector, Clock, JsonRpcReader, MemoryStore, NonceAuthenticator, RateLimiter,
    ResponseCache, SignatureVerifier, SystemClock,
};
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub backend: BackendSelector,
    pub guard: RouteGuard,
    pub start_time: Instant,
    pub request_count: AtomicU64,
}

impl AppState {
    /// Wire the system clock and JSON-RPC readers from configuration.
    pub fn new(config: Config) -> Result<Self, crate::Error> {
        let rpc_timeout = Duration::from_millis(config.rpc_timeout_ms);
        let mut verifier = SignatureVerifier::new(config.chain_id);
        for (chain_id, url) in config.rpc_urls() {
            let reader = JsonRpcReader::new(url, rpc_timeout)
                .map_err(|e| crate::Error::Config(format!("RPC client for chain {chain_id}: {e}")))?;
            verifier = verifier.with_reader(chain_id, Arc::new(reader));
            info!(chain_id, "RPC endpoint configured");
        }
        if verifier.reader(verifier.default_chain_id()).is_none() {
            warn!(
                chain_id = verifier.default_chain_id(),
                "No RPC for default chain, contract wallets cannot authenticate"
            );
        }
        Self::assemble(config, Arc::new(SystemClock), verifier)
    }

    /// Build state around an explicit clock and verifier.
    pub fn assemble(
        config: Config,
        clock: Arc<dyn Clock>,
        verifier: SignatureVerifier,
    ) -> Result<Self, crate::Error> {
        let backend = BackendSelector::new(
            config.redis_url.clone(),
            config.redis_key_prefix.clone(),
            Duration::from_millis(config.backend_timeout_ms),
        );
        let local = Arc::new(MemoryStore::new(clock.clone(), config.cache_max_entries));
        let store = backend.store(local, config.replay_fail_closed);
        info!(backend = store.kind().as_str(), "Store backend selected");

        let nonces = NonceAuthenticator::new(config.auth_secret.as_bytes(), store.clone(), clock.clone())
            .map_err(|e| crate::Error::Config(format!("SERVER_AUTH_SALT: {e}")))?
            .with_ttl(config.nonce_ttl_ms);

        let guard = RouteGuard {
            limiter: RateLimiter::new(store.clone(), clock),
            nonces,
            verifier,
            cache: ResponseCache::new(store),
        };

        Ok(Self {
            config,
            backend,
            guard,
            start_time: Instant::now(),
            request_count: AtomicU64::new(0),
        })
    }
}
