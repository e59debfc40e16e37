//! Gateway configuration.

use serde::Deserialize;

/// Loaded from an optional `gateway.toml` plus `CUBIXLES_*` variables.
/// Defaults fall back to the deployment's existing environment names.
#[derive(Clone, Deserialize)]
pub struct Config {
    /// HMAC key for nonces. Required.
    #[serde(default = "defaults::auth_secret")]
    pub auth_secret: String,

    /// Absent means process-local state only.
    #[serde(default = "defaults::redis_url")]
    pub redis_url: Option<String>,

    #[serde(default = "defaults::redis_key_prefix")]
    pub redis_key_prefix: String,

    #[serde(default = "defaults::chain_id")]
    pub chain_id: u64,

    #[serde(default = "defaults::mainnet_rpc_url")]
    pub mainnet_rpc_url: Option<String>,

    #[serde(default = "defaults::base_rpc_url")]
    pub base_rpc_url: Option<String>,

    #[serde(default = "defaults::sepolia_rpc_url")]
    pub sepolia_rpc_url: Option<String>,

    #[serde(default = "defaults::bind_address")]
    pub bind_address: String,

    #[serde(default = "defaults::nonce_ttl_ms")]
    pub nonce_ttl_ms: u64,

    #[serde(default = "defaults::cache_max_entries")]
    pub cache_max_entries: usize,

    #[serde(default = "defaults::backend_timeout_ms")]
    pub backend_timeout_ms: u64,

    #[serde(default = "defaults::rpc_timeout_ms")]
    pub rpc_timeout_ms: u64,

    /// Reject nonces instead of tracking replay locally when Redis is down.
    #[serde(default)]
    pub replay_fail_closed: bool,
}

impl Config {
    pub fn load() -> Result<Self, crate::Error> {
        config::Config::builder()
            .add_source(config::File::with_name("gateway").required(false))
            .add_source(config::Environment::with_prefix("CUBIXLES"))
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| crate::Error::Config(format!("invalid configuration: {e}")))
    }

    /// Configured RPC endpoint per supported chain.
    pub fn rpc_urls(&self) -> Vec<(u64, &str)> {
        [
            (1, self.mainnet_rpc_url.as_deref()),
            (8453, self.base_rpc_url.as_deref()),
            (11_155_111, self.sepolia_rpc_url.as_deref()),
        ]
        .into_iter()
        .filter_map(|(chain, url)| Some((chain, url.filter(|u| !u.is_empty())?)))
        .collect()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            auth_secret: defaults::auth_secret(),
            redis_url: defaults::redis_url(),
            redis_key_prefix: defaults::redis_key_prefix(),
            chain_id: defaults::chain_id(),
            mainnet_rpc_url: defaults::mainnet_rpc_url(),
            base_rpc_url: defaults::base_rpc_url(),
            sepolia_rpc_url: defaults::sepolia_rpc_url(),
            bind_address: defaults::bind_address(),
            nonce_ttl_ms: defaults::nonce_ttl_ms(),
            cache_max_entries: defaults::cache_max_entries(),
            backend_timeout_ms: defaults::backend_timeout_ms(),
            rpc_timeout_ms: defaults::rpc_timeout_ms(),
            replay_fail_closed: false,
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("auth_secret", &"<redacted>")
            .field("redis_url", &self.redis_url.as_ref().map(|_| "<redacted>"))
            .field("redis_key_prefix", &self.redis_key_prefix)
            .field("chain_id", &self.chain_id)
            .field("bind_address", &self.bind_address)
            .field("nonce_ttl_ms", &self.nonce_ttl_ms)
            .field("cache_max_entries", &self.cache_max_entries)
            .field("backend_timeout_ms", &self.backend_timeout_ms)
            .field("rpc_timeout_ms", &self.rpc_timeout_ms)
            .field("replay_fail_closed", &self.replay_fail_closed)
            .finish_non_exhaustive()
    }
}

mod defaults {
    fn env(name: &str) -> Option<String> {
        std::env::var(name).ok().filter(|v| !v.trim().is_empty())
    }

    pub fn auth_secret() -> String {
        env("SERVER_AUTH_SALT").unwrap_or_default()
    }

    pub fn redis_url() -> Option<String> {
        env("REDIS_URL")
    }

    pub fn redis_key_prefix() -> String {
        // Priority: REDIS_KEY_PREFIX > VERCEL_PROJECT_ID > VERCEL_GIT_REPO_SLUG
        env("REDIS_KEY_PREFIX")
            .or_else(|| env("VERCEL_PROJECT_ID"))
            .or_else(|| env("VERCEL_GIT_REPO_SLUG"))
            .unwrap_or_else(|| "cubixles".into())
    }

    pub fn chain_id() -> u64 {
        env("CUBIXLES_CHAIN_ID")
            .and_then(|v| v.parse().ok())
            .unwrap_or(1)
    }

    pub fn mainnet_rpc_url() -> Option<String> {
        env("MAINNET_RPC_URL")
    }

    pub fn base_rpc_url() -> Option<String> {
        env("BASE_RPC_URL")
    }

    pub fn sepolia_rpc_url() -> Option<String> {
        env("SEPOLIA_RPC_URL")
    }

    pub fn bind_address() -> String {
        "0.0.0.0:3050".into()
    }

    pub fn nonce_ttl_ms() -> u64 {
        cubixles_auth::DEFAULT_NONCE_TTL_MS
    }

    pub fn cache_max_entries() -> usize {
        1000
    }

    pub fn backend_timeout_ms() -> u64 {
        2_000
    }

    pub fn rpc_timeout_ms() -> u64 {
        10_000
    }
}
