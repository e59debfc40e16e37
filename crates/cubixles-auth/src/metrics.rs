//! Prometheus counters (lock-free atomics, zero allocation on hot path).

use std::sync::atomic::{AtomicU64, Ordering};

pub static METRICS: Metrics = Metrics::new();

pub struct Metrics {
    // --- Rate limiting ---
    pub ratelimit_allowed: AtomicU64,
    pub ratelimit_blocked: AtomicU64,

    // --- Backend ---
    pub backend_errors: AtomicU64,

    // --- Nonces ---
    pub nonce_issued: AtomicU64,
    pub nonce_invalid: AtomicU64,
    pub nonce_expired: AtomicU64,
    pub nonce_replay: AtomicU64,

    // --- Signatures ---
    pub signature_eoa: AtomicU64,
    pub signature_contract: AtomicU64,
    pub signature_mismatch: AtomicU64,
    pub rpc_errors: AtomicU64,

    // --- Cache ---
    pub cache_hits: AtomicU64,
    pub cache_misses: AtomicU64,
}

impl Metrics {
    const fn new() -> Self {
        Self {
            ratelimit_allowed: AtomicU64::new(0),
            ratelimit_blocked: AtomicU64::new(0),
            backend_errors: AtomicU64::new(0),
            nonce_issued: AtomicU64::new(0),
            nonce_invalid: AtomicU64::new(0),
            nonce_expired: AtomicU64::new(0),
            nonce_replay: AtomicU64::new(0),
            signature_eoa: AtomicU64::new(0),
            signature_contract: AtomicU64::new(0),
            signature_mismatch: AtomicU64::new(0),
            rpc_errors: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
        }
    }

    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Render in Prometheus text exposition format.
    pub fn render(&self, requests: u64, backend: &str) -> String {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        let redis_backend = u8::from(backend == "redis");

        format!(
            "\
# HELP cubixles_requests_total Total HTTP requests handled.\n\
# TYPE cubixles_requests_total counter\n\
cubixles_requests_total {requests}\n\
# HELP cubixles_backend_distributed Whether a distributed store is configured.\n\
# TYPE cubixles_backend_distributed gauge\n\
cubixles_backend_distributed {redis_backend}\n\
# HELP cubixles_ratelimit_allowed_total Requests admitted by the rate limiter.\n\
# TYPE cubixles_ratelimit_allowed_total counter\n\
cubixles_ratelimit_allowed_total {}\n\
# HELP cubixles_ratelimit_blocked_total Requests rejected by the rate limiter.\n\
# TYPE cubixles_ratelimit_blocked_total counter\n\
cubixles_ratelimit_blocked_total {}\n\
# HELP cubixles_backend_errors_total Distributed store faults (served by local fallback).\n\
# TYPE cubixles_backend_errors_total counter\n\
cubixles_backend_errors_total {}\n\
# HELP cubixles_nonce_issued_total Nonces issued.\n\
# TYPE cubixles_nonce_issued_total counter\n\
cubixles_nonce_issued_total {}\n\
# HELP cubixles_nonce_invalid_total Malformed or tampered nonces.\n\
# TYPE cubixles_nonce_invalid_total counter\n\
cubixles_nonce_invalid_total {}\n\
# HELP cubixles_nonce_expired_total Expired nonces.\n\
# TYPE cubixles_nonce_expired_total counter\n\
cubixles_nonce_expired_total {}\n\
# HELP cubixles_nonce_replay_total Replayed nonces.\n\
# TYPE cubixles_nonce_replay_total counter\n\
cubixles_nonce_replay_total {}\n\
# HELP cubixles_signature_eoa_total Signatures accepted via ECDSA recovery.\n\
# TYPE cubixles_signature_eoa_total counter\n\
cubixles_signature_eoa_total {}\n\
# HELP cubixles_signature_contract_total Signatures accepted via EIP-1271.\n\
# TYPE cubixles_signature_contract_total counter\n\
cubixles_signature_contract_total {}\n\
# HELP cubixles_signature_mismatch_total Signatures rejected.\n\
# TYPE cubixles_signature_mismatch_total counter\n\
cubixles_signature_mismatch_total {}\n\
# HELP cubixles_rpc_errors_total Chain RPC faults during verification.\n\
# TYPE cubixles_rpc_errors_total counter\n\
cubixles_rpc_errors_total {}\n\
# HELP cubixles_cache_hits_total Response cache hits.\n\
# TYPE cubixles_cache_hits_total counter\n\
cubixles_cache_hits_total {}\n\
# HELP cubixles_cache_misses_total Response cache misses.\n\
# TYPE cubixles_cache_misses_total counter\n\
cubixles_cache_misses_total {}\n",
            load(&self.ratelimit_allowed),
            load(&self.ratelimit_blocked),
            load(&self.backend_errors),
            load(&self.nonce_issued),
            load(&self.nonce_invalid),
            load(&self.nonce_expired),
            load(&self.nonce_replay),
            load(&self.signature_eoa),
            load(&self.signature_contract),
            load(&self.signature_mismatch),
            load(&self.rpc_errors),
            load(&self.cache_hits),
            load(&self.cache_misses),
        )
    }
}
