//! Request authorization for cubixles_ write routes: token-bucket rate
//! limiting, single-use wallet nonces, and response caching, each working
//! against a distributed store when one is configured and process-local
//! state otherwise.

mod backend;
mod cache;
pub mod chain;
pub mod clock;
mod error;
pub mod metrics;
mod nonce;
mod rate_limit;
pub mod store;
mod verify;

pub use backend::BackendSelector;
pub use cache::ResponseCache;
pub use chain::{ChainReader, JsonRpcReader, RpcError};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::Error;
pub use metrics::METRICS;
pub use nonce::{IssuedNonce, NonceAuthenticator, VerifiedNonce, DEFAULT_NONCE_TTL_MS};
pub use rate_limit::{RateLimitDecision, RateLimitOptions, RateLimiter, TokenBucket};
pub use store::{BackendKind, FallbackStore, MemoryStore, RedisStore, Store, StoreError};
pub use verify::{recover_signer, SignatureRequest, SignatureVerifier, EIP1271_MAGIC};
