//! The authorization sequence every collaborator route composes.
//!
//! Order is fixed: per-IP rate limit, local credential checks, nonce
//! consumption, signature check, per-wallet rate limit, and only then
//! business logic and caching.

use std::future::Future;

use cubixles_auth::{
    IssuedNonce, NonceAuthenticator, RateLimitDecision, RateLimitOptions, RateLimiter,
    ResponseCache, SignatureRequest, SignatureVerifier,
};
use cubixles_types::Address;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{info, warn};

use crate::Error;

/// A rate-limit namespace and its bucket parameters.
#[derive(Debug, Clone, Copy)]
pub struct RoutePolicy {
    pub prefix: &'static str,
    pub limit: RateLimitOptions,
}

impl RoutePolicy {
    pub const fn new(prefix: &'static str, capacity: f64, refill_per_sec: f64) -> Self {
        Self {
            prefix,
            limit: RateLimitOptions::new(capacity, refill_per_sec),
        }
    }

    pub fn key(&self, subject: &str) -> String {
        format!("{}:{}", self.prefix, subject)
    }
}

pub const NONCE_IP: RoutePolicy = RoutePolicy::new("nonce:ip", 10.0, 1.0);
pub const AUTH_IP: RoutePolicy = RoutePolicy::new("auth:ip", 5.0, 0.5);
pub const AUTH_ACTOR: RoutePolicy = RoutePolicy::new("auth:actor", 4.0, 0.5);
pub const WALLET_IP: RoutePolicy = RoutePolicy::new("wallet:ip", 30.0, 1.0);

pub struct RouteGuard {
    pub limiter: RateLimiter,
    pub nonces: NonceAuthenticator,
    pub verifier: SignatureVerifier,
    pub cache: ResponseCache,
}

impl RouteGuard {
    pub async fn admit(
        &self,
        policy: &RoutePolicy,
        subject: &str,
    ) -> Result<RateLimitDecision, Error> {
        let key = policy.key(subject);
        let decision = self.limiter.check(&key, &policy.limit).await;
        if decision.ok {
            Ok(decision)
        } else {
            warn!(key = %key, retry_after = decision.retry_after, "Rate limited");
            Err(Error::RateLimited {
                retry_after: decision.retry_after,
            })
        }
    }

    pub fn issue_nonce(&self) -> IssuedNonce {
        self.nonces.issue()
    }

    /// Consume the nonce, verify the signature, then apply the per-wallet limit.
    /// Malformed credentials are rejected first so they never spend a nonce.
    pub async fn authenticate(&self, request: &SignatureRequest) -> Result<Address, Error> {
        if let Err(rejection) = SignatureVerifier::check_credentials(request) {
            warn!(reason = rejection.code(), "Credentials rejected");
            return Err(rejection.into());
        }

        if let Err(rejection) = self.nonces.verify(&request.nonce).await {
            warn!(reason = rejection.code(), "Nonce rejected");
            return Err(rejection.into());
        }

        let address = match self.verifier.verify(request).await {
            Ok(address) => address,
            Err(rejection) => {
                warn!(reason = rejection.code(), claimed = %request.address, "Signature rejected");
                return Err(rejection.into());
            }
        };

        self.admit(&AUTH_ACTOR, &address.to_lower_hex()).await?;
        info!(address = %address, "Wallet authenticated");
        Ok(address)
    }

    /// Serve `key` from cache, or run `produce` and cache its result.
    /// Returns the value and whether it came from cache. Errors are not cached.
    pub async fn cached<T, F, Fut>(
        &self,
        key: &str,
        ttl_ms: u64,
        produce: F,
    ) -> Result<(T, bool), Error>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, Error>>,
    {
        if let Some(hit) = self.cache.get::<T>(key).await {
            return Ok((hit, true));
        }
        let value = produce().await?;
        self.cache.set(key, &value, Some(ttl_ms)).await;
        Ok((value, false))
    }
}
