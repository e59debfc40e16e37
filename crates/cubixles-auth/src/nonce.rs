//! Stateless nonce issuance and single-use verification.
//!
//! A nonce carries its own issue time and lifetime and is authenticated by an
//! HMAC under the server secret, so any instance can verify a nonce issued by
//! any other without shared state. Only consumption touches the store.

use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use cubixles_types::{format_nonce, signing_payload, NonceToken, Rejection};
use hmac::{Hmac, Mac};
use rand::RngCore;
use serde::Serialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::metrics::{Metrics, METRICS};
use crate::store::Store;
use crate::Error;

type HmacSha256 = Hmac<Sha256>;

pub const DEFAULT_NONCE_TTL_MS: u64 = 5 * 60 * 1000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedNonce {
    pub nonce: String,
    pub expires_at: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedNonce {
    pub expires_at: u64,
}

pub struct NonceAuthenticator {
    mac: HmacSha256,
    ttl_ms: u64,
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
}

impl NonceAuthenticator {
    /// Fails when `secret` is empty.
    pub fn new(secret: &[u8], store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Result<Self, Error> {
        if secret.is_empty() {
            return Err(Error::Config("nonce secret is not configured".into()));
        }
        let mac = HmacSha256::new_from_slice(secret)
            .map_err(|e| Error::Config(format!("invalid nonce secret: {e}")))?;
        Ok(Self {
            mac,
            ttl_ms: DEFAULT_NONCE_TTL_MS,
            store,
            clock,
        })
    }

    pub fn with_ttl(mut self, ttl_ms: u64) -> Self {
        self.ttl_ms = ttl_ms;
        self
    }

    pub fn ttl_ms(&self) -> u64 {
        self.ttl_ms
    }

    fn sign(&self, payload: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(payload.as_bytes());
        URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
    }

    /// Pure: no storage write.
    pub fn issue(&self) -> IssuedNonce {
        let mut rand_bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut rand_bytes);
        let rand = hex::encode(rand_bytes);
        let issued_at = self.clock.now_ms();

        let payload = signing_payload(&rand, issued_at, self.ttl_ms);
        let signature = self.sign(&payload);
        Metrics::incr(&METRICS.nonce_issued);

        IssuedNonce {
            nonce: format_nonce(&payload, &signature),
            expires_at: issued_at.saturating_add(self.ttl_ms),
        }
    }

    /// Authenticate, check expiry, then consume. Consumption is the only
    /// backend round trip and happens only after the pure checks pass.
    pub async fn verify(&self, nonce: &str) -> Result<VerifiedNonce, Rejection> {
        let token = match NonceToken::parse(nonce) {
            Ok(token) => token,
            Err(rejection) => {
                Metrics::incr(&METRICS.nonce_invalid);
                return Err(rejection);
            }
        };

        let expected = self.sign(&token.payload());
        if !bool::from(expected.as_bytes().ct_eq(token.signature.as_bytes())) {
            Metrics::incr(&METRICS.nonce_invalid);
            return Err(Rejection::InvalidNonceSignature);
        }

        let expires_at = token.expires_at();
        if self.clock.now_ms() > expires_at {
            Metrics::incr(&METRICS.nonce_expired);
            return Err(Rejection::Expired);
        }

        match self
            .store
            .insert_if_absent(&format!("nonce:{nonce}"), token.ttl_ms)
            .await
        {
            Ok(true) => {
                debug!(expires_at, "Nonce consumed");
                Ok(VerifiedNonce { expires_at })
            }
            Ok(false) => {
                Metrics::incr(&METRICS.nonce_replay);
                Err(Rejection::Replayed)
            }
            Err(e) => {
                warn!(error = %e, "Replay tracking failed");
                Err(Rejection::BackendUnavailable)
            }
        }
    }
}
