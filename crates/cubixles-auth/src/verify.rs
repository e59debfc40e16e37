//! Wallet signature verification over the pin message.
//!
//! EOA signatures are checked locally by public-key recovery. Anything that
//! does not recover to the claimed address is retried as an EIP-1271
//! contract-wallet signature via the chain's [`ChainReader`], so callers
//! never declare which kind of wallet signed.

use std::collections::HashMap;
use std::sync::Arc;

use cubixles_types::{decode_hex, is_supported_chain, Address, PinMessage, Rejection};
use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::chain::{ChainReader, RpcError};
use crate::metrics::{Metrics, METRICS};

/// `isValidSignature(bytes32,bytes)`; also the only accepted return value.
pub const EIP1271_MAGIC: [u8; 4] = [0x16, 0x26, 0xba, 0x7e];
/// Legacy `isValidSignature(bytes,bytes)`.
pub const EIP1271_BYTES_SELECTOR: [u8; 4] = [0x20, 0xc1, 0x3b, 0x0b];

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureRequest {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub nonce: String,
    #[serde(default)]
    pub signature: String,
    #[serde(default)]
    pub chain_id: Option<u64>,
}

pub struct SignatureVerifier {
    default_chain_id: u64,
    readers: HashMap<u64, Arc<dyn ChainReader>>,
}

impl SignatureVerifier {
    /// An unsupported default collapses to mainnet.
    pub fn new(default_chain_id: u64) -> Self {
        let default_chain_id = if is_supported_chain(default_chain_id) {
            default_chain_id
        } else {
            1
        };
        Self {
            default_chain_id,
            readers: HashMap::new(),
        }
    }

    pub fn with_reader(mut self, chain_id: u64, reader: Arc<dyn ChainReader>) -> Self {
        self.readers.insert(chain_id, reader);
        self
    }

    pub fn default_chain_id(&self) -> u64 {
        self.default_chain_id
    }

    /// Requested chain if supported, otherwise the default.
    pub fn resolve_chain_id(&self, requested: Option<u64>) -> u64 {
        requested
            .filter(|id| is_supported_chain(*id))
            .unwrap_or(self.default_chain_id)
    }

    pub fn reader(&self, chain_id: u64) -> Option<&Arc<dyn ChainReader>> {
        self.readers.get(&chain_id)
    }

    /// Local shape checks on the credentials: both present, address well formed.
    /// Safe to run before the nonce is consumed.
    pub fn check_credentials(request: &SignatureRequest) -> Result<Address, Rejection> {
        if request.address.trim().is_empty() || request.signature.trim().is_empty() {
            return Err(Rejection::MissingCredentials);
        }
        Address::parse(&request.address)
    }

    /// Returns the claimed address when the signature authorizes the nonce.
    pub async fn verify(&self, request: &SignatureRequest) -> Result<Address, Rejection> {
        let claimed = Self::check_credentials(request)?;
        let chain_id = self.resolve_chain_id(request.chain_id);
        let message = PinMessage::from_nonce(&request.nonce, chain_id)?;

        let Some(signature) = decode_hex(&request.signature) else {
            return Err(self.mismatch(&claimed, "signature is not hex"));
        };

        let digest = message.digest();
        if let Some(recovered) = recover_signer(&digest, &signature) {
            if recovered == claimed {
                Metrics::incr(&METRICS.signature_eoa);
                debug!(address = %claimed, "EOA signature verified");
                return Ok(claimed);
            }
        }

        match self
            .verify_contract(chain_id, &claimed, &message, &signature)
            .await
        {
            Ok(true) => {
                Metrics::incr(&METRICS.signature_contract);
                debug!(address = %claimed, chain_id, "Contract signature verified");
                Ok(claimed)
            }
            Ok(false) => Err(self.mismatch(&claimed, "no valid signer")),
            Err(e) => {
                Metrics::incr(&METRICS.rpc_errors);
                warn!(address = %claimed, chain_id, error = %e, "EIP-1271 check failed");
                Err(self.mismatch(&claimed, "contract check failed"))
            }
        }
    }

    fn mismatch(&self, address: &Address, detail: &str) -> Rejection {
        Metrics::incr(&METRICS.signature_mismatch);
        debug!(address = %address, detail, "Signature mismatch");
        Rejection::SignatureMismatch
    }

    /// `Ok(false)` for accounts without code or a non-magic answer.
    async fn verify_contract(
        &self,
        chain_id: u64,
        address: &Address,
        message: &PinMessage,
        signature: &[u8],
    ) -> Result<bool, RpcError> {
        let Some(reader) = self.reader(chain_id) else {
            debug!(chain_id, "No RPC configured, skipping EIP-1271");
            return Ok(false);
        };

        let code = reader.get_code(address).await?;
        if code.is_empty() {
            return Ok(false);
        }

        let by_digest = encode_is_valid_signature_digest(&message.digest(), signature);
        match reader.call(address, &by_digest).await {
            Ok(ret) if is_magic(&ret) => return Ok(true),
            Ok(_) => {}
            Err(e) => debug!(error = %e, "bytes32 isValidSignature failed, trying bytes overload"),
        }

        let by_bytes = encode_is_valid_signature_bytes(&message.encode(), signature);
        let ret = reader.call(address, &by_bytes).await?;
        Ok(is_magic(&ret))
    }
}

/// Recover the signer of a 65-byte `r ‖ s ‖ v` signature over `digest`.
/// `v` may be 27/28 or 0/1. High-s signatures are normalized.
pub fn recover_signer(digest: &[u8; 32], signature: &[u8]) -> Option<Address> {
    if signature.len() != 65 {
        return None;
    }
    let v = match signature[64] {
        v @ (27 | 28) => v - 27,
        v @ (0 | 1) => v,
        _ => return None,
    };
    let mut recovery_id = RecoveryId::from_byte(v)?;
    let mut sig = Signature::from_slice(&signature[..64]).ok()?;
    if let Some(normalized) = sig.normalize_s() {
        sig = normalized;
        recovery_id = RecoveryId::new(!recovery_id.is_y_odd(), recovery_id.is_x_reduced());
    }

    let key = VerifyingKey::recover_from_prehash(digest, &sig, recovery_id).ok()?;
    let point = key.as_affine().to_encoded_point(false);
    Address::from_public_key(&point.as_bytes()[1..])
}

fn is_magic(ret: &[u8]) -> bool {
    ret.len() >= 4 && ret[..4] == EIP1271_MAGIC
}

fn abi_word(value: usize) -> [u8; 32] {
    cubixles_types::encode_uint(value as u64)
}

/// Length-prefixed, right-padded dynamic `bytes` tail.
fn abi_bytes(out: &mut Vec<u8>, data: &[u8]) {
    out.extend_from_slice(&abi_word(data.len()));
    out.extend_from_slice(data);
    let pad = (32 - data.len() % 32) % 32;
    out.extend(std::iter::repeat(0u8).take(pad));
}

fn padded_len(len: usize) -> usize {
    32 + len.div_ceil(32) * 32
}

pub fn encode_is_valid_signature_digest(digest: &[u8; 32], signature: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + 64 + padded_len(signature.len()));
    out.extend_from_slice(&EIP1271_MAGIC);
    out.extend_from_slice(digest);
    out.extend_from_slice(&abi_word(64));
    abi_bytes(&mut out, signature);
    out
}

pub fn encode_is_valid_signature_bytes(data: &[u8], signature: &[u8]) -> Vec<u8> {
    let mut out =
        Vec::with_capacity(4 + 64 + padded_len(data.len()) + padded_len(signature.len()));
    out.extend_from_slice(&EIP1271_BYTES_SELECTOR);
    out.extend_from_slice(&abi_word(64));
    out.extend_from_slice(&abi_word(64 + padded_len(data.len())));
    abi_bytes(&mut out, data);
    abi_bytes(&mut out, signature);
    out
}
