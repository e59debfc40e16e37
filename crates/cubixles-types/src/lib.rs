//! Shared types and pure-logic utilities for cubixles_ request authorization.
//! No I/O, so usable from the gateway, tests, and offline tooling.

mod crypto;
mod error;
mod message;
mod nonce;

pub use crypto::{decode_hex, keccak256, Address};
pub use error::Rejection;
pub use message::{
    encode_uint, is_supported_chain, PinMessage, PIN_DOMAIN_NAME, PIN_DOMAIN_VERSION,
    PIN_PRIMARY_TYPE, PIN_STATEMENT, SUPPORTED_CHAIN_IDS,
};
pub use nonce::{format_nonce, signing_payload, NonceToken};
