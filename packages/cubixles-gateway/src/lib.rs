//! # cubixles_ gateway
//!
//! HTTP host for the request-authorization layer. Every route runs its
//! checks through [`RouteGuard`] in a fixed order: rate limit, nonce,
//! signature, per-wallet rate limit, then cache.
//!
//! ## Endpoints
//! - `GET /health` - Health check with backend mode
//! - `GET /metrics` - Prometheus counters
//! - `GET /api/nonce` - Issue a single-use nonce and its typed data
//! - `POST /api/auth/verify` - Consume a nonce and verify the wallet signature
//! - `GET /api/wallet/{address}` - Cached EOA/contract lookup

pub mod config;
mod error;
pub mod guard;
mod handlers;
pub mod middleware;
mod response;
mod router;
mod state;

pub use config::Config;
pub use error::Error;
pub use guard::{RouteGuard, RoutePolicy};
pub use router::create as create_router;
pub use state::AppState;
