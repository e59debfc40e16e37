//! HTTP request handlers.

use crate::guard::{AUTH_IP, NONCE_IP, WALLET_IP};
use crate::middleware::client_ip;
use crate::response::{
    AuthResponse, ChainQuery, HealthResponse, NonceResponse, WalletKind, WalletKindResponse,
};
use crate::state::AppState;
use crate::Error;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use cubixles_auth::{SignatureRequest, METRICS};
use cubixles_types::{Address, PinMessage};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::debug;

/// Wallet kind only changes on deployment; ten minutes keeps RPC load low.
const WALLET_KIND_TTL_MS: u64 = 10 * 60 * 1000;

/// Health check with backend mode.
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        backend: state.backend.kind().as_str(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        requests: state.request_count.load(Ordering::Relaxed),
    })
}

/// Prometheus metrics in text exposition format.
pub async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let body = METRICS.render(
        state.request_count.load(Ordering::Relaxed),
        state.backend.kind().as_str(),
    );
    (
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4",
        )],
        body,
    )
}

/// Issue a nonce plus the typed data the wallet should sign.
pub async fn nonce(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<ChainQuery>,
) -> Result<Json<NonceResponse>, Error> {
    let guard = &state.guard;
    guard.admit(&NONCE_IP, &client_ip(&headers)).await?;

    let issued = guard.issue_nonce();
    let chain_id = guard.verifier.resolve_chain_id(query.chain_id);
    let message = PinMessage::from_nonce(&issued.nonce, chain_id)?;

    Ok(Json(NonceResponse {
        nonce: issued.nonce,
        expires_at: issued.expires_at,
        typed_data: message.typed_data(),
    }))
}

/// Consume a nonce and authenticate the signing wallet.
pub async fn auth_verify(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<SignatureRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>, Error> {
    let guard = &state.guard;
    guard.admit(&AUTH_IP, &client_ip(&headers)).await?;

    let Json(request) = payload.map_err(|e| Error::BadRequest(e.body_text()))?;
    let address = guard.authenticate(&request).await?;

    Ok(Json(AuthResponse {
        success: true,
        address,
    }))
}

/// Whether an address is a contract wallet on the requested chain.
pub async fn wallet_kind(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(address): Path<String>,
    Query(query): Query<ChainQuery>,
) -> Result<Json<WalletKindResponse>, Error> {
    let guard = &state.guard;
    guard.admit(&WALLET_IP, &client_ip(&headers)).await?;

    let address = Address::parse(&address)?;
    let chain_id = guard.verifier.resolve_chain_id(query.chain_id);
    let key = format!("wallet-kind:{chain_id}:{}", address.to_lower_hex());

    let (kind, cached) = guard
        .cached(&key, WALLET_KIND_TTL_MS, || async {
            let reader = guard
                .verifier
                .reader(chain_id)
                .ok_or_else(|| Error::Upstream(format!("no RPC configured for chain {chain_id}")))?;
            let code = reader
                .get_code(&address)
                .await
                .map_err(|e| Error::Upstream(e.to_string()))?;
            debug!(address = %address, chain_id, code_len = code.len(), "Fetched wallet code");
            Ok::<_, Error>(if code.is_empty() {
                WalletKind::Eoa
            } else {
                WalletKind::Contract
            })
        })
        .await?;

    Ok(Json(WalletKindResponse {
        address,
        chain_id,
        kind,
        cached,
    }))
}
