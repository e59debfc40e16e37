//! End-to-end flows through the gateway router.
//!
//! - nonce issuance → EOA / contract-wallet signature → authenticated address
//! - replay, tamper, and expiry rejections with their HTTP mapping
//! - per-IP and per-wallet rate limits
//! - cached wallet lookups

use anyhow::Result;
use axum::http::StatusCode;
use cubixles_types::Address;
use serde_json::json;

use crate::utils::{address_of, sign_nonce, spawn_app, spawn_app_with, test_config, wallet};

// ── Health & metrics ────────────────────────────────────────────────

#[tokio::test]
async fn test_health_reports_memory_backend() -> Result<()> {
    let app = spawn_app()?;
    let response = app.get("/health", "10.0.0.1").await?;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "ok");
    assert_eq!(response.body["backend"], "memory");
    Ok(())
}

#[tokio::test]
async fn test_metrics_exposition() -> Result<()> {
    let app = spawn_app()?;
    app.fetch_nonce("10.0.0.1").await?;
    let response = app.get("/metrics", "10.0.0.1").await?;
    assert_eq!(response.status, StatusCode::OK);
    assert!(response.text.contains("cubixles_nonce_issued_total"));
    assert!(response.text.contains("cubixles_backend_distributed 0"));
    Ok(())
}

#[tokio::test]
async fn test_request_id_generated_and_propagated() -> Result<()> {
    let app = spawn_app()?;
    let generated = app.get("/health", "10.0.0.1").await?;
    let id = generated.headers["x-request-id"].to_str()?;
    assert!(id.starts_with("cbx-"));
    assert_eq!(id.len(), 4 + 16);

    let request = axum::http::Request::builder()
        .uri("/health")
        .header("x-request-id", "upstream-123")
        .body(axum::body::Body::empty())?;
    let propagated = app.send(request).await?;
    assert_eq!(propagated.headers["x-request-id"], "upstream-123");
    Ok(())
}

// ── Nonce issuance ──────────────────────────────────────────────────

#[tokio::test]
async fn test_nonce_carries_typed_data() -> Result<()> {
    let app = spawn_app()?;
    let response = app.get("/api/nonce?chainId=8453", "10.0.0.1").await?;
    assert_eq!(response.status, StatusCode::OK);

    let nonce = response.body["nonce"].as_str().unwrap_or_default();
    assert_eq!(nonce.split('.').count(), 4);
    assert_eq!(response.body["expiresAt"], crate::utils::START_MS + 300_000);
    assert_eq!(response.body["typedData"]["primaryType"], "MetadataPin");
    assert_eq!(response.body["typedData"]["domain"]["chainId"], 8453);
    assert_eq!(response.body["typedData"]["message"]["nonce"], nonce);

    let unsupported = app.get("/api/nonce?chainId=137", "10.0.0.1").await?;
    assert_eq!(unsupported.body["typedData"]["domain"]["chainId"], 1);
    Ok(())
}

#[tokio::test]
async fn test_nonce_rate_limited_per_ip() -> Result<()> {
    let app = spawn_app()?;
    for _ in 0..10 {
        assert_eq!(app.get("/api/nonce", "10.0.0.9").await?.status, StatusCode::OK);
    }
    let limited = app.get("/api/nonce", "10.0.0.9").await?;
    assert_eq!(limited.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(limited.headers["retry-after"], "1");
    assert_eq!(limited.body["code"], "rate_limited");

    // Other callers are unaffected.
    assert_eq!(app.get("/api/nonce", "10.0.0.10").await?.status, StatusCode::OK);

    app.clock.advance(1_000);
    assert_eq!(app.get("/api/nonce", "10.0.0.9").await?.status, StatusCode::OK);
    Ok(())
}

// ── Authentication ──────────────────────────────────────────────────

#[tokio::test]
async fn test_eoa_sign_in_flow() -> Result<()> {
    let app = spawn_app()?;
    let key = wallet(1);
    let address = address_of(&key);

    let nonce = app.fetch_nonce("10.0.0.1").await?;
    let body = json!({
        "address": address.to_lower_hex(),
        "nonce": nonce,
        "signature": sign_nonce(&key, &nonce, 1),
    });
    let response = app.post_json("/api/auth/verify", "10.0.0.1", &body).await?;
    assert_eq!(response.status, StatusCode::OK, "{}", response.text);
    assert_eq!(response.body["success"], true);
    assert_eq!(response.body["address"], address.to_checksum());
    assert_eq!(app.chain.calls(), 0);
    Ok(())
}

#[tokio::test]
async fn test_replayed_nonce_rejected() -> Result<()> {
    let app = spawn_app()?;
    let key = wallet(2);
    let nonce = app.fetch_nonce("10.0.0.1").await?;
    let body = json!({
        "address": address_of(&key).to_lower_hex(),
        "nonce": nonce,
        "signature": sign_nonce(&key, &nonce, 1),
    });

    let first = app.post_json("/api/auth/verify", "10.0.0.1", &body).await?;
    assert_eq!(first.status, StatusCode::OK);

    let replay = app.post_json("/api/auth/verify", "10.0.0.2", &body).await?;
    assert_eq!(replay.status, StatusCode::UNAUTHORIZED);
    assert_eq!(replay.body["success"], false);
    assert_eq!(replay.body["error"], "Nonce already used");
    assert_eq!(replay.body["code"], "nonce_replayed");
    Ok(())
}

#[tokio::test]
async fn test_tampered_nonce_rejected() -> Result<()> {
    let app = spawn_app()?;
    let key = wallet(3);
    let nonce = app.fetch_nonce("10.0.0.1").await?;
    let forged = nonce.replacen(".300000.", ".999999999.", 1);
    let body = json!({
        "address": address_of(&key).to_lower_hex(),
        "nonce": forged,
        "signature": sign_nonce(&key, &forged, 1),
    });
    let response = app.post_json("/api/auth/verify", "10.0.0.1", &body).await?;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.body["code"], "invalid_nonce_signature");
    Ok(())
}

#[tokio::test]
async fn test_expired_nonce_rejected() -> Result<()> {
    let app = spawn_app()?;
    let key = wallet(4);
    let nonce = app.fetch_nonce("10.0.0.1").await?;
    app.clock.advance(300_001);
    let body = json!({
        "address": address_of(&key).to_lower_hex(),
        "nonce": nonce,
        "signature": sign_nonce(&key, &nonce, 1),
    });
    let response = app.post_json("/api/auth/verify", "10.0.0.1", &body).await?;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.body["error"], "Nonce expired");
    Ok(())
}

#[tokio::test]
async fn test_wrong_signer_rejected() -> Result<()> {
    let app = spawn_app()?;
    let nonce = app.fetch_nonce("10.0.0.1").await?;
    let body = json!({
        "address": address_of(&wallet(5)).to_lower_hex(),
        "nonce": nonce,
        "signature": sign_nonce(&wallet(6), &nonce, 1),
    });
    let response = app.post_json("/api/auth/verify", "10.0.0.1", &body).await?;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.body["code"], "signature_mismatch");
    Ok(())
}

#[tokio::test]
async fn test_malformed_requests_are_bad_request() -> Result<()> {
    let app = spawn_app()?;

    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/api/auth/verify")
        .header("content-type", "application/json")
        .body(axum::body::Body::from("{not json"))?;
    assert_eq!(app.send(request).await?.status, StatusCode::BAD_REQUEST);

    let bad_nonce = json!({ "address": "0x00000000000000000000000000000000000000aa", "nonce": "abc", "signature": "0x00" });
    let response = app.post_json("/api/auth/verify", "10.0.0.3", &bad_nonce).await?;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["error"], "Invalid nonce format");
    Ok(())
}

#[tokio::test]
async fn test_malformed_credentials_do_not_spend_nonce() -> Result<()> {
    let app = spawn_app()?;
    let key = wallet(9);
    let nonce = app.fetch_nonce("10.0.0.1").await?;
    let signature = sign_nonce(&key, &nonce, 1);

    let typo = json!({ "address": "0x1234", "nonce": nonce, "signature": signature });
    let response = app.post_json("/api/auth/verify", "10.0.0.1", &typo).await?;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["code"], "invalid_address");

    let empty = json!({ "address": address_of(&key).to_lower_hex(), "nonce": nonce, "signature": "" });
    let response = app.post_json("/api/auth/verify", "10.0.0.1", &empty).await?;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["code"], "missing_credentials");

    let valid = json!({
        "address": address_of(&key).to_lower_hex(),
        "nonce": nonce,
        "signature": signature,
    });
    let response = app.post_json("/api/auth/verify", "10.0.0.1", &valid).await?;
    assert_eq!(response.status, StatusCode::OK, "{}", response.text);
    Ok(())
}

#[tokio::test]
async fn test_contract_wallet_sign_in() -> Result<()> {
    let app = spawn_app()?;
    let safe = Address::parse("0x00000000000000000000000000000000000000aa")?;
    app.chain.deploy(safe);

    let nonce = app.fetch_nonce("10.0.0.1").await?;
    let body = json!({
        "address": safe.to_lower_hex(),
        "nonce": nonce,
        "signature": "0x1234",
        "chainId": 1,
    });
    let response = app.post_json("/api/auth/verify", "10.0.0.1", &body).await?;
    assert_eq!(response.status, StatusCode::OK, "{}", response.text);
    assert_eq!(response.body["address"], safe.to_checksum());
    // get_code then the bytes32 overload.
    assert_eq!(app.chain.calls(), 2);
    Ok(())
}

#[tokio::test]
async fn test_actor_rate_limit_applies_after_authentication() -> Result<()> {
    let app = spawn_app()?;
    let key = wallet(7);
    let address = address_of(&key).to_lower_hex();

    for i in 0..5 {
        let ip = format!("10.1.0.{i}");
        let nonce = app.fetch_nonce(&ip).await?;
        let body = json!({
            "address": address,
            "nonce": nonce,
            "signature": sign_nonce(&key, &nonce, 1),
        });
        let response = app.post_json("/api/auth/verify", &ip, &body).await?;
        let expected = if i < 4 {
            StatusCode::OK
        } else {
            StatusCode::TOO_MANY_REQUESTS
        };
        assert_eq!(response.status, expected, "attempt {i}");
    }
    Ok(())
}

// ── Cached reads ────────────────────────────────────────────────────

#[tokio::test]
async fn test_wallet_kind_is_cached() -> Result<()> {
    let app = spawn_app()?;
    let safe = Address::parse("0x00000000000000000000000000000000000000bb")?;
    app.chain.deploy(safe);
    let uri = format!("/api/wallet/{}", safe.to_lower_hex());

    let first = app.get(&uri, "10.0.0.1").await?;
    assert_eq!(first.status, StatusCode::OK, "{}", first.text);
    assert_eq!(first.body["kind"], "contract");
    assert_eq!(first.body["cached"], false);

    let second = app.get(&uri, "10.0.0.1").await?;
    assert_eq!(second.body["kind"], "contract");
    assert_eq!(second.body["cached"], true);
    assert_eq!(app.chain.calls(), 1);

    // Ten-minute TTL.
    app.clock.advance(10 * 60 * 1000 + 1);
    let refreshed = app.get(&uri, "10.0.0.1").await?;
    assert_eq!(refreshed.body["cached"], false);
    assert_eq!(app.chain.calls(), 2);
    Ok(())
}

#[tokio::test]
async fn test_wallet_kind_eoa_and_bad_address() -> Result<()> {
    let app = spawn_app()?;
    let eoa = address_of(&wallet(8));
    let response = app
        .get(&format!("/api/wallet/{}", eoa.to_lower_hex()), "10.0.0.1")
        .await?;
    assert_eq!(response.body["kind"], "eoa");
    assert_eq!(response.body["chainId"], 1);

    let bad = app.get("/api/wallet/0xnothex", "10.0.0.1").await?;
    assert_eq!(bad.status, StatusCode::BAD_REQUEST);
    assert_eq!(bad.body["code"], "invalid_address");
    Ok(())
}

#[tokio::test]
async fn test_wallet_kind_without_rpc_is_upstream_error() -> Result<()> {
    let app = spawn_app_with(test_config(), false)?;
    let response = app
        .get("/api/wallet/0x00000000000000000000000000000000000000cc", "10.0.0.1")
        .await?;
    assert_eq!(response.status, StatusCode::BAD_GATEWAY);
    Ok(())
}

// ── Startup ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_missing_secret_fails_startup() -> Result<()> {
    let mut config = test_config();
    config.auth_secret = String::new();
    assert!(spawn_app_with(config, true).is_err());
    Ok(())
}
