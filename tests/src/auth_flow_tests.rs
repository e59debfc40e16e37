//! Authorization primitives composed across instances and tasks, without HTTP.

use anyhow::Result;
use cubixles_auth::{
    BackendSelector, Clock, ManualClock, MemoryStore, NonceAuthenticator, RateLimitOptions,
    RateLimiter, ResponseCache, Store,
};
use cubixles_types::Rejection;
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::utils::START_MS;

const SECRET: &[u8] = b"shared-instance-secret";

fn clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(START_MS))
}

fn memory(clock: &Arc<ManualClock>) -> Arc<MemoryStore> {
    Arc::new(MemoryStore::new(clock.clone(), 100))
}

// ── Replay tracking across instances ────────────────────────────────

#[tokio::test]
async fn test_shared_store_blocks_cross_instance_replay() -> Result<()> {
    let clock = clock();
    let store: Arc<dyn Store> = memory(&clock);
    let a = NonceAuthenticator::new(SECRET, store.clone(), clock.clone())?;
    let b = NonceAuthenticator::new(SECRET, store, clock.clone())?;

    let issued = a.issue();
    assert!(b.verify(&issued.nonce).await.is_ok());
    assert_eq!(a.verify(&issued.nonce).await, Err(Rejection::Replayed));
    Ok(())
}

#[tokio::test]
async fn test_local_stores_allow_cross_instance_replay() -> Result<()> {
    // Without a shared backend each instance only knows its own consumed nonces.
    let clock = clock();
    let a = NonceAuthenticator::new(SECRET, memory(&clock), clock.clone())?;
    let b = NonceAuthenticator::new(SECRET, memory(&clock), clock.clone())?;

    let issued = a.issue();
    assert!(a.verify(&issued.nonce).await.is_ok());
    assert!(b.verify(&issued.nonce).await.is_ok());
    assert_eq!(b.verify(&issued.nonce).await, Err(Rejection::Replayed));
    Ok(())
}

#[tokio::test]
async fn test_foreign_secret_nonce_rejected() -> Result<()> {
    let clock = clock();
    let a = NonceAuthenticator::new(SECRET, memory(&clock), clock.clone())?;
    let b = NonceAuthenticator::new(b"other-deployment", memory(&clock), clock.clone())?;

    let issued = a.issue();
    assert_eq!(
        b.verify(&issued.nonce).await,
        Err(Rejection::InvalidNonceSignature)
    );
    Ok(())
}

// ── Rate limiting under concurrency ─────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_never_overspend_bucket() -> Result<()> {
    let clock = clock();
    let limiter = Arc::new(RateLimiter::new(memory(&clock), clock.clone()));
    let options = RateLimitOptions::new(10.0, 0.0);

    let handles: Vec<_> = (0..50)
        .map(|_| {
            let limiter = limiter.clone();
            tokio::spawn(async move { limiter.check("burst:ip:1.2.3.4", &options).await.ok })
        })
        .collect();

    let mut admitted = 0;
    for handle in handles {
        if handle.await? {
            admitted += 1;
        }
    }
    assert_eq!(admitted, 10);
    Ok(())
}

#[tokio::test]
async fn test_buckets_are_independent_per_key() -> Result<()> {
    let clock = clock();
    let limiter = RateLimiter::new(memory(&clock), clock.clone());
    let options = RateLimitOptions::new(1.0, 0.0);

    assert!(limiter.check("k:a", &options).await.ok);
    assert!(!limiter.check("k:a", &options).await.ok);
    assert!(limiter.check("k:b", &options).await.ok);
    Ok(())
}

#[tokio::test]
async fn test_refill_over_time() -> Result<()> {
    let clock = clock();
    let limiter = RateLimiter::new(memory(&clock), clock.clone());
    let options = RateLimitOptions::new(2.0, 0.5);

    assert!(limiter.check("k", &options).await.ok);
    assert!(limiter.check("k", &options).await.ok);
    let blocked = limiter.check("k", &options).await;
    assert!(!blocked.ok);
    assert_eq!(blocked.retry_after, 2);

    clock.advance(1_000);
    assert!(!limiter.check("k", &options).await.ok);
    clock.advance(1_000);
    assert!(limiter.check("k", &options).await.ok);
    Ok(())
}

// ── Response cache ──────────────────────────────────────────────────

#[tokio::test]
async fn test_cache_entries_expire() -> Result<()> {
    let clock = clock();
    let cache = ResponseCache::new(memory(&clock));

    cache.set("owner:1", &json!({ "owner": "0xabc" }), Some(1_000)).await;
    cache.set("static", &json!([1, 2, 3]), None).await;

    let hit: Option<serde_json::Value> = cache.get("owner:1").await;
    assert_eq!(hit, Some(json!({ "owner": "0xabc" })));

    clock.advance(1_001);
    assert_eq!(cache.get::<serde_json::Value>("owner:1").await, None);
    assert_eq!(cache.get::<Vec<u8>>("static").await, Some(vec![1, 2, 3]));

    cache.clear("static").await;
    assert_eq!(cache.get::<Vec<u8>>("static").await, None);
    Ok(())
}

// ── Backend selection ───────────────────────────────────────────────

#[tokio::test]
async fn test_unreachable_redis_falls_back_to_local_state() -> Result<()> {
    let clock = clock();
    let selector = BackendSelector::new(
        Some("redis://127.0.0.1:1".into()),
        "cbx-test",
        Duration::from_secs(2),
    );
    assert!(selector.has_distributed_backend());

    let local = memory(&clock);
    let store = selector.store(local.clone(), false);
    let limiter = RateLimiter::new(store.clone(), clock.clone());
    let options = RateLimitOptions::new(1.0, 0.0);
    let started = Instant::now();
    assert!(limiter.check("fallback:k", &options).await.ok);
    assert!(!limiter.check("fallback:k", &options).await.ok);
    assert!(limiter.check("fallback:other", &options).await.ok);
    // A refused connection degrades immediately rather than after the timeout.
    assert!(started.elapsed() < Duration::from_secs(1), "{:?}", started.elapsed());
    assert_eq!(local.bucket_count(), 2);

    let nonces = NonceAuthenticator::new(SECRET, store, clock.clone())?;
    let issued = nonces.issue();
    assert!(nonces.verify(&issued.nonce).await.is_ok());
    assert_eq!(nonces.verify(&issued.nonce).await, Err(Rejection::Replayed));
    Ok(())
}

#[tokio::test]
async fn test_fail_closed_rejects_when_redis_down() -> Result<()> {
    let clock = clock();
    let selector = BackendSelector::new(
        Some("redis://127.0.0.1:1".into()),
        "cbx-test",
        Duration::from_millis(200),
    );
    let store = selector.store(memory(&clock), true);
    let nonces = NonceAuthenticator::new(SECRET, store, clock.clone())?;

    let issued = nonces.issue();
    assert_eq!(
        nonces.verify(&issued.nonce).await,
        Err(Rejection::BackendUnavailable)
    );
    Ok(())
}

#[tokio::test]
async fn test_without_url_selects_memory() -> Result<()> {
    let clock = clock();
    let selector = BackendSelector::new(Some("   ".into()), "cbx", Duration::from_millis(200));
    assert!(!selector.has_distributed_backend());
    assert!(selector.client().is_none());
    assert_eq!(selector.store(memory(&clock), true).kind().as_str(), "memory");
    assert_eq!(clock.now_ms(), START_MS);
    Ok(())
}
