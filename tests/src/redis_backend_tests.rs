//! Shared-state behavior against a live Redis. Run with
//! `REDIS_URL=redis://127.0.0.1:6379 cargo test -- --ignored`.

use anyhow::Result;
use cubixles_auth::{
    BackendSelector, ManualClock, MemoryStore, NonceAuthenticator, RateLimitOptions, RateLimiter,
    Store,
};
use cubixles_types::Rejection;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::utils::START_MS;

/// One selector per test with its own key prefix, so runs never collide.
fn live_backend(test: &str) -> Option<(Arc<dyn Store>, Arc<ManualClock>)> {
    let url = std::env::var("REDIS_URL").ok()?;
    let stamp = SystemTime::now().duration_since(UNIX_EPOCH).ok()?.as_nanos();
    let selector = BackendSelector::new(
        Some(url),
        format!("cbx-it:{test}:{stamp}"),
        Duration::from_secs(2),
    );
    let clock = Arc::new(ManualClock::new(START_MS));
    let local = Arc::new(MemoryStore::new(clock.clone(), 100));
    Some((selector.store(local, true), clock))
}

#[tokio::test]
#[ignore = "requires REDIS_URL"]
async fn test_replay_set_is_shared_between_instances() -> Result<()> {
    let Some((store, clock)) = live_backend("replay") else {
        return Ok(());
    };
    let a = NonceAuthenticator::new(b"redis-secret", store.clone(), clock.clone())?;
    let b = NonceAuthenticator::new(b"redis-secret", store, clock.clone())?;

    let issued = a.issue();
    assert!(a.verify(&issued.nonce).await.is_ok());
    assert_eq!(b.verify(&issued.nonce).await, Err(Rejection::Replayed));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "requires REDIS_URL"]
async fn test_bucket_is_atomic_across_concurrent_callers() -> Result<()> {
    let Some((store, clock)) = live_backend("bucket") else {
        return Ok(());
    };
    let limiter = Arc::new(RateLimiter::new(store, clock));
    let options = RateLimitOptions::new(10.0, 0.0);

    let handles: Vec<_> = (0..50)
        .map(|_| {
            let limiter = limiter.clone();
            tokio::spawn(async move { limiter.check("shared:ip", &options).await.ok })
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
