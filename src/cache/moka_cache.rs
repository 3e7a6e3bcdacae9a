//! moka-backed query cache with invalidation signals

use super::{CacheKey, QueryCache};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use moka::future::Cache;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::debug;

/// Default broadcast capacity for invalidation signals
const DEFAULT_SIGNAL_CAPACITY: usize = 1024;

/// "This cached result is stale" signal published to subscribed views
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invalidation {
    pub key: CacheKey,
    pub at: DateTime<Utc>,
}

/// Process-wide query cache.
///
/// Cloning shares the same entries and signal channel. Views subscribe to
/// invalidation signals and re-fetch the keys they own.
///
/// # Example
///
/// ```rust
/// use serde_json::json;
/// use taskboard_sync::cache::{CacheKey, MokaQueryCache, QueryCache};
///
/// # tokio_test::block_on(async {
/// let cache = MokaQueryCache::new(100);
/// let key = CacheKey::named("tasks").with("p-1");
/// let mut signals = cache.subscribe();
///
/// let rows = cache
///     .get_or_fetch(&key, || async { Ok(json!([{ "id": 1 }])) })
///     .await
///     .unwrap();
/// assert_eq!(cache.get(&key).await, Some(rows));
///
/// cache.invalidate(&key).await;
/// assert_eq!(cache.get(&key).await, None);
/// assert_eq!(signals.try_recv().unwrap().key, key);
/// # });
/// ```
#[derive(Clone)]
pub struct MokaQueryCache {
    entries: Cache<CacheKey, Arc<serde_json::Value>>,
    signals: broadcast::Sender<Invalidation>,
}

impl MokaQueryCache {
    pub fn new(max_capacity: u64) -> Self {
        Self::with_options(max_capacity, None, DEFAULT_SIGNAL_CAPACITY)
    }

    /// Create a cache with an optional time-to-live and an explicit signal capacity
    pub fn with_options(max_capacity: u64, ttl: Option<Duration>, signal_capacity: usize) -> Self {
        let mut builder = Cache::builder().max_capacity(max_capacity);
        if let Some(ttl) = ttl {
            builder = builder.time_to_live(ttl);
        }
        let (signals, _) = broadcast::channel(signal_capacity.max(1));
        Self {
            entries: builder.build(),
            signals,
        }
    }

    /// Store a fetched result
    pub async fn put(&self, key: CacheKey, value: serde_json::Value) {
        self.entries.insert(key, Arc::new(value)).await;
    }

    /// Read `key`, running `fetch` on a miss and caching its result.
    ///
    /// Concurrent misses on the same key share one fetch.
    pub async fn get_or_fetch<F, Fut>(&self, key: &CacheKey, fetch: F) -> Result<serde_json::Value>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<serde_json::Value>> + Send + 'static,
    {
        let value = self
            .entries
            .try_get_with(key.clone(), async move { fetch().await.map(Arc::new) })
            .await
            .map_err(|e| anyhow!("fetch for {} failed: {:#}", key, e))?;
        Ok((*value).clone())
    }

    /// Subscribe to invalidation signals
    pub fn subscribe(&self) -> broadcast::Receiver<Invalidation> {
        self.signals.subscribe()
    }

    /// Approximate number of cached entries
    pub async fn entry_count(&self) -> u64 {
        self.entries.run_pending_tasks().await;
        self.entries.entry_count()
    }
}

impl Default for MokaQueryCache {
    fn default() -> Self {
        Self::new(10_000)
    }
}

#[async_trait]
impl QueryCache for MokaQueryCache {
    async fn get(&self, key: &CacheKey) -> Option<serde_json::Value> {
        self.entries.get(key).await.map(|value| (*value).clone())
    }

    async fn invalidate(&self, key: &CacheKey) {
        self.entries.invalidate(key).await;
        let signal = Invalidation {
            key: key.clone(),
            at: Utc::now(),
        };
        // No subscribed views is fine
        let subscribers = self.signals.send(signal).unwrap_or(0);
        debug!(cache_key = %key, subscribers, "Cache key invalidated");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_put_get_invalidate() {
        let cache = MokaQueryCache::default();
        let key = CacheKey::new(["tasks", "p-1"]);

        assert!(cache.get(&key).await.is_none());
        cache.put(key.clone(), json!([{"id": "t-1"}])).await;
        assert_eq!(cache.get(&key).await, Some(json!([{"id": "t-1"}])));

        cache.invalidate(&key).await;
        assert!(cache.get(&key).await.is_none());

        // Idempotent
        cache.invalidate(&key).await;
        assert!(cache.get(&key).await.is_none());
    }

    #[tokio::test]
    async fn test_invalidation_only_touches_its_key() {
        let cache = MokaQueryCache::default();
        let a = CacheKey::new(["tasks", "p-1"]);
        let b = CacheKey::new(["tasks", "p-2"]);
        cache.put(a.clone(), json!(1)).await;
        cache.put(b.clone(), json!(2)).await;

        cache.invalidate(&a).await;
        assert!(cache.get(&a).await.is_none());
        assert_eq!(cache.get(&b).await, Some(json!(2)));
    }

    #[tokio::test]
    async fn test_invalidation_signal_reaches_subscribers() {
        let cache = MokaQueryCache::default();
        let mut rx1 = cache.subscribe();
        let mut rx2 = cache.clone().subscribe();
        let key = CacheKey::named("dashboard");

        cache.invalidate(&key).await;

        assert_eq!(rx1.try_recv().unwrap().key, key);
        assert_eq!(rx2.try_recv().unwrap().key, key);
    }

    #[tokio::test]
    async fn test_get_or_fetch_caches_result() {
        let cache = MokaQueryCache::default();
        let key = CacheKey::named("projects");

        let first = cache
            .get_or_fetch(&key, || async { Ok(json!(["p-1"])) })
            .await
            .unwrap();
        assert_eq!(first, json!(["p-1"]));

        // Hit: the second fetch must not run
        let second = cache
            .get_or_fetch(&key, || async { Err(anyhow!("should not be called")) })
            .await
            .unwrap();
        assert_eq!(second, json!(["p-1"]));
    }

    #[tokio::test]
    async fn test_get_or_fetch_error_is_not_cached() {
        let cache = MokaQueryCache::default();
        let key = CacheKey::named("projects");

        let err = cache
            .get_or_fetch(&key, || async { Err(anyhow!("backend down")) })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("backend down"));
        assert!(cache.get(&key).await.is_none());
    }
}
