//! Query cache
//!
//! The query cache is a key-addressed store of fetched results. Views read
//! through it and re-fetch on a miss; the invalidation engine marks entries
//! stale when the rows behind them change.

mod key;
mod moka_cache;

pub use key::CacheKey;
pub use moka_cache::{Invalidation, MokaQueryCache};

use async_trait::async_trait;

/// Key-addressed store of fetched query results.
///
/// Invalidation must be idempotent: invalidating an absent or already-stale
/// key is a no-op.
#[async_trait]
pub trait QueryCache: Send + Sync {
    /// Cached value for `key`, or `None` on a miss
    async fn get(&self, key: &CacheKey) -> Option<serde_json::Value>;

    /// Mark the value under `key` stale
    async fn invalidate(&self, key: &CacheKey);
}
