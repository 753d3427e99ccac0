//! Sorted-set and session-signal store abstraction.
//!
//! The cache and exposure tracker only need a handful of sorted-set
//! primitives; both the Redis adapter and the in-memory adapter follow Redis
//! semantics (ascending order by score then member, negative rank indices,
//! missing keys behave as empty).

mod memory;
mod redis_store;

pub use memory::InMemoryStore;
pub use redis_store::{RedisStore, SharedRedis};

use crate::error::Result;
use async_trait::async_trait;

#[async_trait]
pub trait SortedSetStore: Send + Sync {
    async fn zadd_multiple(&self, key: &str, items: &[(f64, String)]) -> Result<()>;

    /// Increment one member's score, creating it at `delta` when absent.
    async fn zincr(&self, key: &str, member: &str, delta: f64) -> Result<f64>;

    /// Remove members by ascending rank, inclusive on both ends.
    async fn zremrangebyrank(&self, key: &str, start: isize, stop: isize) -> Result<()>;

    async fn zcard(&self, key: &str) -> Result<u64>;

    /// Members by descending score, inclusive rank range.
    async fn zrevrange_withscores(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<(String, f64)>>;

    async fn zscore(&self, key: &str, member: &str) -> Result<Option<f64>>;

    async fn expire(&self, key: &str, seconds: i64) -> Result<()>;

    /// Remaining TTL in seconds; `-1` without expiry, `-2` when missing.
    async fn ttl(&self, key: &str) -> Result<i64>;

    async fn del(&self, key: &str) -> Result<()>;

    /// Atomically replace `to` with `from`, keeping the TTL of `from`.
    async fn rename(&self, from: &str, to: &str) -> Result<()>;
}

/// Per-session engagement signals written by the activity tracker.
#[async_trait]
pub trait SessionSignalStore: Send + Sync {
    /// Boost recorded for `field` in hash `key`, if any.
    async fn engagement_boost(&self, key: &str, field: &str) -> Result<Option<f64>>;
}

/// Trim a sorted set to its `max_items` highest-scoring members.
pub(crate) async fn trim_to<S: SortedSetStore + ?Sized>(
    store: &S,
    key: &str,
    max_items: usize,
) -> Result<()> {
    let size = store.zcard(key).await? as usize;
    if size > max_items {
        store
            .zremrangebyrank(key, 0, (size - max_items - 1) as isize)
            .await?;
    }
    Ok(())
}
