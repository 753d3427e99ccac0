use super::{SessionSignalStore, SortedSetStore};
use crate::error::Result;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Shared Redis connection manager
pub type SharedRedis = Arc<Mutex<ConnectionManager>>;

#[derive(Clone)]
pub struct RedisStore {
    redis: SharedRedis,
}

impl RedisStore {
    pub fn new(redis: SharedRedis) -> Self {
        Self { redis }
    }

    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)?;
        let manager = ConnectionManager::new(client).await?;
        debug!(url = %url, "Connected recommendation store to Redis");
        Ok(Self::new(Arc::new(Mutex::new(manager))))
    }
}

#[async_trait]
impl SortedSetStore for RedisStore {
    async fn zadd_multiple(&self, key: &str, items: &[(f64, String)]) -> Result<()> {
        if items.is_empty() {
            return Ok(());
        }
        let mut conn = self.redis.lock().await;
        let _: () = conn.zadd_multiple(key, items).await?;
        Ok(())
    }

    async fn zincr(&self, key: &str, member: &str, delta: f64) -> Result<f64> {
        let mut conn = self.redis.lock().await;
        let score: f64 = conn.zincr(key, member, delta).await?;
        Ok(score)
    }

    async fn zremrangebyrank(&self, key: &str, start: isize, stop: isize) -> Result<()> {
        let mut conn = self.redis.lock().await;
        let _: () = conn.zremrangebyrank(key, start, stop).await?;
        Ok(())
    }

    async fn zcard(&self, key: &str) -> Result<u64> {
        let mut conn = self.redis.lock().await;
        let size: u64 = conn.zcard(key).await?;
        Ok(size)
    }

    async fn zrevrange_withscores(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<(String, f64)>> {
        let mut conn = self.redis.lock().await;
        let members: Vec<(String, f64)> = conn.zrevrange_withscores(key, start, stop).await?;
        Ok(members)
    }

    async fn zscore(&self, key: &str, member: &str) -> Result<Option<f64>> {
        let mut conn = self.redis.lock().await;
        let score: Option<f64> = conn.zscore(key, member).await?;
        Ok(score)
    }

    async fn expire(&self, key: &str, seconds: i64) -> Result<()> {
        let mut conn = self.redis.lock().await;
        let _: () = conn.expire(key, seconds).await?;
        Ok(())
    }

    async fn ttl(&self, key: &str) -> Result<i64> {
        let mut conn = self.redis.lock().await;
        let ttl: i64 = conn.ttl(key).await?;
        Ok(ttl)
    }

    async fn del(&self, key: &str) -> Result<()> {
        let mut conn = self.redis.lock().await;
        let _: () = conn.del(key).await?;
        Ok(())
    }

    async fn rename(&self, from: &str, to: &str) -> Result<()> {
        let mut conn = self.redis.lock().await;
        let _: () = conn.rename(from, to).await?;
        Ok(())
    }
}

#[async_trait]
impl SessionSignalStore for RedisStore {
    async fn engagement_boost(&self, key: &str, field: &str) -> Result<Option<f64>> {
        let mut conn = self.redis.lock().await;
        let raw: Option<String> = conn.hget(key, field).await?;
        Ok(raw.and_then(|value| value.parse().ok()))
    }
}
