//! Per-user ranked recommendation cache on top of a sorted-set store.
//!
//! Key layout:
//! - `recommend:user:{user_id}` for books
//! - `recommend:review:user:{user_id}:feed` for the review feed
//! - `recommend:review:user:{user_id}:book:{book_id}` for book-scoped reviews
//!
//! Members are `{kind}:{id}` strings scored by the final recommendation score.

mod exposure;

pub use exposure::ExposureTracker;

use crate::config::CacheConfig;
use crate::error::Result;
use crate::models::{CacheStats, RecommendationResult};
use crate::services::sampling::WindowSampler;
use crate::store::{trim_to, SortedSetStore};
use crate::utils::{decode_member, encode_member, paginate};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheNamespace {
    Book,
    Review,
}

impl CacheNamespace {
    fn member_kind(self) -> &'static str {
        match self {
            CacheNamespace::Book => "book",
            CacheNamespace::Review => "review",
        }
    }
}

/// What a cached list is keyed by besides the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheScope {
    #[default]
    Feed,
    Book(i64),
}

impl CacheScope {
    pub fn from_book(book_id: Option<i64>) -> Self {
        book_id.map(CacheScope::Book).unwrap_or(CacheScope::Feed)
    }
}

/// One cursor-paginated read.
#[derive(Debug, Clone, Copy, Default)]
pub struct PageRequest<'a> {
    /// Id of the last item the caller has already seen
    pub cursor: Option<i64>,
    pub limit: usize,
    /// Re-order the returned page with the window sampler
    pub sample: bool,
    pub session_id: Option<&'a str>,
}

impl<'a> PageRequest<'a> {
    pub fn new(cursor: Option<i64>, limit: usize) -> Self {
        Self {
            cursor,
            limit,
            ..Default::default()
        }
    }

    pub fn sampled(mut self, sample: bool, session_id: Option<&'a str>) -> Self {
        self.sample = sample;
        self.session_id = session_id;
        self
    }
}

pub struct RecommendationCache {
    store: Arc<dyn SortedSetStore>,
    namespace: CacheNamespace,
    config: CacheConfig,
    sampler: WindowSampler,
}

impl RecommendationCache {
    pub fn new(
        store: Arc<dyn SortedSetStore>,
        namespace: CacheNamespace,
        config: CacheConfig,
        sampler: WindowSampler,
    ) -> Self {
        Self {
            store,
            namespace,
            config,
            sampler,
        }
    }

    pub fn key(&self, user_id: i64, scope: CacheScope) -> String {
        match (self.namespace, scope) {
            (CacheNamespace::Book, _) => format!("recommend:user:{}", user_id),
            (CacheNamespace::Review, CacheScope::Feed) => {
                format!("recommend:review:user:{}:feed", user_id)
            }
            (CacheNamespace::Review, CacheScope::Book(book_id)) => {
                format!("recommend:review:user:{}:book:{}", user_id, book_id)
            }
        }
    }

    fn member(&self, entity_id: i64) -> String {
        encode_member(self.namespace.member_kind(), entity_id)
    }

    /// Replace the cached list with `scores`.
    ///
    /// The new set is built under a staging key and renamed over the live
    /// key, so readers see either the old or the new list.
    pub async fn save(&self, user_id: i64, scope: CacheScope, scores: &HashMap<i64, f64>) {
        let key = self.key(user_id, scope);
        match self.try_save(&key, scores).await {
            Ok(()) => info!(
                user_id = user_id,
                items = scores.len(),
                ttl_hours = self.config.ttl_hours,
                "Saved recommendations"
            ),
            Err(e) => error!(user_id = user_id, key = %key, error = %e, "Failed to save recommendations"),
        }
    }

    async fn try_save(&self, key: &str, scores: &HashMap<i64, f64>) -> Result<()> {
        if scores.is_empty() {
            return self.store.del(key).await;
        }

        let staging = format!("{}:staging:{}", key, Uuid::new_v4());
        let written = self.write_staging(&staging, scores).await;
        let result = match written {
            Ok(()) => self.store.rename(&staging, key).await,
            Err(e) => Err(e),
        };

        if result.is_err() {
            if let Err(cleanup) = self.store.del(&staging).await {
                warn!(key = %staging, error = %cleanup, "Failed to drop staging key");
            }
        }
        result
    }

    async fn write_staging(&self, staging: &str, scores: &HashMap<i64, f64>) -> Result<()> {
        let items: Vec<(f64, String)> = scores
            .iter()
            .map(|(id, score)| (*score, self.member(*id)))
            .collect();

        self.store.zadd_multiple(staging, &items).await?;
        trim_to(self.store.as_ref(), staging, self.config.max_items).await?;
        self.store.expire(staging, self.config.ttl_seconds()).await
    }

    /// Read one page of the cached list, best first.
    pub async fn get(
        &self,
        user_id: i64,
        scope: CacheScope,
        page: PageRequest<'_>,
    ) -> Vec<RecommendationResult> {
        if page.limit == 0 {
            return Vec::new();
        }

        let key = self.key(user_id, scope);
        let members = match self.store.zrevrange_withscores(&key, 0, -1).await {
            Ok(members) => members,
            Err(e) => {
                warn!(user_id = user_id, key = %key, error = %e, "Failed to read recommendations");
                return Vec::new();
            }
        };

        let kind = self.namespace.member_kind();
        let ranked: Vec<RecommendationResult> = members
            .into_iter()
            .filter_map(|(member, score)| {
                decode_member(kind, &member).map(|id| RecommendationResult::from_cache(id, score))
            })
            .collect();

        let results = paginate(ranked, page.cursor, page.limit);
        let results = if page.sample && self.sampler.is_enabled() {
            self.sample_page(results, page.session_id)
        } else {
            results
        };
        debug!(user_id = user_id, count = results.len(), "Read cached recommendations");
        results
    }

    /// Re-order one page. The page's last item stays last so it remains a
    /// valid cursor for the next page; ranks are renumbered in place.
    fn sample_page(
        &self,
        mut page: Vec<RecommendationResult>,
        session_id: Option<&str>,
    ) -> Vec<RecommendationResult> {
        let Some(boundary) = page.pop() else {
            return page;
        };
        let first_rank = page.first().map(|r| r.rank).unwrap_or(boundary.rank);

        let mut sampled = self.sampler.apply(page, session_id);
        sampled.push(boundary);
        for (offset, result) in sampled.iter_mut().enumerate() {
            result.rank = first_rank + offset;
        }
        sampled
    }

    /// Bump one member's score and re-apply the trim and TTL policy.
    pub async fn increment_score(
        &self,
        user_id: Option<i64>,
        scope: CacheScope,
        entity_id: Option<i64>,
        delta: f64,
    ) -> Option<f64> {
        let (user_id, entity_id) = (user_id?, entity_id?);
        let key = self.key(user_id, scope);

        match self.try_increment(&key, entity_id, delta).await {
            Ok(score) => Some(score),
            Err(e) => {
                warn!(user_id = user_id, entity_id = entity_id, error = %e, "Failed to adjust score");
                None
            }
        }
    }

    async fn try_increment(&self, key: &str, entity_id: i64, delta: f64) -> Result<f64> {
        let score = self.store.zincr(key, &self.member(entity_id), delta).await?;
        trim_to(self.store.as_ref(), key, self.config.max_items).await?;
        self.store.expire(key, self.config.ttl_seconds()).await?;
        Ok(score)
    }

    pub async fn exists(&self, user_id: i64, scope: CacheScope) -> bool {
        let key = self.key(user_id, scope);
        match self.store.zcard(&key).await {
            Ok(size) => size > 0,
            Err(e) => {
                warn!(user_id = user_id, error = %e, "Failed to check cached recommendations");
                false
            }
        }
    }

    pub async fn clear(&self, user_id: i64, scope: CacheScope) {
        let key = self.key(user_id, scope);
        match self.store.del(&key).await {
            Ok(()) => info!(user_id = user_id, key = %key, "Cleared recommendations"),
            Err(e) => warn!(user_id = user_id, error = %e, "Failed to clear recommendations"),
        }
    }

    pub async fn score(&self, user_id: i64, scope: CacheScope, entity_id: i64) -> Option<f64> {
        let key = self.key(user_id, scope);
        match self.store.zscore(&key, &self.member(entity_id)).await {
            Ok(score) => score,
            Err(e) => {
                warn!(user_id = user_id, entity_id = entity_id, error = %e, "Failed to read score");
                None
            }
        }
    }

    /// Size, remaining TTL and existence. A missing key reports 0 items and 0 TTL.
    pub async fn stats(&self, user_id: i64, scope: CacheScope) -> CacheStats {
        let key = self.key(user_id, scope);
        let cached_items = self.store.zcard(&key).await.unwrap_or_else(|e| {
            warn!(user_id = user_id, error = %e, "Failed to read cache size");
            0
        });
        let ttl_seconds = self.store.ttl(&key).await.unwrap_or_else(|e| {
            warn!(user_id = user_id, error = %e, "Failed to read cache ttl");
            0
        });

        CacheStats {
            user_id,
            cached_items,
            ttl_seconds: ttl_seconds.max(0),
            exists: cached_items > 0,
        }
    }
}
