use super::cache::{CacheNamespace, CacheScope, ExposureTracker, PageRequest, RecommendationCache};
use super::candidates::{
    deduplicate_and_merge, ReviewGraphCandidateGenerator, ReviewSearchCandidateGenerator,
};
use super::sampling::WindowSampler;
use super::scoring::ReviewHybridScorer;
use super::{rank_by_initial_score, rank_candidates};
use crate::config::{RecommendationConfig, ReviewRecommendationConfig};
use crate::models::{
    CandidateSource, RecommendationCandidate, RecommendationResult, RecommendationStats,
    ReviewScoreBreakdown,
};
use crate::ports::{ReviewGraphPort, ReviewSearchPort, UserContextLoader};
use crate::store::{SessionSignalStore, SortedSetStore};
use crate::utils::paginate;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// One review recommendation request. `book_id` scopes the list to a
/// single book; without it the request is for the user's feed.
#[derive(Debug, Clone, Default)]
pub struct ReviewRecommendationRequest {
    pub user_id: Option<i64>,
    pub book_id: Option<i64>,
    pub cursor: Option<i64>,
    pub limit: usize,
    pub force_refresh: bool,
    pub sample: bool,
    pub session_id: Option<String>,
}

impl ReviewRecommendationRequest {
    pub fn feed(user_id: i64, limit: usize) -> Self {
        Self {
            user_id: Some(user_id),
            limit,
            ..Default::default()
        }
    }

    pub fn for_book(user_id: i64, book_id: i64, limit: usize) -> Self {
        Self {
            user_id: Some(user_id),
            book_id: Some(book_id),
            limit,
            ..Default::default()
        }
    }
}

/// 書評推薦服務（動態 feed + 單本書範圍）
///
/// Feed requests filter out recently exposed reviews and record what they
/// serve. Book-scoped requests never touch exposure.
pub struct ReviewRecommendationService {
    graph: ReviewGraphCandidateGenerator,
    search: ReviewSearchCandidateGenerator,
    scorer: ReviewHybridScorer,
    cache: RecommendationCache,
    exposure: ExposureTracker,
    config: ReviewRecommendationConfig,
}

impl ReviewRecommendationService {
    pub fn new(
        graph: Arc<dyn ReviewGraphPort>,
        search: Arc<dyn ReviewSearchPort>,
        context_loader: Arc<dyn UserContextLoader>,
        store: Arc<dyn SortedSetStore>,
        signals: Arc<dyn SessionSignalStore>,
        config: &RecommendationConfig,
    ) -> Self {
        let review = config.review.clone();
        Self {
            graph: ReviewGraphCandidateGenerator::new(graph, review.mix.clone()),
            search: ReviewSearchCandidateGenerator::new(search, context_loader, review.clone()),
            scorer: ReviewHybridScorer::new(review.weights.clone(), review.neutral.clone(), signals),
            cache: RecommendationCache::new(
                store.clone(),
                CacheNamespace::Review,
                review.cache.clone(),
                WindowSampler::new(config.sampling.clone()),
            ),
            exposure: ExposureTracker::new(store, review.exposure.clone()),
            config: review,
        }
    }

    pub async fn generate_recommendations(
        &self,
        request: ReviewRecommendationRequest,
    ) -> Vec<RecommendationResult> {
        if request.limit == 0 {
            return Vec::new();
        }

        let Some(user_id) = request.user_id else {
            return self
                .generate_default_recommendations(request.book_id, request.cursor, request.limit)
                .await;
        };

        let scope = CacheScope::from_book(request.book_id);
        let is_feed = scope == CacheScope::Feed;

        info!(
            user_id = user_id,
            book_id = ?request.book_id,
            limit = request.limit,
            force_refresh = request.force_refresh,
            "Generating review recommendations"
        );

        if !request.force_refresh && self.cache.exists(user_id, scope).await {
            let page = PageRequest::new(request.cursor, request.limit)
                .sampled(request.sample, request.session_id.as_deref());
            let cached = self.cache.get(user_id, scope, page).await;
            if is_feed {
                self.record_served(user_id, &cached).await;
            }
            return cached;
        }

        let candidates = match request.book_id {
            Some(book_id) => {
                self.search
                    .generate_book_scoped_candidates(book_id, self.config.max_candidates)
                    .await
            }
            None => self.generate_feed_candidates(user_id).await,
        };
        if candidates.is_empty() {
            warn!(user_id = user_id, "No review candidates generated, serving defaults");
            return self
                .generate_default_recommendations(request.book_id, request.cursor, request.limit)
                .await;
        }

        let mut unique = deduplicate_and_merge(candidates);
        if is_feed {
            let exposed = self.exposure.load_recent_ids(Some(user_id)).await;
            unique = filter_exposed(unique, &exposed);
        }

        let scores = self
            .scorer
            .batch_calculate(Some(user_id), request.book_id, &unique)
            .await;
        self.cache.save(user_id, scope, &scores).await;

        let results = paginate(rank_candidates(&unique, &scores), request.cursor, request.limit);
        if is_feed {
            self.record_served(user_id, &results).await;
        }

        info!(
            user_id = user_id,
            book_id = ?request.book_id,
            count = results.len(),
            "Generated review recommendations"
        );
        results
    }

    /// Popular reviews (of one book, when scoped) without personalization.
    pub async fn generate_default_recommendations(
        &self,
        book_id: Option<i64>,
        cursor: Option<i64>,
        limit: usize,
    ) -> Vec<RecommendationResult> {
        if limit == 0 {
            return Vec::new();
        }

        let pool = self.config.max_candidates.max(limit);
        let candidates = match book_id {
            Some(book_id) => self.search.generate_book_scoped_candidates(book_id, pool).await,
            None => self.search.generate_popular_candidates(pool).await,
        };
        paginate(rank_by_initial_score(&candidates), cursor, limit)
    }

    pub async fn get_cached_recommendations(
        &self,
        user_id: i64,
        book_id: Option<i64>,
        cursor: Option<i64>,
        limit: usize,
    ) -> Vec<RecommendationResult> {
        self.cache
            .get(
                user_id,
                CacheScope::from_book(book_id),
                PageRequest::new(cursor, limit),
            )
            .await
    }

    pub async fn refresh_recommendations(&self, user_id: i64, book_id: Option<i64>) {
        info!(user_id = user_id, book_id = ?book_id, "Refreshing review recommendations");
        self.cache.clear(user_id, CacheScope::from_book(book_id)).await;

        let request = ReviewRecommendationRequest {
            user_id: Some(user_id),
            book_id,
            limit: self.config.refresh_limit,
            force_refresh: true,
            ..Default::default()
        };
        self.generate_recommendations(request).await;
    }

    /// Component scores of `review_id` as if it were a popularity candidate
    /// with a mid-range score and unknown age.
    pub async fn get_score_breakdown(
        &self,
        user_id: i64,
        book_id: Option<i64>,
        review_id: i64,
    ) -> ReviewScoreBreakdown {
        let candidate = RecommendationCandidate::new(
            review_id,
            CandidateSource::Popularity,
            0.5,
            "Score breakdown",
        );
        self.scorer
            .get_score_breakdown(Some(user_id), book_id, &candidate)
            .await
    }

    pub async fn get_stats(&self, user_id: i64, book_id: Option<i64>) -> RecommendationStats {
        self.cache
            .stats(user_id, CacheScope::from_book(book_id))
            .await
            .into()
    }

    pub async fn adjust_score(
        &self,
        user_id: Option<i64>,
        book_id: Option<i64>,
        review_id: Option<i64>,
        delta: f64,
    ) -> Option<f64> {
        self.cache
            .increment_score(user_id, CacheScope::from_book(book_id), review_id, delta)
            .await
    }

    async fn generate_feed_candidates(&self, user_id: i64) -> Vec<RecommendationCandidate> {
        let max = self.config.max_candidates;
        let graph_limit = ((max as f64) * self.config.mix.graph_share).round() as usize;
        let search_limit = max.saturating_sub(graph_limit);

        let (graph, search) = tokio::join!(
            self.graph.generate_feed_candidates(user_id, graph_limit),
            self.search.generate_feed_candidates(Some(user_id), search_limit),
        );

        let mut candidates = match graph {
            Ok(found) => {
                debug!(user_id = user_id, count = found.len(), "Graph review candidates");
                found
            }
            Err(e) => {
                error!(user_id = user_id, error = %e, "Graph review candidate generation failed");
                Vec::new()
            }
        };
        debug!(user_id = user_id, count = search.len(), "Search review candidates");
        candidates.extend(search);
        candidates
    }

    async fn record_served(&self, user_id: i64, results: &[RecommendationResult]) {
        let ids: Vec<i64> = results.iter().map(|r| r.entity_id).collect();
        self.exposure.record_exposure(Some(user_id), &ids).await;
    }
}

/// Drop recently exposed candidates unless that would leave nothing.
fn filter_exposed(
    candidates: Vec<RecommendationCandidate>,
    exposed: &HashSet<i64>,
) -> Vec<RecommendationCandidate> {
    if exposed.is_empty() {
        return candidates;
    }

    let fresh: Vec<RecommendationCandidate> = candidates
        .iter()
        .filter(|c| !exposed.contains(&c.entity_id))
        .cloned()
        .collect();

    if fresh.is_empty() {
        debug!(count = candidates.len(), "All candidates recently exposed, keeping them");
        candidates
    } else {
        fresh
    }
}
