use super::cache::{CacheNamespace, CacheScope, PageRequest, RecommendationCache};
use super::candidates::{deduplicate_and_merge, GraphCandidateGenerator, SearchCandidateGenerator};
use super::sampling::WindowSampler;
use super::scoring::HybridScorer;
use super::{rank_by_initial_score, rank_candidates};
use crate::config::{BookRecommendationConfig, RecommendationConfig};
use crate::models::{
    CandidateSource, RecommendationCandidate, RecommendationResult, RecommendationStats,
    ScoreBreakdown,
};
use crate::ports::{BookGraphPort, BookSearchPort, UserContextLoader};
use crate::store::{SessionSignalStore, SortedSetStore};
use crate::utils::paginate;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// One book recommendation request.
#[derive(Debug, Clone, Default)]
pub struct BookRecommendationRequest {
    /// `None` for anonymous callers
    pub user_id: Option<i64>,
    pub cursor: Option<i64>,
    pub limit: usize,
    pub force_refresh: bool,
    /// Apply window sampling on cache hits
    pub sample: bool,
    pub session_id: Option<String>,
}

impl BookRecommendationRequest {
    pub fn for_user(user_id: i64, limit: usize) -> Self {
        Self {
            user_id: Some(user_id),
            limit,
            ..Default::default()
        }
    }
}

/// 書籍推薦服務：候選生成 → 去重 → 混合評分 → 快取
pub struct RecommendationService {
    graph: GraphCandidateGenerator,
    search: SearchCandidateGenerator,
    scorer: HybridScorer,
    cache: RecommendationCache,
    config: BookRecommendationConfig,
}

impl RecommendationService {
    pub fn new(
        graph: Arc<dyn BookGraphPort>,
        search: Arc<dyn BookSearchPort>,
        context_loader: Arc<dyn UserContextLoader>,
        store: Arc<dyn SortedSetStore>,
        signals: Arc<dyn SessionSignalStore>,
        config: &RecommendationConfig,
    ) -> Self {
        let book = config.book.clone();
        Self {
            graph: GraphCandidateGenerator::new(graph),
            search: SearchCandidateGenerator::new(search.clone(), context_loader, book.clone()),
            scorer: HybridScorer::new(book.weights.clone(), book.neutral.clone(), search, signals),
            cache: RecommendationCache::new(
                store,
                CacheNamespace::Book,
                book.cache.clone(),
                WindowSampler::new(config.sampling.clone()),
            ),
            config: book,
        }
    }

    pub async fn generate_recommendations(
        &self,
        request: BookRecommendationRequest,
    ) -> Vec<RecommendationResult> {
        if request.limit == 0 {
            return Vec::new();
        }

        let Some(user_id) = request.user_id else {
            return self
                .generate_default_recommendations(request.cursor, request.limit)
                .await;
        };

        info!(
            user_id = user_id,
            limit = request.limit,
            force_refresh = request.force_refresh,
            "Generating book recommendations"
        );

        if !request.force_refresh && self.cache.exists(user_id, CacheScope::Feed).await {
            debug!(user_id = user_id, "Using cached recommendations");
            let page = PageRequest::new(request.cursor, request.limit)
                .sampled(request.sample, request.session_id.as_deref());
            return self.cache.get(user_id, CacheScope::Feed, page).await;
        }

        let candidates = self.generate_candidates(user_id).await;
        if candidates.is_empty() {
            warn!(user_id = user_id, "No candidates generated, serving defaults");
            return self
                .generate_default_recommendations(request.cursor, request.limit)
                .await;
        }

        let total = candidates.len();
        let unique = deduplicate_and_merge(candidates);
        debug!(user_id = user_id, unique = unique.len(), total = total, "Fused candidates");

        let scores = self.scorer.batch_calculate(Some(user_id), &unique).await;
        self.cache.save(user_id, CacheScope::Feed, &scores).await;

        let results = paginate(rank_candidates(&unique, &scores), request.cursor, request.limit);
        info!(user_id = user_id, count = results.len(), "Generated book recommendations");
        results
    }

    /// Popular books for callers without personalization. Not cached.
    pub async fn generate_default_recommendations(
        &self,
        cursor: Option<i64>,
        limit: usize,
    ) -> Vec<RecommendationResult> {
        if limit == 0 {
            return Vec::new();
        }

        let pool = self.config.popular_pool_size.max(limit);
        match self.search.generate_popular_candidates(pool).await {
            Ok(candidates) => paginate(rank_by_initial_score(&candidates), cursor, limit),
            Err(e) => {
                error!(error = %e, "Failed to load default recommendations");
                Vec::new()
            }
        }
    }

    pub async fn get_cached_recommendations(
        &self,
        user_id: i64,
        cursor: Option<i64>,
        limit: usize,
    ) -> Vec<RecommendationResult> {
        self.cache
            .get(user_id, CacheScope::Feed, PageRequest::new(cursor, limit))
            .await
    }

    /// Drop the cached list and recompute it.
    pub async fn refresh_recommendations(&self, user_id: i64) {
        info!(user_id = user_id, "Refreshing book recommendations");
        self.cache.clear(user_id, CacheScope::Feed).await;

        let request = BookRecommendationRequest {
            force_refresh: true,
            ..BookRecommendationRequest::for_user(user_id, self.config.refresh_limit)
        };
        self.generate_recommendations(request).await;
    }

    /// Component scores of `book_id` as if it were a collaborative-filtering
    /// candidate with a mid-range score.
    pub async fn get_score_breakdown(&self, user_id: i64, book_id: i64) -> ScoreBreakdown {
        let candidate = RecommendationCandidate::new(
            book_id,
            CandidateSource::GraphCollaborative,
            0.5,
            "Score breakdown",
        );
        self.scorer
            .get_score_breakdown(Some(user_id), &candidate)
            .await
    }

    pub async fn get_stats(&self, user_id: i64) -> RecommendationStats {
        self.cache.stats(user_id, CacheScope::Feed).await.into()
    }

    /// Live adjustment of one cached score, e.g. after the user interacts
    /// with the book. Returns the new score.
    pub async fn adjust_score(
        &self,
        user_id: Option<i64>,
        book_id: Option<i64>,
        delta: f64,
    ) -> Option<f64> {
        self.cache
            .increment_score(user_id, CacheScope::Feed, book_id, delta)
            .await
    }

    async fn generate_candidates(&self, user_id: i64) -> Vec<RecommendationCandidate> {
        let max = self.config.max_candidates;
        let graph_limit = ((max as f64) * self.config.graph_share).round() as usize;
        let search_limit = max.saturating_sub(graph_limit);

        let (graph, search) = tokio::join!(
            self.graph.generate_candidates(user_id, graph_limit),
            self.search.generate_candidates(Some(user_id), search_limit),
        );

        let mut candidates = Vec::new();
        match graph {
            Ok(found) => {
                debug!(user_id = user_id, count = found.len(), "Graph candidates");
                candidates.extend(found);
            }
            Err(e) => error!(user_id = user_id, error = %e, "Graph candidate generation failed"),
        }
        match search {
            Ok(found) => {
                debug!(user_id = user_id, count = found.len(), "Search candidates");
                candidates.extend(found);
            }
            Err(e) => error!(user_id = user_id, error = %e, "Search candidate generation failed"),
        }

        candidates
    }
}
