use super::{load_user_context, semantic_queries, unique_ids};
use crate::config::ReviewRecommendationConfig;
use crate::models::{CandidateSource, RecommendationCandidate, ReviewDocument, UserAnalysisContext};
use crate::ports::{ReviewSearchPort, UserContextLoader};
use crate::utils::review_popularity;
use std::sync::Arc;
use tracing::{debug, warn};

/// Interest budget split between MLT and semantic retrieval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct InterestSplit {
    pub mlt: usize,
    pub semantic: usize,
}

impl InterestSplit {
    pub(crate) fn resolve(
        limit: usize,
        mlt_ratio: f64,
        semantic_ratio: f64,
        has_mlt_seeds: bool,
        has_semantic_seeds: bool,
    ) -> Self {
        let mut mlt = ((limit as f64) * mlt_ratio).round() as usize;
        let mut semantic = ((limit as f64) * semantic_ratio).round() as usize;
        // rounding leftovers go to semantic
        semantic += limit.saturating_sub(mlt + semantic);

        if !has_mlt_seeds {
            semantic += mlt;
            mlt = 0;
        }
        if !has_semantic_seeds {
            mlt += semantic;
            semantic = 0;
        }

        Self { mlt, semantic }
    }
}

/// Search candidates for the review feed and for book-scoped review lists.
///
/// Every review candidate carries its popularity score as the initial score;
/// the source tag records which retrieval mode found it.
pub struct ReviewSearchCandidateGenerator {
    search: Arc<dyn ReviewSearchPort>,
    context_loader: Arc<dyn UserContextLoader>,
    config: ReviewRecommendationConfig,
}

impl ReviewSearchCandidateGenerator {
    pub fn new(
        search: Arc<dyn ReviewSearchPort>,
        context_loader: Arc<dyn UserContextLoader>,
        config: ReviewRecommendationConfig,
    ) -> Self {
        Self {
            search,
            context_loader,
            config,
        }
    }

    /// Interest candidates, then popular reviews, then recent reviews when
    /// still short. Each store failure is logged and skipped.
    pub async fn generate_feed_candidates(
        &self,
        user_id: Option<i64>,
        limit: usize,
    ) -> Vec<RecommendationCandidate> {
        if limit == 0 {
            return Vec::new();
        }

        let interest_limit = ((limit as f64) * self.config.mix.interest_ratio).round() as usize;
        let interest_limit = interest_limit.min(limit);

        let mut candidates = Vec::new();
        if let Some(user_id) = user_id {
            candidates.extend(self.interest_candidates(user_id, interest_limit).await);
        }

        match self.search.popular_reviews(limit * 2).await {
            Ok(page) => candidates.extend(
                page.items
                    .iter()
                    .map(|doc| self.to_candidate(doc, CandidateSource::Popularity, "Trending review")),
            ),
            Err(e) => warn!(user_id = ?user_id, error = %e, "Failed to load popular reviews"),
        }

        if candidates.len() < limit {
            match self.search.recent_reviews(limit).await {
                Ok(page) => candidates.extend(
                    page.items
                        .iter()
                        .map(|doc| self.to_candidate(doc, CandidateSource::Recent, "Recent review")),
                ),
                Err(e) => warn!(user_id = ?user_id, error = %e, "Failed to load recent reviews"),
            }
        }

        candidates.truncate(self.config.max_candidates);

        debug!(
            user_id = ?user_id,
            interest_limit = interest_limit,
            count = candidates.len(),
            "Generated search review candidates"
        );

        candidates
    }

    /// Most engaged public reviews of one book. Never fails.
    pub async fn generate_book_scoped_candidates(
        &self,
        book_id: i64,
        limit: usize,
    ) -> Vec<RecommendationCandidate> {
        if limit == 0 {
            return Vec::new();
        }

        let mut candidates: Vec<RecommendationCandidate> =
            match self.search.public_reviews_by_book(book_id, limit * 2).await {
                Ok(page) => page
                    .items
                    .iter()
                    .map(|doc| {
                        self.to_candidate(
                            doc,
                            CandidateSource::BookPopular,
                            format!("Popular review for book {}", book_id),
                        )
                    })
                    .collect(),
                Err(e) => {
                    warn!(book_id = book_id, error = %e, "Failed to load book scoped reviews");
                    Vec::new()
                }
            };

        candidates.truncate(self.config.max_candidates);
        candidates
    }

    /// Popularity mode only; the anonymous feed path.
    pub async fn generate_popular_candidates(&self, limit: usize) -> Vec<RecommendationCandidate> {
        if limit == 0 {
            return Vec::new();
        }

        match self.search.popular_reviews(limit).await {
            Ok(page) => page
                .items
                .iter()
                .take(limit)
                .map(|doc| self.to_candidate(doc, CandidateSource::Popularity, "Trending review"))
                .collect(),
            Err(e) => {
                warn!(error = %e, "Failed to load popular reviews");
                Vec::new()
            }
        }
    }

    async fn interest_candidates(&self, user_id: i64, limit: usize) -> Vec<RecommendationCandidate> {
        if limit == 0 {
            return Vec::new();
        }
        let Some(context) =
            load_user_context(self.context_loader.as_ref(), Some(user_id), &self.config.context)
                .await
        else {
            return Vec::new();
        };

        let seeds = review_seeds(&context);
        let queries = semantic_queries(&context);
        let split = InterestSplit::resolve(
            limit,
            self.config.mix.mlt_ratio,
            self.config.mix.semantic_ratio,
            !seeds.is_empty(),
            !queries.is_empty(),
        );

        let mut candidates = self.mlt_candidates(user_id, &seeds, split.mlt).await;
        candidates.extend(self.semantic_candidates(user_id, &queries, split.semantic).await);
        candidates
    }

    async fn mlt_candidates(
        &self,
        user_id: i64,
        seeds: &[i64],
        limit: usize,
    ) -> Vec<RecommendationCandidate> {
        let seeds = &seeds[..seeds.len().min(self.config.seed_limit)];
        if limit == 0 || seeds.is_empty() {
            return Vec::new();
        }
        let per_seed = (limit / seeds.len()).max(1);

        let mut candidates = Vec::new();
        for &seed in seeds {
            match self.search.similar_reviews(seed, user_id, per_seed).await {
                Ok(page) => candidates.extend(page.items.iter().map(|doc| {
                    self.to_candidate(
                        doc,
                        CandidateSource::SearchMlt,
                        format!("Similar to review {}", seed),
                    )
                })),
                Err(e) => warn!(seed_review_id = seed, error = %e, "Similar review query failed"),
            }
        }

        candidates.truncate(limit);
        candidates
    }

    async fn semantic_candidates(
        &self,
        user_id: i64,
        queries: &[String],
        limit: usize,
    ) -> Vec<RecommendationCandidate> {
        let queries = &queries[..queries.len().min(self.config.seed_limit)];
        if limit == 0 || queries.is_empty() {
            return Vec::new();
        }
        let per_seed = (limit / queries.len()).max(1);

        let mut candidates = Vec::new();
        for query in queries {
            match self.search.multi_match(query, user_id, per_seed).await {
                Ok(page) => candidates.extend(page.items.iter().map(|doc| {
                    self.to_candidate(
                        doc,
                        CandidateSource::SearchSemantic,
                        format!("Matched interest: {}", query),
                    )
                })),
                Err(e) => warn!(query = %query, error = %e, "Review text query failed"),
            }
        }

        candidates.truncate(limit);
        candidates
    }

    fn to_candidate(
        &self,
        doc: &ReviewDocument,
        source: CandidateSource,
        reason: impl Into<String>,
    ) -> RecommendationCandidate {
        RecommendationCandidate::new(
            doc.review_id,
            source,
            review_popularity(doc, &self.config.popularity),
            reason,
        )
        .with_book(doc.book_id)
        .with_created_at(doc.created_at)
    }
}

fn review_seeds(context: &UserAnalysisContext) -> Vec<i64> {
    unique_ids(context.recent_reviews.iter().filter_map(|r| r.review_id))
}
