use super::{load_user_context, semantic_queries, unique_ids};
use crate::config::BookRecommendationConfig;
use crate::error::Result;
use crate::models::{BookDocument, CandidateSource, RecommendationCandidate, UserAnalysisContext};
use crate::ports::{BookSearchPort, UserContextLoader};
use crate::utils::book_popularity;
use std::sync::Arc;
use tracing::{debug, warn};

const MLT_SCORE: f64 = 0.7;
const SEMANTIC_SCORE: f64 = 0.6;

/// How one request's search budget is spread over the three modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SearchSplit {
    pub popularity: usize,
    pub mlt: usize,
    pub semantic: usize,
}

impl SearchSplit {
    /// Half to popularity, a quarter to MLT, the rest to semantic. A mode
    /// without seeds hands its share back to popularity.
    pub(crate) fn resolve(limit: usize, has_mlt_seeds: bool, has_semantic_seeds: bool) -> Self {
        let mut popularity = (limit / 2).max(1);
        let mut mlt = limit / 4;
        let mut semantic = limit.saturating_sub(popularity + mlt);

        if !has_mlt_seeds {
            popularity += mlt;
            mlt = 0;
        }
        if !has_semantic_seeds {
            popularity += semantic;
            semantic = 0;
        }

        Self {
            popularity,
            mlt,
            semantic,
        }
    }
}

/// Search 候選生成（熱門 + more-like-this + 語意查詢）
pub struct SearchCandidateGenerator {
    search: Arc<dyn BookSearchPort>,
    context_loader: Arc<dyn UserContextLoader>,
    config: BookRecommendationConfig,
}

impl SearchCandidateGenerator {
    pub fn new(
        search: Arc<dyn BookSearchPort>,
        context_loader: Arc<dyn UserContextLoader>,
        config: BookRecommendationConfig,
    ) -> Self {
        Self {
            search,
            context_loader,
            config,
        }
    }

    pub async fn generate_candidates(
        &self,
        user_id: Option<i64>,
        limit: usize,
    ) -> Result<Vec<RecommendationCandidate>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let pool = self.config.popular_pool_size.max(limit);
        let popular = self.search.popular_books(pool).await?;
        if popular.is_empty() {
            return Ok(Vec::new());
        }

        let context =
            load_user_context(self.context_loader.as_ref(), user_id, &self.config.context).await;
        let mlt_seeds = context.as_ref().map(mlt_seeds).unwrap_or_default();
        let queries = context.as_ref().map(semantic_queries).unwrap_or_default();

        let split = SearchSplit::resolve(limit, !mlt_seeds.is_empty(), !queries.is_empty());

        let mut candidates = self.popular_candidates(popular, split.popularity);
        candidates.extend(self.mlt_candidates(&mlt_seeds, split.mlt).await);
        candidates.extend(self.semantic_candidates(&queries, split.semantic).await);

        debug!(
            user_id = ?user_id,
            popularity = split.popularity,
            mlt = split.mlt,
            semantic = split.semantic,
            count = candidates.len(),
            "Generated search candidates"
        );

        Ok(candidates)
    }

    /// Popularity mode only; the anonymous and fallback path.
    pub async fn generate_popular_candidates(
        &self,
        limit: usize,
    ) -> Result<Vec<RecommendationCandidate>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let pool = self.config.popular_pool_size.max(limit);
        let popular = self.search.popular_books(pool).await?;
        Ok(self.popular_candidates(popular, limit))
    }

    fn popular_candidates(
        &self,
        books: Vec<BookDocument>,
        limit: usize,
    ) -> Vec<RecommendationCandidate> {
        books
            .into_iter()
            .take(limit)
            .map(|book| {
                let score = book_popularity(&book, &self.config.popularity);
                RecommendationCandidate::new(
                    book.book_id,
                    CandidateSource::Popularity,
                    score,
                    format!("Popular book (views: {})", book.view_count.unwrap_or(0)),
                )
            })
            .collect()
    }

    async fn mlt_candidates(&self, seeds: &[i64], limit: usize) -> Vec<RecommendationCandidate> {
        let seeds = &seeds[..seeds.len().min(self.config.seed_limit)];
        if limit == 0 || seeds.is_empty() {
            return Vec::new();
        }
        let per_seed = (limit / seeds.len()).max(1);

        let mut candidates = Vec::new();
        for &seed in seeds {
            match self.search.similar_books(seed, per_seed).await {
                Ok(page) => candidates.extend(page.items.into_iter().map(|book| {
                    RecommendationCandidate::new(
                        book.book_id,
                        CandidateSource::SearchMlt,
                        MLT_SCORE,
                        format!("Similar to book {}", seed),
                    )
                })),
                Err(e) => warn!(seed_book_id = seed, error = %e, "More-like-this query failed"),
            }
        }

        candidates.truncate(limit);
        candidates
    }

    async fn semantic_candidates(
        &self,
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
            match self.search.multi_match(query, per_seed).await {
                Ok(page) => candidates.extend(page.items.into_iter().map(|book| {
                    RecommendationCandidate::new(
                        book.book_id,
                        CandidateSource::SearchSemantic,
                        SEMANTIC_SCORE,
                        format!("Matched query: {}", query),
                    )
                })),
                Err(e) => warn!(query = %query, error = %e, "Semantic query failed"),
            }
        }

        candidates.truncate(limit);
        candidates
    }
}

/// Books from recent reviews, then recent library items.
fn mlt_seeds(context: &UserAnalysisContext) -> Vec<i64> {
    unique_ids(
        context
            .recent_reviews
            .iter()
            .filter_map(|r| r.book_id)
            .chain(context.recent_library_items.iter().filter_map(|i| i.book_id)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_with_all_seeds() {
        let split = SearchSplit::resolve(20, true, true);
        assert_eq!(
            split,
            SearchSplit {
                popularity: 10,
                mlt: 5,
                semantic: 5
            }
        );
    }

    #[test]
    fn test_split_without_seeds_goes_to_popularity() {
        let split = SearchSplit::resolve(20, false, false);
        assert_eq!(split.popularity, 20);
        assert_eq!(split.mlt, 0);
        assert_eq!(split.semantic, 0);

        let split = SearchSplit::resolve(20, true, false);
        assert_eq!(split.popularity, 15);
        assert_eq!(split.mlt, 5);
    }

    #[test]
    fn test_split_tiny_limit() {
        let split = SearchSplit::resolve(1, true, true);
        assert_eq!(split.popularity, 1);
        assert_eq!(split.mlt + split.semantic, 0);
    }
}
