use crate::config::FeedMixConfig;
use crate::error::Result;
use crate::models::{CandidateSource, GraphReviewRow, RecommendationCandidate};
use crate::ports::ReviewGraphPort;
use crate::utils::normalize_support;
use std::sync::Arc;
use tracing::{debug, warn};

const SIMILAR_USER_KNEE: f64 = 5.0;
const MISSING_SUPPORT_SCORE: f64 = 0.5;
const BOOK_AFFINITY_SCORE: f64 = 0.6;

/// Graph candidates for the review feed: reviews liked by similar readers
/// and reviews on books the user already engaged with.
pub struct ReviewGraphCandidateGenerator {
    graph: Arc<dyn ReviewGraphPort>,
    mix: FeedMixConfig,
}

impl ReviewGraphCandidateGenerator {
    pub fn new(graph: Arc<dyn ReviewGraphPort>, mix: FeedMixConfig) -> Self {
        Self { graph, mix }
    }

    pub async fn generate_feed_candidates(
        &self,
        user_id: i64,
        limit: usize,
    ) -> Result<Vec<RecommendationCandidate>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let similar_limit = ((limit as f64) * self.mix.graph_similar_ratio).round() as usize;
        let similar_limit = similar_limit.min(limit);
        let book_limit = limit - similar_limit;

        let (similar, affinity) = tokio::join!(
            self.by_similar_users(user_id, similar_limit),
            self.by_book_affinity(user_id, book_limit),
        );

        // one failed traversal does not discard the other
        let candidates = match (similar, affinity) {
            (Err(e), Err(_)) => return Err(e),
            (similar, affinity) => {
                let mut candidates = Vec::new();
                for (traversal, found) in [("similar_users", similar), ("book_affinity", affinity)] {
                    match found {
                        Ok(found) => candidates.extend(found),
                        Err(e) => warn!(
                            user_id = user_id,
                            traversal = traversal,
                            error = %e,
                            "Review graph traversal failed"
                        ),
                    }
                }
                candidates
            }
        };

        debug!(
            user_id = user_id,
            count = candidates.len(),
            "Generated graph review candidates"
        );

        Ok(candidates)
    }

    async fn by_similar_users(
        &self,
        user_id: i64,
        limit: usize,
    ) -> Result<Vec<RecommendationCandidate>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let rows = self.graph.reviews_by_similar_users(user_id, limit).await?;
        Ok(rows.into_iter().filter_map(similar_user_candidate).collect())
    }

    async fn by_book_affinity(
        &self,
        user_id: i64,
        limit: usize,
    ) -> Result<Vec<RecommendationCandidate>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let seed_limit = self.mix.graph_book_seed_limit.max(1);
        let book_ids = self.graph.interacted_book_ids(user_id, seed_limit).await?;
        if book_ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = self
            .graph
            .reviews_by_book_ids(&book_ids, user_id, limit)
            .await?;

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let review_id = row.review_id?;
                Some(
                    RecommendationCandidate::new(
                        review_id,
                        CandidateSource::GraphBookAffinity,
                        BOOK_AFFINITY_SCORE,
                        "Reviews from books you engaged with",
                    )
                    .with_book(row.book_id),
                )
            })
            .collect())
    }
}

fn similar_user_candidate(row: GraphReviewRow) -> Option<RecommendationCandidate> {
    let review_id = row.review_id?;
    let score = match row.support {
        Some(support) => normalize_support(support, SIMILAR_USER_KNEE),
        None => MISSING_SUPPORT_SCORE,
    };
    Some(
        RecommendationCandidate::new(
            review_id,
            CandidateSource::GraphSimilarUser,
            score,
            "Similar readers liked this review",
        )
        .with_book(row.book_id),
    )
}
