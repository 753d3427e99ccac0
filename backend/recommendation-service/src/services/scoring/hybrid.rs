use super::EngagementScorer;
use crate::config::{BookScoringWeights, NeutralScores};
use crate::models::{RecommendationCandidate, ScoreBreakdown};
use crate::ports::BookSearchPort;
use crate::store::SessionSignalStore;
use crate::utils::book_freshness;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Component scores of one book candidate, before weighting.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Components {
    graph: f64,
    semantic: f64,
    engagement: f64,
    popularity: f64,
    freshness: f64,
}

/// 混合評分：graph + semantic + engagement + popularity + freshness
pub struct HybridScorer {
    weights: BookScoringWeights,
    neutral: NeutralScores,
    search: Arc<dyn BookSearchPort>,
    engagement: EngagementScorer,
}

impl HybridScorer {
    pub fn new(
        weights: BookScoringWeights,
        neutral: NeutralScores,
        search: Arc<dyn BookSearchPort>,
        signals: Arc<dyn SessionSignalStore>,
    ) -> Self {
        Self {
            weights,
            neutral,
            search,
            engagement: EngagementScorer::new(signals, "books"),
        }
    }

    /// Final score per candidate id. Never fails: a component without
    /// signal falls back to its neutral value.
    pub async fn batch_calculate(
        &self,
        user_id: Option<i64>,
        candidates: &[RecommendationCandidate],
    ) -> HashMap<i64, f64> {
        let mut scores = HashMap::with_capacity(candidates.len());

        for candidate in candidates {
            let components = self.components(user_id, candidate).await;
            let score = self.combine(&components);
            trace!(
                user_id = ?user_id,
                book_id = candidate.entity_id,
                graph = components.graph,
                semantic = components.semantic,
                engagement = components.engagement,
                popularity = components.popularity,
                freshness = components.freshness,
                score = score,
                "Book score"
            );
            scores.insert(candidate.entity_id, score);
        }

        debug!(user_id = ?user_id, count = scores.len(), "Scored book candidates");
        scores
    }

    pub async fn get_score_breakdown(
        &self,
        user_id: Option<i64>,
        candidate: &RecommendationCandidate,
    ) -> ScoreBreakdown {
        let components = self.components(user_id, candidate).await;
        ScoreBreakdown {
            entity_id: candidate.entity_id,
            graph_score: components.graph,
            semantic_score: components.semantic,
            engagement_score: components.engagement,
            popularity_score: components.popularity,
            freshness_score: components.freshness,
            final_score: self.combine(&components),
            source: candidate.source,
            reason: candidate.reason.clone(),
        }
    }

    async fn components(
        &self,
        user_id: Option<i64>,
        candidate: &RecommendationCandidate,
    ) -> Components {
        let source = candidate.source;
        let neutral = self.neutral.source_component;
        let pick = |matches: bool| if matches { candidate.initial_score } else { neutral };

        Components {
            graph: pick(source.is_graph()),
            semantic: pick(source.is_search()),
            engagement: self.engagement.score(user_id, candidate.entity_id).await,
            popularity: pick(source.is_popularity()),
            freshness: self.freshness(candidate.entity_id).await,
        }
    }

    async fn freshness(&self, book_id: i64) -> f64 {
        let published = match self.search.find_book(book_id).await {
            Ok(book) => book.and_then(|b| b.published_date),
            Err(e) => {
                warn!(book_id = book_id, error = %e, "Failed to look up book for freshness");
                None
            }
        };
        book_freshness(published, Utc::now().date_naive(), self.neutral.freshness)
    }

    fn combine(&self, c: &Components) -> f64 {
        let w = &self.weights;
        c.graph * w.graph
            + c.semantic * w.semantic
            + c.engagement * w.engagement
            + c.popularity * w.popularity
            + c.freshness * w.freshness
    }
}
