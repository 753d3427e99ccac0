use super::EngagementScorer;
use crate::config::{NeutralScores, ReviewScoringWeights};
use crate::models::{CandidateSource, RecommendationCandidate, ReviewScoreBreakdown};
use crate::store::SessionSignalStore;
use crate::utils::{clamp_unit, review_freshness};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq)]
struct Components {
    popularity: f64,
    freshness: f64,
    engagement: f64,
    content: f64,
    book_context: f64,
}

/// Prior on how relevant each retrieval mode tends to be.
fn content_score(source: CandidateSource) -> f64 {
    match source {
        CandidateSource::FollowedUser => 0.9,
        CandidateSource::GraphSimilarUser => 0.85,
        CandidateSource::SearchMlt | CandidateSource::SearchSemantic => 0.8,
        CandidateSource::GraphBookAffinity => 0.75,
        CandidateSource::BookPopular => 0.7,
        CandidateSource::Popularity => 0.6,
        CandidateSource::Recent => 0.55,
        _ => 0.5,
    }
}

pub struct ReviewHybridScorer {
    weights: ReviewScoringWeights,
    neutral: NeutralScores,
    engagement: EngagementScorer,
}

impl ReviewHybridScorer {
    pub fn new(
        weights: ReviewScoringWeights,
        neutral: NeutralScores,
        signals: Arc<dyn SessionSignalStore>,
    ) -> Self {
        Self {
            weights,
            neutral,
            engagement: EngagementScorer::new(signals, "reviews"),
        }
    }

    pub async fn batch_calculate(
        &self,
        user_id: Option<i64>,
        book_scope: Option<i64>,
        candidates: &[RecommendationCandidate],
    ) -> HashMap<i64, f64> {
        let mut scores = HashMap::with_capacity(candidates.len());

        for candidate in candidates {
            let components = self.components(user_id, book_scope, candidate).await;
            let score = self.combine(&components);
            trace!(
                user_id = ?user_id,
                review_id = candidate.entity_id,
                popularity = components.popularity,
                freshness = components.freshness,
                engagement = components.engagement,
                content = components.content,
                book_context = components.book_context,
                score = score,
                "Review score"
            );
            scores.insert(candidate.entity_id, score);
        }

        debug!(
            user_id = ?user_id,
            book_scope = ?book_scope,
            count = scores.len(),
            "Scored review candidates"
        );
        scores
    }

    pub async fn get_score_breakdown(
        &self,
        user_id: Option<i64>,
        book_scope: Option<i64>,
        candidate: &RecommendationCandidate,
    ) -> ReviewScoreBreakdown {
        let components = self.components(user_id, book_scope, candidate).await;
        ReviewScoreBreakdown {
            entity_id: candidate.entity_id,
            popularity_score: components.popularity,
            freshness_score: components.freshness,
            engagement_score: components.engagement,
            content_score: components.content,
            book_context_score: components.book_context,
            final_score: self.combine(&components),
            source: candidate.source,
            reason: candidate.reason.clone(),
        }
    }

    async fn components(
        &self,
        user_id: Option<i64>,
        book_scope: Option<i64>,
        candidate: &RecommendationCandidate,
    ) -> Components {
        let in_scope = matches!(
            (book_scope, candidate.book_id),
            (Some(scope), Some(book)) if scope == book
        );

        Components {
            popularity: clamp_unit(candidate.initial_score),
            freshness: review_freshness(candidate.created_at, Utc::now(), self.neutral.freshness),
            engagement: self.engagement.score(user_id, candidate.entity_id).await,
            content: content_score(candidate.source),
            book_context: if in_scope { 1.0 } else { 0.0 },
        }
    }

    fn combine(&self, c: &Components) -> f64 {
        let w = &self.weights;
        c.popularity * w.popularity
            + c.freshness * w.freshness
            + c.engagement * w.engagement
            + c.content * w.content
            + c.book_context * w.book_context
    }
}
