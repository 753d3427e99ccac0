pub mod cache;
pub mod candidates;
pub mod recommendation;
pub mod review_recommendation;
pub mod sampling;
pub mod scoring;

pub use cache::{CacheNamespace, CacheScope, ExposureTracker, PageRequest, RecommendationCache};
pub use candidates::{
    deduplicate_and_merge, GraphCandidateGenerator, ReviewGraphCandidateGenerator,
    ReviewSearchCandidateGenerator, SearchCandidateGenerator,
};
pub use recommendation::{BookRecommendationRequest, RecommendationService};
pub use review_recommendation::{ReviewRecommendationRequest, ReviewRecommendationService};
pub use sampling::WindowSampler;
pub use scoring::{EngagementScorer, HybridScorer, ReviewHybridScorer};

use crate::models::{RecommendationCandidate, RecommendationResult};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Attach final scores to candidates and order best first. Equal scores keep
/// candidate order.
pub(crate) fn rank_candidates(
    candidates: &[RecommendationCandidate],
    scores: &HashMap<i64, f64>,
) -> Vec<RecommendationResult> {
    let mut results: Vec<RecommendationResult> = candidates
        .iter()
        .filter_map(|c| {
            scores
                .get(&c.entity_id)
                .map(|score| RecommendationResult::from_candidate(c, *score))
        })
        .collect();
    results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    results
}

/// Order popularity candidates by their own score; used where no hybrid
/// scoring runs.
pub(crate) fn rank_by_initial_score(
    candidates: &[RecommendationCandidate],
) -> Vec<RecommendationResult> {
    let unique = deduplicate_and_merge(candidates.to_vec());
    let scores: HashMap<i64, f64> = unique
        .iter()
        .map(|c| (c.entity_id, c.initial_score))
        .collect();
    rank_candidates(&unique, &scores)
}
