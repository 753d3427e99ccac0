use crate::models::RecommendationCandidate;
use std::collections::HashMap;

/// 去重並合併（相同 entity 取 initial_score 較高者）
///
/// Output keeps first-appearance order. A later duplicate replaces the kept
/// candidate only when its score is strictly higher.
pub fn deduplicate_and_merge(candidates: Vec<RecommendationCandidate>) -> Vec<RecommendationCandidate> {
    let mut index: HashMap<i64, usize> = HashMap::new();
    let mut unique: Vec<RecommendationCandidate> = Vec::with_capacity(candidates.len());

    for candidate in candidates {
        match index.get(&candidate.entity_id) {
            Some(&pos) => {
                if candidate.initial_score > unique[pos].initial_score {
                    unique[pos] = candidate;
                }
            }
            None => {
                index.insert(candidate.entity_id, unique.len());
                unique.push(candidate);
            }
        }
    }

    unique
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CandidateSource;

    #[test]
    fn test_keeps_higher_score() {
        let candidates = vec![
            RecommendationCandidate::new(100, CandidateSource::SearchSemantic, 0.5, "query"),
            RecommendationCandidate::new(101, CandidateSource::Popularity, 0.3, "popular"),
            RecommendationCandidate::new(100, CandidateSource::GraphCollaborative, 0.9, "graph"),
        ];

        let unique = deduplicate_and_merge(candidates);

        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0].entity_id, 100);
        assert_eq!(unique[0].source, CandidateSource::GraphCollaborative);
        assert_eq!(unique[0].reason, "graph");
        assert_eq!(unique[1].entity_id, 101);
    }

    #[test]
    fn test_tie_keeps_first() {
        let candidates = vec![
            RecommendationCandidate::new(7, CandidateSource::GraphGenre, 0.6, "first"),
            RecommendationCandidate::new(7, CandidateSource::SearchSemantic, 0.6, "second"),
        ];

        let unique = deduplicate_and_merge(candidates);

        assert_eq!(unique.len(), 1);
        assert_eq!(unique[0].reason, "first");
    }

    #[test]
    fn test_empty_input() {
        assert!(deduplicate_and_merge(Vec::new()).is_empty());
    }
}
