use crate::error::Result;
use crate::models::{CandidateSource, GraphRow, RecommendationCandidate};
use crate::ports::BookGraphPort;
use crate::utils::normalize_support;
use std::sync::Arc;
use tracing::debug;

/// The four book traversals. Each normalizes its own support count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GraphQuery {
    Collaborative,
    Genre,
    Author,
    Similar,
}

impl GraphQuery {
    /// Support count at which the score saturates at 1.0
    fn knee(self) -> f64 {
        match self {
            GraphQuery::Collaborative => 10.0,
            GraphQuery::Genre => 3.0,
            GraphQuery::Author => 2.0,
            GraphQuery::Similar => 5.0,
        }
    }

    fn source(self) -> CandidateSource {
        match self {
            GraphQuery::Collaborative => CandidateSource::GraphCollaborative,
            GraphQuery::Genre => CandidateSource::GraphGenre,
            GraphQuery::Author => CandidateSource::GraphAuthor,
            GraphQuery::Similar => CandidateSource::GraphSimilar,
        }
    }

    fn reason(self, support: i64) -> String {
        match self {
            GraphQuery::Collaborative => format!("Similar users liked this ({} users)", support),
            GraphQuery::Genre => format!("Genre overlap with {} shared genres", support),
            GraphQuery::Author => format!("Author overlap with {} shared authors", support),
            GraphQuery::Similar => format!("Similar books via graph: {} paths", support),
        }
    }

    fn to_candidates(self, rows: Vec<GraphRow>) -> Vec<RecommendationCandidate> {
        rows.into_iter()
            .map(|row| {
                RecommendationCandidate::new(
                    row.entity_id,
                    self.source(),
                    normalize_support(row.support, self.knee()),
                    self.reason(row.support),
                )
            })
            .collect()
    }
}

/// Graph 候選生成（協同過濾 + 類型/作者重疊 + k-hop 鄰居）
pub struct GraphCandidateGenerator {
    graph: Arc<dyn BookGraphPort>,
}

impl GraphCandidateGenerator {
    pub fn new(graph: Arc<dyn BookGraphPort>) -> Self {
        Self { graph }
    }

    /// Union of the four traversals; duplicates across traversals are left
    /// for fusion. `limit` is split evenly between them.
    pub async fn generate_candidates(
        &self,
        user_id: i64,
        limit: usize,
    ) -> Result<Vec<RecommendationCandidate>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let per_query = (limit / 4).max(1);

        let (collaborative, genre, author, similar) = tokio::join!(
            self.graph.collaborative_filtering(user_id, per_query),
            self.graph.preferred_genres(user_id, per_query),
            self.graph.preferred_authors(user_id, per_query),
            self.graph.similar_books(user_id, per_query),
        );

        let mut candidates = Vec::new();
        candidates.extend(GraphQuery::Collaborative.to_candidates(collaborative?));
        candidates.extend(GraphQuery::Genre.to_candidates(genre?));
        candidates.extend(GraphQuery::Author.to_candidates(author?));
        candidates.extend(GraphQuery::Similar.to_candidates(similar?));

        debug!(
            user_id = user_id,
            count = candidates.len(),
            "Generated graph candidates"
        );

        Ok(candidates)
    }
}
