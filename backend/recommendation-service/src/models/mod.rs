use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Where a candidate came from. Book and review generators share one enum;
/// each variant is only produced by the generators that own it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum CandidateSource {
    GraphCollaborative, // 共同互動的讀者
    GraphGenre,
    GraphAuthor,
    GraphSimilar,      // k-hop 相似圖譜鄰居
    GraphSimilarUser,  // 相似讀者按讚的書評
    GraphBookAffinity, // 使用者互動過的書籍下的書評
    SearchMlt,
    SearchSemantic,
    Popularity,
    BookPopular,
    Recent,
    FollowedUser,
}

impl CandidateSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            CandidateSource::GraphCollaborative => "graph_collaborative",
            CandidateSource::GraphGenre => "graph_genre",
            CandidateSource::GraphAuthor => "graph_author",
            CandidateSource::GraphSimilar => "graph_similar",
            CandidateSource::GraphSimilarUser => "graph_similar_user",
            CandidateSource::GraphBookAffinity => "graph_book_affinity",
            CandidateSource::SearchMlt => "search_mlt",
            CandidateSource::SearchSemantic => "search_semantic",
            CandidateSource::Popularity => "popularity",
            CandidateSource::BookPopular => "book_popular",
            CandidateSource::Recent => "recent",
            CandidateSource::FollowedUser => "followed_user",
        }
    }

    pub fn is_graph(&self) -> bool {
        matches!(
            self,
            CandidateSource::GraphCollaborative
                | CandidateSource::GraphGenre
                | CandidateSource::GraphAuthor
                | CandidateSource::GraphSimilar
                | CandidateSource::GraphSimilarUser
                | CandidateSource::GraphBookAffinity
        )
    }

    /// Lexical / more-like-this retrieval from the search store.
    pub fn is_search(&self) -> bool {
        matches!(self, CandidateSource::SearchMlt | CandidateSource::SearchSemantic)
    }

    pub fn is_popularity(&self) -> bool {
        matches!(self, CandidateSource::Popularity | CandidateSource::BookPopular)
    }
}

impl std::fmt::Display for CandidateSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single proposal from one generator, before fusion and scoring.
///
/// `book_id` and `created_at` are only populated by the review generators:
/// review candidates are grouped by the book they belong to and decay by age.
#[derive(Debug, Clone, PartialEq)]
pub struct RecommendationCandidate {
    pub entity_id: i64,
    pub book_id: Option<i64>,
    pub source: CandidateSource,
    pub initial_score: f64,
    pub reason: String,
    pub created_at: Option<DateTime<Utc>>,
}

impl RecommendationCandidate {
    pub fn new(
        entity_id: i64,
        source: CandidateSource,
        initial_score: f64,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            entity_id,
            book_id: None,
            source,
            initial_score,
            reason: reason.into(),
            created_at: None,
        }
    }

    pub fn with_book(mut self, book_id: Option<i64>) -> Self {
        self.book_id = book_id;
        self
    }

    pub fn with_created_at(mut self, created_at: Option<DateTime<Utc>>) -> Self {
        self.created_at = created_at;
        self
    }
}

/// One ranked entry served to a caller.
///
/// Results read back from the cache carry no `source`/`reason`: only the
/// entity id and its final score are persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationResult {
    pub entity_id: i64,
    pub score: f64,
    pub rank: usize,
    pub source: Option<String>,
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub book_id: Option<i64>,
}

impl RecommendationResult {
    pub fn from_cache(entity_id: i64, score: f64) -> Self {
        Self {
            entity_id,
            score,
            rank: 0,
            source: None,
            reason: None,
            book_id: None,
        }
    }

    pub fn from_candidate(candidate: &RecommendationCandidate, score: f64) -> Self {
        Self {
            entity_id: candidate.entity_id,
            score,
            rank: 0,
            source: Some(candidate.source.as_str().to_string()),
            reason: Some(candidate.reason.clone()),
            book_id: candidate.book_id,
        }
    }
}

/// Snapshot of a user's recent activity used to seed search retrieval.
#[derive(Debug, Clone, Default)]
pub struct UserAnalysisContext {
    pub user_id: i64,
    pub recent_reviews: Vec<ReviewSnapshot>,
    pub recent_library_items: Vec<LibraryItemSnapshot>,
    pub recent_search_queries: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ReviewSnapshot {
    pub review_id: Option<i64>,
    pub book_id: Option<i64>,
    pub book_title: Option<String>,
    pub book_authors: Vec<String>,
    pub rating: Option<i32>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct LibraryItemSnapshot {
    pub book_id: Option<i64>,
    pub book_title: Option<String>,
    pub book_authors: Vec<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Book document as returned by the search store.
#[derive(Debug, Clone, Default)]
pub struct BookDocument {
    pub book_id: i64,
    pub title: Option<String>,
    pub view_count: Option<i64>,
    pub wishlist_count: Option<i64>,
    pub review_count: Option<i64>,
    pub published_date: Option<NaiveDate>,
}

/// Review document as returned by the search store.
#[derive(Debug, Clone, Default)]
pub struct ReviewDocument {
    pub review_id: i64,
    pub book_id: Option<i64>,
    pub like_count: Option<i64>,
    pub comment_count: Option<i64>,
    pub bookmark_count: Option<i64>,
    pub view_count: Option<i64>,
    pub created_at: Option<DateTime<Utc>>,
}

/// `(entity, supportCount)` tuple from a graph traversal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GraphRow {
    pub entity_id: i64,
    pub support: i64,
}

/// Review row from the similar-users traversal. Any column may be missing.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GraphReviewRow {
    pub review_id: Option<i64>,
    pub book_id: Option<i64>,
    pub support: Option<i64>,
}

/// One page of search results.
#[derive(Debug, Clone)]
pub struct SearchPage<T> {
    pub items: Vec<T>,
    pub has_more: bool,
}

impl<T> SearchPage<T> {
    pub fn new(items: Vec<T>, has_more: bool) -> Self {
        Self { items, has_more }
    }

    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            has_more: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    pub user_id: i64,
    pub cached_items: u64,
    pub ttl_seconds: i64,
    pub exists: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecommendationStats {
    pub user_id: i64,
    pub cached_items: u64,
    pub cache_ttl_seconds: i64,
    pub has_cached_recommendations: bool,
}

impl From<CacheStats> for RecommendationStats {
    fn from(stats: CacheStats) -> Self {
        Self {
            user_id: stats.user_id,
            cached_items: stats.cached_items,
            cache_ttl_seconds: stats.ttl_seconds,
            has_cached_recommendations: stats.exists,
        }
    }
}

/// Per-component scores of a book candidate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub entity_id: i64,
    pub graph_score: f64,
    pub semantic_score: f64,
    pub engagement_score: f64,
    pub popularity_score: f64,
    pub freshness_score: f64,
    pub final_score: f64,
    pub source: CandidateSource,
    pub reason: String,
}

/// Per-component scores of a review candidate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewScoreBreakdown {
    pub entity_id: i64,
    pub popularity_score: f64,
    pub freshness_score: f64,
    pub engagement_score: f64,
    pub content_score: f64,
    pub book_context_score: f64,
    pub final_score: f64,
    pub source: CandidateSource,
    pub reason: String,
}
