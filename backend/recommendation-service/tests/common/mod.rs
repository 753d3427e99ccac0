#![allow(dead_code)]

use async_trait::async_trait;
use chrono::NaiveDate;
use mockall::mock;
use recommendation_service::models::{
    BookDocument, GraphReviewRow, GraphRow, ReviewDocument, SearchPage, UserAnalysisContext,
};
use recommendation_service::ports::{
    BookGraphPort, BookSearchPort, ContextQuery, ReviewGraphPort, ReviewSearchPort,
    UserContextLoader,
};
use recommendation_service::{
    InMemoryStore, RecommendationConfig, RecommendationError, RecommendationService, Result,
    ReviewRecommendationService,
};
use std::collections::HashMap;
use std::sync::Arc;

// ============================================
// Mock graph ports
// ============================================

mock! {
    pub BookGraph {}

    #[async_trait]
    impl BookGraphPort for BookGraph {
        async fn collaborative_filtering(&self, user_id: i64, limit: usize) -> Result<Vec<GraphRow>>;
        async fn preferred_genres(&self, user_id: i64, limit: usize) -> Result<Vec<GraphRow>>;
        async fn preferred_authors(&self, user_id: i64, limit: usize) -> Result<Vec<GraphRow>>;
        async fn similar_books(&self, user_id: i64, limit: usize) -> Result<Vec<GraphRow>>;
    }
}

mock! {
    pub ReviewGraph {}

    #[async_trait]
    impl ReviewGraphPort for ReviewGraph {
        async fn reviews_by_similar_users(&self, user_id: i64, limit: usize) -> Result<Vec<GraphReviewRow>>;
        async fn interacted_book_ids(&self, user_id: i64, limit: usize) -> Result<Vec<i64>>;
        async fn reviews_by_book_ids(&self, book_ids: &[i64], user_id: i64, limit: usize) -> Result<Vec<GraphReviewRow>>;
    }
}

/// Graph mock where every traversal returns nothing.
pub fn empty_book_graph() -> MockBookGraph {
    let mut graph = MockBookGraph::new();
    graph.expect_collaborative_filtering().returning(|_, _| Ok(vec![]));
    graph.expect_preferred_genres().returning(|_, _| Ok(vec![]));
    graph.expect_preferred_authors().returning(|_, _| Ok(vec![]));
    graph.expect_similar_books().returning(|_, _| Ok(vec![]));
    graph
}

pub fn empty_review_graph() -> MockReviewGraph {
    let mut graph = MockReviewGraph::new();
    graph.expect_reviews_by_similar_users().returning(|_, _| Ok(vec![]));
    graph.expect_interacted_book_ids().returning(|_, _| Ok(vec![]));
    graph.expect_reviews_by_book_ids().returning(|_, _, _| Ok(vec![]));
    graph
}

pub fn graph_down() -> RecommendationError {
    RecommendationError::Graph("connection refused".to_string())
}

// ============================================
// Fake search stores
// ============================================

#[derive(Default)]
pub struct FakeBookSearch {
    pub popular: Vec<BookDocument>,
    pub similar: HashMap<i64, Vec<BookDocument>>,
    pub text: HashMap<String, Vec<BookDocument>>,
    pub catalog: HashMap<i64, BookDocument>,
    pub fail: bool,
}

impl FakeBookSearch {
    fn check(&self) -> Result<()> {
        if self.fail {
            return Err(RecommendationError::Search("search cluster unavailable".to_string()));
        }
        Ok(())
    }
}

fn page<T: Clone>(items: Option<&Vec<T>>, limit: usize) -> SearchPage<T> {
    let all = items.cloned().unwrap_or_default();
    let has_more = all.len() > limit;
    SearchPage::new(all.into_iter().take(limit).collect(), has_more)
}

#[async_trait]
impl BookSearchPort for FakeBookSearch {
    async fn popular_books(&self, limit: usize) -> Result<Vec<BookDocument>> {
        self.check()?;
        Ok(self.popular.iter().take(limit).cloned().collect())
    }

    async fn similar_books(&self, book_id: i64, limit: usize) -> Result<SearchPage<BookDocument>> {
        self.check()?;
        Ok(page(self.similar.get(&book_id), limit))
    }

    async fn multi_match(&self, query: &str, limit: usize) -> Result<SearchPage<BookDocument>> {
        self.check()?;
        Ok(page(self.text.get(query), limit))
    }

    async fn find_book(&self, book_id: i64) -> Result<Option<BookDocument>> {
        self.check()?;
        Ok(self.catalog.get(&book_id).cloned())
    }
}

#[derive(Default)]
pub struct FakeReviewSearch {
    pub popular: Vec<ReviewDocument>,
    pub recent: Vec<ReviewDocument>,
    pub by_book: HashMap<i64, Vec<ReviewDocument>>,
    pub similar: HashMap<i64, Vec<ReviewDocument>>,
    pub text: HashMap<String, Vec<ReviewDocument>>,
    pub fail: bool,
}

impl FakeReviewSearch {
    fn check(&self) -> Result<()> {
        if self.fail {
            return Err(RecommendationError::Search("search cluster unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ReviewSearchPort for FakeReviewSearch {
    async fn popular_reviews(&self, limit: usize) -> Result<SearchPage<ReviewDocument>> {
        self.check()?;
        Ok(page(Some(&self.popular), limit))
    }

    async fn recent_reviews(&self, limit: usize) -> Result<SearchPage<ReviewDocument>> {
        self.check()?;
        Ok(page(Some(&self.recent), limit))
    }

    async fn similar_reviews(
        &self,
        review_id: i64,
        _user_id: i64,
        limit: usize,
    ) -> Result<SearchPage<ReviewDocument>> {
        self.check()?;
        Ok(page(self.similar.get(&review_id), limit))
    }

    async fn multi_match(
        &self,
        query: &str,
        _user_id: i64,
        limit: usize,
    ) -> Result<SearchPage<ReviewDocument>> {
        self.check()?;
        Ok(page(self.text.get(query), limit))
    }

    async fn public_reviews_by_book(
        &self,
        book_id: i64,
        limit: usize,
    ) -> Result<SearchPage<ReviewDocument>> {
        self.check()?;
        Ok(page(self.by_book.get(&book_id), limit))
    }
}

// ============================================
// Fake user context
// ============================================

#[derive(Default)]
pub struct FakeContext {
    pub context: Option<UserAnalysisContext>,
    pub fail: bool,
}

impl FakeContext {
    pub fn with_queries(user_id: i64, queries: &[&str]) -> Self {
        Self {
            context: Some(UserAnalysisContext {
                user_id,
                recent_search_queries: queries.iter().map(|q| q.to_string()).collect(),
                ..Default::default()
            }),
            fail: false,
        }
    }
}

#[async_trait]
impl UserContextLoader for FakeContext {
    async fn load_context(
        &self,
        _user_id: i64,
        _query: ContextQuery,
    ) -> Result<Option<UserAnalysisContext>> {
        if self.fail {
            return Err(RecommendationError::Context("user service timeout".to_string()));
        }
        Ok(self.context.clone())
    }
}

// ============================================
// Fixtures
// ============================================

pub fn book(id: i64, views: i64) -> BookDocument {
    BookDocument {
        book_id: id,
        title: Some(format!("Book {}", id)),
        view_count: Some(views),
        wishlist_count: Some(0),
        review_count: Some(0),
        published_date: None,
    }
}

pub fn published(id: i64, date: NaiveDate) -> BookDocument {
    BookDocument {
        published_date: Some(date),
        ..book(id, 0)
    }
}

pub fn review(id: i64, book_id: i64, likes: i64) -> ReviewDocument {
    ReviewDocument {
        review_id: id,
        book_id: Some(book_id),
        like_count: Some(likes),
        ..Default::default()
    }
}

pub fn book_service(
    graph: MockBookGraph,
    search: FakeBookSearch,
    context: FakeContext,
    store: &InMemoryStore,
) -> RecommendationService {
    book_service_with(graph, search, context, store, &RecommendationConfig::default())
}

pub fn book_service_with(
    graph: MockBookGraph,
    search: FakeBookSearch,
    context: FakeContext,
    store: &InMemoryStore,
    config: &RecommendationConfig,
) -> RecommendationService {
    RecommendationService::new(
        Arc::new(graph),
        Arc::new(search),
        Arc::new(context),
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        config,
    )
}

pub fn review_service(
    graph: MockReviewGraph,
    search: FakeReviewSearch,
    context: FakeContext,
    store: &InMemoryStore,
) -> ReviewRecommendationService {
    ReviewRecommendationService::new(
        Arc::new(graph),
        Arc::new(search),
        Arc::new(context),
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        &RecommendationConfig::default(),
    )
}
