//! Backing stores consumed by the candidate generators and scorers.
//!
//! Query execution lives behind these traits. Each method returns raw rows
//! or documents; normalization and scoring happen in `services`.

use crate::error::Result;
use crate::models::{
    BookDocument, GraphReviewRow, GraphRow, ReviewDocument, SearchPage, UserAnalysisContext,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Graph traversals over the reader/book graph.
#[async_trait]
pub trait BookGraphPort: Send + Sync {
    /// Books read by users who share reads with `user_id`, with the number
    /// of co-interacting users.
    async fn collaborative_filtering(&self, user_id: i64, limit: usize) -> Result<Vec<GraphRow>>;

    /// Books in the user's preferred genres, with the number of shared genres.
    async fn preferred_genres(&self, user_id: i64, limit: usize) -> Result<Vec<GraphRow>>;

    /// Books by the user's preferred authors, with the number of shared authors.
    async fn preferred_authors(&self, user_id: i64, limit: usize) -> Result<Vec<GraphRow>>;

    /// k-hop neighbours of the user's books, with the number of paths.
    async fn similar_books(&self, user_id: i64, limit: usize) -> Result<Vec<GraphRow>>;
}

#[async_trait]
pub trait ReviewGraphPort: Send + Sync {
    /// Reviews liked by users with similar engagement.
    async fn reviews_by_similar_users(
        &self,
        user_id: i64,
        limit: usize,
    ) -> Result<Vec<GraphReviewRow>>;

    /// Books the user has reviewed, shelved or reacted to, most recent first.
    async fn interacted_book_ids(&self, user_id: i64, limit: usize) -> Result<Vec<i64>>;

    /// Reviews written by others on the given books.
    async fn reviews_by_book_ids(
        &self,
        book_ids: &[i64],
        user_id: i64,
        limit: usize,
    ) -> Result<Vec<GraphReviewRow>>;
}

#[async_trait]
pub trait BookSearchPort: Send + Sync {
    /// Top books ordered by view count, then wishlist count.
    async fn popular_books(&self, limit: usize) -> Result<Vec<BookDocument>>;

    /// More-like-this query seeded by one book.
    async fn similar_books(&self, book_id: i64, limit: usize) -> Result<SearchPage<BookDocument>>;

    /// Multi-field text query over title, authors and description.
    async fn multi_match(&self, query: &str, limit: usize) -> Result<SearchPage<BookDocument>>;

    async fn find_book(&self, book_id: i64) -> Result<Option<BookDocument>>;
}

#[async_trait]
pub trait ReviewSearchPort: Send + Sync {
    /// Reviews ordered by like count.
    async fn popular_reviews(&self, limit: usize) -> Result<SearchPage<ReviewDocument>>;

    async fn recent_reviews(&self, limit: usize) -> Result<SearchPage<ReviewDocument>>;

    /// More-like-this query seeded by one review, excluding the user's own reviews.
    async fn similar_reviews(
        &self,
        review_id: i64,
        user_id: i64,
        limit: usize,
    ) -> Result<SearchPage<ReviewDocument>>;

    /// Multi-field text query, excluding the user's own reviews.
    async fn multi_match(
        &self,
        query: &str,
        user_id: i64,
        limit: usize,
    ) -> Result<SearchPage<ReviewDocument>>;

    /// Public reviews of one book, most engaged first.
    async fn public_reviews_by_book(
        &self,
        book_id: i64,
        limit: usize,
    ) -> Result<SearchPage<ReviewDocument>>;
}

/// Lookback window for [`UserContextLoader::load_context`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContextQuery {
    pub review_limit: usize,
    pub library_limit: usize,
    pub search_limit: usize,
    pub search_since: DateTime<Utc>,
}

#[async_trait]
pub trait UserContextLoader: Send + Sync {
    /// `Ok(None)` means the user has no activity to personalize from.
    async fn load_context(
        &self,
        user_id: i64,
        query: ContextQuery,
    ) -> Result<Option<UserAnalysisContext>>;
}
