//! Candidate generation: graph traversals, search retrieval and fusion.

mod fusion;
mod graph;
mod review_graph;
mod review_search;
mod search;

pub use fusion::deduplicate_and_merge;
pub use graph::GraphCandidateGenerator;
pub use review_graph::ReviewGraphCandidateGenerator;
pub use review_search::ReviewSearchCandidateGenerator;
pub use search::SearchCandidateGenerator;

use crate::config::ContextConfig;
use crate::models::UserAnalysisContext;
use crate::ports::{ContextQuery, UserContextLoader};
use chrono::{Duration, Utc};
use std::collections::HashSet;
use tracing::warn;

/// Load the user's activity snapshot. Failures degrade to "no signal".
pub(crate) async fn load_user_context(
    loader: &dyn UserContextLoader,
    user_id: Option<i64>,
    config: &ContextConfig,
) -> Option<UserAnalysisContext> {
    let user_id = user_id?;
    let query = ContextQuery {
        review_limit: config.review_limit,
        library_limit: config.library_limit,
        search_limit: config.search_limit,
        search_since: Utc::now() - Duration::days(config.search_days),
    };

    match loader.load_context(user_id, query).await {
        Ok(context) => context,
        Err(e) => {
            warn!(user_id = user_id, error = %e, "Failed to load user context");
            None
        }
    }
}

/// Free-text seeds: explicit search queries first, then "title author"
/// strings from recent reviews and library items. Order kept, duplicates dropped.
pub(crate) fn semantic_queries(context: &UserAnalysisContext) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut queries = Vec::new();

    let mut push = |query: String| {
        if seen.insert(query.clone()) {
            queries.push(query);
        }
    };

    for query in &context.recent_search_queries {
        if !query.trim().is_empty() {
            push(query.clone());
        }
    }
    for review in &context.recent_reviews {
        if let Some(query) = title_author_query(review.book_title.as_deref(), &review.book_authors) {
            push(query);
        }
    }
    for item in &context.recent_library_items {
        if let Some(query) = title_author_query(item.book_title.as_deref(), &item.book_authors) {
            push(query);
        }
    }

    queries
}

fn title_author_query(title: Option<&str>, authors: &[String]) -> Option<String> {
    let title = title.filter(|t| !t.trim().is_empty())?;
    match authors.first().filter(|a| !a.trim().is_empty()) {
        Some(author) => Some(format!("{} {}", title, author)),
        None => Some(title.to_string()),
    }
}

/// Keep the first occurrence of each id.
pub(crate) fn unique_ids(ids: impl IntoIterator<Item = i64>) -> Vec<i64> {
    let mut seen = HashSet::new();
    ids.into_iter().filter(|id| seen.insert(*id)).collect()
}
