// Integration tests for the review feed and book-scoped review lists

mod common;

use common::*;
use recommendation_service::models::GraphReviewRow;
use recommendation_service::{
    InMemoryStore, RecommendationResult, ReviewRecommendationRequest, SortedSetStore,
};
use std::collections::HashMap;

const EXPOSED_KEY: &str = "recommend:review:exposed:user:1";

fn trending() -> FakeReviewSearch {
    FakeReviewSearch {
        popular: vec![review(100, 1, 50), review(101, 1, 10), review(102, 2, 5)],
        ..Default::default()
    }
}

fn ids(results: &[RecommendationResult]) -> Vec<i64> {
    results.iter().map(|r| r.entity_id).collect()
}

async fn mark_exposed(store: &InMemoryStore, review_ids: &[i64]) {
    let items: Vec<(f64, String)> = review_ids
        .iter()
        .map(|id| (1_700_000_000_000.0, id.to_string()))
        .collect();
    store.zadd_multiple(EXPOSED_KEY, &items).await.unwrap();
}

#[tokio::test]
async fn test_anonymous_feed_is_popularity_only() {
    let store = InMemoryStore::new();
    let service = review_service(MockReviewGraph::new(), trending(), FakeContext::default(), &store);

    let request = ReviewRecommendationRequest {
        limit: 10,
        ..Default::default()
    };
    let results = service.generate_recommendations(request).await;

    assert_eq!(ids(&results), vec![100, 101, 102]);
    assert!(results
        .iter()
        .all(|r| r.source.as_deref() == Some("popularity")));
    assert_eq!(results[0].book_id, Some(1));
    assert!(store.keys().await.is_empty());
}

#[tokio::test]
async fn test_feed_skips_recently_exposed_reviews() {
    let store = InMemoryStore::new();
    mark_exposed(&store, &[100]).await;
    let service = review_service(empty_review_graph(), trending(), FakeContext::default(), &store);

    let results = service
        .generate_recommendations(ReviewRecommendationRequest::feed(1, 10))
        .await;

    assert_eq!(ids(&results), vec![101, 102]);
}

#[tokio::test]
async fn test_feed_keeps_candidates_when_everything_was_exposed() {
    let store = InMemoryStore::new();
    mark_exposed(&store, &[100, 101, 102]).await;
    let service = review_service(empty_review_graph(), trending(), FakeContext::default(), &store);

    let results = service
        .generate_recommendations(ReviewRecommendationRequest::feed(1, 10))
        .await;

    assert_eq!(results.len(), 3);
}

#[tokio::test]
async fn test_feed_records_served_reviews() {
    let store = InMemoryStore::new();
    let service = review_service(empty_review_graph(), trending(), FakeContext::default(), &store);

    let results = service
        .generate_recommendations(ReviewRecommendationRequest::feed(1, 2))
        .await;
    assert_eq!(ids(&results), vec![100, 101]);

    assert!(store.zscore(EXPOSED_KEY, "100").await.unwrap().is_some());
    assert!(store.zscore(EXPOSED_KEY, "101").await.unwrap().is_some());
    assert!(store.zscore(EXPOSED_KEY, "102").await.unwrap().is_none());
    assert!(store.ttl(EXPOSED_KEY).await.unwrap() > 0);
}

#[tokio::test]
async fn test_cache_hit_also_records_exposure() {
    let store = InMemoryStore::new();
    let service = review_service(empty_review_graph(), trending(), FakeContext::default(), &store);

    service
        .generate_recommendations(ReviewRecommendationRequest::feed(1, 3))
        .await;
    store.del(EXPOSED_KEY).await.unwrap();

    let cached = service
        .generate_recommendations(ReviewRecommendationRequest::feed(1, 3))
        .await;

    assert_eq!(cached.len(), 3);
    assert!(cached.iter().all(|r| r.source.is_none()));
    assert_eq!(store.zcard(EXPOSED_KEY).await.unwrap(), 3);
}

#[tokio::test]
async fn test_book_scope_never_touches_exposure() {
    let store = InMemoryStore::new();
    mark_exposed(&store, &[200]).await;

    let search = FakeReviewSearch {
        by_book: HashMap::from([(7, vec![review(200, 7, 30), review(201, 7, 3)])]),
        ..Default::default()
    };
    // Book-scoped lists come from search only
    let service = review_service(MockReviewGraph::new(), search, FakeContext::default(), &store);

    let results = service
        .generate_recommendations(ReviewRecommendationRequest::for_book(1, 7, 10))
        .await;

    assert_eq!(ids(&results), vec![200, 201]);
    assert!(results
        .iter()
        .all(|r| r.source.as_deref() == Some("book_popular")));
    assert!(store.zscore(EXPOSED_KEY, "201").await.unwrap().is_none());
    assert!(store.contains_key("recommend:review:user:1:book:7").await);
    assert!(!store.contains_key("recommend:review:user:1:feed").await);
}

#[tokio::test]
async fn test_book_scope_search_failure_returns_empty() {
    let store = InMemoryStore::new();
    let search = FakeReviewSearch {
        fail: true,
        ..Default::default()
    };
    let service = review_service(MockReviewGraph::new(), search, FakeContext::default(), &store);

    let results = service
        .generate_recommendations(ReviewRecommendationRequest::for_book(1, 7, 10))
        .await;

    assert!(results.is_empty());
}

#[tokio::test]
async fn test_graph_failure_still_serves_search_reviews() {
    let store = InMemoryStore::new();
    let mut graph = MockReviewGraph::new();
    graph
        .expect_reviews_by_similar_users()
        .returning(|_, _| Err(graph_down()));
    graph.expect_interacted_book_ids().returning(|_, _| Ok(vec![]));
    graph.expect_reviews_by_book_ids().returning(|_, _, _| Ok(vec![]));

    let service = review_service(graph, trending(), FakeContext::default(), &store);
    let results = service
        .generate_recommendations(ReviewRecommendationRequest::feed(1, 10))
        .await;

    assert_eq!(ids(&results), vec![100, 101, 102]);
}

#[tokio::test]
async fn test_graph_and_search_candidates_are_fused() {
    let store = InMemoryStore::new();
    let mut graph = MockReviewGraph::new();
    graph.expect_reviews_by_similar_users().returning(|_, _| {
        Ok(vec![
            GraphReviewRow {
                review_id: Some(100),
                book_id: Some(1),
                support: Some(5),
            },
            GraphReviewRow {
                review_id: Some(300),
                book_id: Some(3),
                support: Some(2),
            },
        ])
    });
    graph.expect_interacted_book_ids().returning(|_, _| Ok(vec![]));
    graph.expect_reviews_by_book_ids().returning(|_, _, _| Ok(vec![]));

    let service = review_service(graph, trending(), FakeContext::default(), &store);
    let results = service
        .generate_recommendations(ReviewRecommendationRequest::feed(1, 10))
        .await;

    assert_eq!(results.len(), 4);
    assert_eq!(results.iter().filter(|r| r.entity_id == 100).count(), 1);
    let similar = results
        .iter()
        .find(|r| r.entity_id == 300)
        .expect("graph review recommended");
    assert_eq!(similar.source.as_deref(), Some("graph_similar_user"));
    assert_eq!(similar.book_id, Some(3));
}

#[tokio::test]
async fn test_stats_and_adjust_are_scoped() {
    let store = InMemoryStore::new();
    let search = FakeReviewSearch {
        by_book: HashMap::from([(7, vec![review(200, 7, 30), review(201, 7, 3)])]),
        ..trending()
    };
    let service = review_service(empty_review_graph(), search, FakeContext::default(), &store);

    service.refresh_recommendations(1, None).await;
    service.refresh_recommendations(1, Some(7)).await;

    let feed = service.get_stats(1, None).await;
    let scoped = service.get_stats(1, Some(7)).await;
    assert_eq!(feed.cached_items, 3);
    assert_eq!(scoped.cached_items, 2);
    assert!(scoped.cache_ttl_seconds <= 6 * 3600);

    let bumped = service.adjust_score(Some(1), Some(7), Some(201), 5.0).await;
    assert!(bumped.is_some());
    let top = service.get_cached_recommendations(1, Some(7), None, 1).await;
    assert_eq!(ids(&top), vec![201]);

    let feed_top = service.get_cached_recommendations(1, None, None, 1).await;
    assert_eq!(ids(&feed_top), vec![100]);
}

#[tokio::test]
async fn test_review_score_breakdown_uses_session_signal() {
    let store = InMemoryStore::new();
    store.hset("session:user:1:reviews", "100", 0.1).await;
    let service = review_service(MockReviewGraph::new(), trending(), FakeContext::default(), &store);

    let plain = service.get_score_breakdown(2, None, 100).await;
    let engaged = service.get_score_breakdown(1, None, 100).await;

    assert_eq!(plain.engagement_score, 0.0);
    assert!((engaged.engagement_score - 0.2).abs() < 1e-9);
    assert!(engaged.final_score > plain.final_score);
}

#[tokio::test]
async fn test_similar_user_failure_keeps_book_affinity_reviews() {
    let store = InMemoryStore::new();
    let mut graph = MockReviewGraph::new();
    graph
        .expect_reviews_by_similar_users()
        .returning(|_, _| Err(graph_down()));
    graph.expect_interacted_book_ids().returning(|_, _| Ok(vec![9]));
    graph
        .expect_reviews_by_book_ids()
        .times(1)
        .returning(|_, _, _| {
            Ok(vec![GraphReviewRow {
                review_id: Some(400),
                book_id: Some(9),
                support: None,
            }])
        });

    let service = review_service(graph, trending(), FakeContext::default(), &store);
    let results = service
        .generate_recommendations(ReviewRecommendationRequest::feed(1, 10))
        .await;

    assert_eq!(results.len(), 4);
    let affinity = results
        .iter()
        .find(|r| r.entity_id == 400)
        .expect("book affinity review kept");
    assert_eq!(affinity.source.as_deref(), Some("graph_book_affinity"));
    assert_eq!(affinity.book_id, Some(9));
}
