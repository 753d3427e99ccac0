// Utility functions for recommendation-service

use crate::config::PopularityWeights;
use crate::models::{BookDocument, RecommendationResult, ReviewDocument};
use chrono::{DateTime, NaiveDate, Utc};

/// Saturating linear scale: `count / knee`, capped at 1.0.
pub fn normalize_support(count: i64, knee: f64) -> f64 {
    if knee <= 0.0 || count <= 0 {
        return 0.0;
    }
    (count as f64 / knee).min(1.0)
}

pub fn clamp_unit(score: f64) -> f64 {
    if score.is_nan() {
        return 0.0;
    }
    score.clamp(0.0, 1.0)
}

fn count(value: Option<i64>) -> f64 {
    value.unwrap_or(0).max(0) as f64
}

/// Popularity of a book from view, wishlist and review counts.
pub fn book_popularity(doc: &BookDocument, weights: &PopularityWeights) -> f64 {
    let raw = weights.view * count(doc.view_count)
        + weights.wishlist * count(doc.wishlist_count)
        + weights.review * count(doc.review_count);
    squash(raw, weights.book_log_divisor)
}

/// Popularity of a review from its engagement counters. Views are damped
/// with `ln(1 + views)` so a heavily viewed but unliked review stays low.
pub fn review_popularity(doc: &ReviewDocument, weights: &PopularityWeights) -> f64 {
    let raw = weights.like * count(doc.like_count)
        + weights.comment * count(doc.comment_count)
        + weights.bookmark * count(doc.bookmark_count)
        + 0.5 * count(doc.view_count).ln_1p();
    squash(raw, weights.review_log_divisor)
}

fn squash(raw: f64, divisor: f64) -> f64 {
    if divisor <= 0.0 {
        return 0.0;
    }
    ((raw + 1.0).log10() / divisor).min(1.0)
}

/// Freshness of a book by publication date. Unknown dates get `default`.
pub fn book_freshness(published: Option<NaiveDate>, today: NaiveDate, default: f64) -> f64 {
    let Some(published) = published else {
        return default;
    };

    let days = (today - published).num_days();
    if days < 0 {
        1.0
    } else if days < 365 {
        1.0 - days as f64 / 365.0
    } else if days < 365 * 3 {
        0.5 - ((days - 365) as f64 / 730.0) * 0.5
    } else {
        0.1
    }
}

/// Freshness of a review by creation time. Unknown times get `default`.
pub fn review_freshness(created_at: Option<DateTime<Utc>>, now: DateTime<Utc>, default: f64) -> f64 {
    let Some(created_at) = created_at else {
        return default;
    };

    let age = now - created_at;
    if age.num_seconds() < 0 {
        return 1.0;
    }

    let days = age.num_seconds() as f64 / 86_400.0;
    if days <= 30.0 {
        1.0 - days / 60.0
    } else if days <= 180.0 {
        0.5 - ((days - 30.0) / 150.0) * 0.3
    } else {
        0.2
    }
}

/// Encode a cache member, e.g. `book:100`.
pub fn encode_member(kind: &str, id: i64) -> String {
    format!("{}:{}", kind, id)
}

/// Decode a cache member of the given kind. Anything else is `None`.
pub fn decode_member(kind: &str, member: &str) -> Option<i64> {
    let (prefix, id) = member.split_once(':')?;
    if prefix != kind {
        return None;
    }
    id.parse().ok()
}

/// Assign absolute 1-based ranks to an ordered list and return the page
/// following `cursor`.
///
/// A cursor that is not in the list yields an empty page.
pub fn paginate(
    mut results: Vec<RecommendationResult>,
    cursor: Option<i64>,
    limit: usize,
) -> Vec<RecommendationResult> {
    if limit == 0 {
        return Vec::new();
    }

    for (idx, result) in results.iter_mut().enumerate() {
        result.rank = idx + 1;
    }

    let start = match cursor {
        Some(cursor) => match results.iter().position(|r| r.entity_id == cursor) {
            Some(pos) => pos + 1,
            None => return Vec::new(),
        },
        None => 0,
    };

    results.into_iter().skip(start).take(limit).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_normalize_support() {
        assert!((normalize_support(15, 10.0) - 1.0).abs() < 1e-9);
        assert!((normalize_support(10, 10.0) - 1.0).abs() < 1e-9);
        assert!((normalize_support(5, 10.0) - 0.5).abs() < 1e-9);
        assert_eq!(normalize_support(0, 3.0), 0.0);
        assert_eq!(normalize_support(-2, 3.0), 0.0);
    }

    #[test]
    fn test_book_popularity_is_monotonic_and_capped() {
        let weights = PopularityWeights::default();
        let empty = BookDocument::default();
        assert_eq!(book_popularity(&empty, &weights), 0.0);

        let small = BookDocument {
            view_count: Some(10),
            ..Default::default()
        };
        let large = BookDocument {
            view_count: Some(10),
            wishlist_count: Some(20),
            ..Default::default()
        };
        assert!(book_popularity(&large, &weights) > book_popularity(&small, &weights));

        let huge = BookDocument {
            view_count: Some(1_000_000),
            wishlist_count: Some(1_000_000),
            review_count: Some(1_000_000),
            ..Default::default()
        };
        assert_eq!(book_popularity(&huge, &weights), 1.0);
    }

    #[test]
    fn test_review_popularity() {
        let weights = PopularityWeights::default();
        // 9 likes -> log10(10) / 2.5
        let doc = ReviewDocument {
            like_count: Some(9),
            ..Default::default()
        };
        assert!((review_popularity(&doc, &weights) - 0.4).abs() < 1e-9);

        let negative = ReviewDocument {
            like_count: Some(-5),
            ..Default::default()
        };
        assert_eq!(review_popularity(&negative, &weights), 0.0);
    }

    #[test]
    fn test_book_freshness_curve() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();

        assert_eq!(book_freshness(None, today, 0.5), 0.5);
        assert!((book_freshness(Some(today), today, 0.5) - 1.0).abs() < 1e-9);

        let one_year = today - Duration::days(365);
        assert!((book_freshness(Some(one_year), today, 0.5) - 0.5).abs() < 1e-9);

        let old = today - Duration::days(365 * 5);
        assert!((book_freshness(Some(old), today, 0.5) - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_review_freshness_curve() {
        let now = Utc::now();

        assert_eq!(review_freshness(None, now, 0.5), 0.5);
        assert!((review_freshness(Some(now), now, 0.5) - 1.0).abs() < 1e-9);
        assert!((review_freshness(Some(now - Duration::days(30)), now, 0.5) - 0.5).abs() < 1e-9);
        assert!((review_freshness(Some(now - Duration::days(180)), now, 0.5) - 0.2).abs() < 1e-9);
        assert!((review_freshness(Some(now - Duration::days(400)), now, 0.5) - 0.2).abs() < 1e-9);
        assert_eq!(review_freshness(Some(now + Duration::days(2)), now, 0.5), 1.0);
    }

    #[test]
    fn test_member_codec() {
        assert_eq!(encode_member("book", 100), "book:100");
        assert_eq!(decode_member("book", "book:100"), Some(100));
        assert_eq!(decode_member("book", "review:100"), None);
        assert_eq!(decode_member("book", "book:abc"), None);
        assert_eq!(decode_member("book", "garbage"), None);
    }

    fn ranked(ids: &[i64]) -> Vec<RecommendationResult> {
        ids.iter()
            .map(|id| RecommendationResult::from_cache(*id, 1.0))
            .collect()
    }

    #[test]
    fn test_paginate_with_cursor() {
        let page = paginate(ranked(&[1, 2, 3, 4, 5]), Some(2), 2);
        let ids: Vec<i64> = page.iter().map(|r| r.entity_id).collect();
        let ranks: Vec<usize> = page.iter().map(|r| r.rank).collect();
        assert_eq!(ids, vec![3, 4]);
        assert_eq!(ranks, vec![3, 4]);
    }

    #[test]
    fn test_paginate_edges() {
        assert!(paginate(ranked(&[1, 2, 3]), None, 0).is_empty());
        assert!(paginate(ranked(&[1, 2, 3]), Some(99), 10).is_empty());
        assert!(paginate(ranked(&[1, 2, 3]), Some(3), 10).is_empty());

        let first = paginate(ranked(&[1, 2, 3]), None, 10);
        assert_eq!(first.len(), 3);
        assert_eq!(first[0].rank, 1);
    }
}
