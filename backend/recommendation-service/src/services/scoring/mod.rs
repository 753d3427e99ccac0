//! Hybrid scoring of fused candidates.

mod hybrid;
mod review_hybrid;

pub use hybrid::HybridScorer;
pub use review_hybrid::ReviewHybridScorer;

use crate::store::SessionSignalStore;
use std::sync::Arc;
use tracing::debug;

/// Reads the session boost of one entity: `min(1, 2 * boost)`.
pub struct EngagementScorer {
    signals: Arc<dyn SessionSignalStore>,
    /// Hash suffix, e.g. `books` for `session:user:{id}:books`
    kind: &'static str,
}

impl EngagementScorer {
    pub fn new(signals: Arc<dyn SessionSignalStore>, kind: &'static str) -> Self {
        Self { signals, kind }
    }

    fn key(&self, user_id: i64) -> String {
        format!("session:user:{}:{}", user_id, self.kind)
    }

    pub async fn score(&self, user_id: Option<i64>, entity_id: i64) -> f64 {
        let Some(user_id) = user_id else {
            return 0.0;
        };

        match self
            .signals
            .engagement_boost(&self.key(user_id), &entity_id.to_string())
            .await
        {
            Ok(Some(boost)) if boost > 0.0 => (boost * 2.0).min(1.0),
            Ok(_) => 0.0,
            Err(e) => {
                debug!(user_id = user_id, entity_id = entity_id, error = %e, "Engagement lookup failed");
                0.0
            }
        }
    }
}
