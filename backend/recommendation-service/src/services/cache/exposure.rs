use crate::config::ExposureConfig;
use crate::error::Result;
use crate::store::{trim_to, SortedSetStore};
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Rolling record of review ids recently shown to a user.
///
/// Key: `recommend:review:exposed:user:{user_id}`, members are plain ids
/// scored by exposure time in epoch millis.
pub struct ExposureTracker {
    store: Arc<dyn SortedSetStore>,
    config: ExposureConfig,
}

impl ExposureTracker {
    pub fn new(store: Arc<dyn SortedSetStore>, config: ExposureConfig) -> Self {
        Self { store, config }
    }

    fn key(user_id: i64) -> String {
        format!("recommend:review:exposed:user:{}", user_id)
    }

    /// Most recently exposed ids. Unparsable members are dropped; any
    /// store failure reads as "nothing exposed".
    pub async fn load_recent_ids(&self, user_id: Option<i64>) -> HashSet<i64> {
        let Some(user_id) = user_id else {
            return HashSet::new();
        };
        if self.config.filter_limit == 0 {
            return HashSet::new();
        }

        let stop = self.config.filter_limit as isize - 1;
        match self
            .store
            .zrevrange_withscores(&Self::key(user_id), 0, stop)
            .await
        {
            Ok(members) => members
                .into_iter()
                .filter_map(|(member, _)| member.parse().ok())
                .collect(),
            Err(e) => {
                warn!(user_id = user_id, error = %e, "Failed to load recent exposures");
                HashSet::new()
            }
        }
    }

    pub async fn record_exposure(&self, user_id: Option<i64>, entity_ids: &[i64]) {
        let Some(user_id) = user_id else {
            return;
        };
        if entity_ids.is_empty() {
            return;
        }

        match self.try_record(user_id, entity_ids).await {
            Ok(()) => debug!(user_id = user_id, count = entity_ids.len(), "Recorded exposures"),
            Err(e) => warn!(user_id = user_id, error = %e, "Failed to record exposures"),
        }
    }

    async fn try_record(&self, user_id: i64, entity_ids: &[i64]) -> Result<()> {
        let key = Self::key(user_id);
        let now = Utc::now().timestamp_millis() as f64;
        let items: Vec<(f64, String)> = entity_ids.iter().map(|id| (now, id.to_string())).collect();

        self.store.zadd_multiple(&key, &items).await?;
        trim_to(self.store.as_ref(), &key, self.config.max_items).await?;
        self.store.expire(&key, self.config.ttl_seconds()).await
    }
}
