// ============================================
// Window Sampler (分層視窗打散)
// ============================================
//
// Re-orders a cached ranked list per session so repeated reads do not show
// the exact same order:
// - Tier 1: keep the very top fixed, shuffle the rest of the tier
// - Tier 2: shuffle inside small windows
// - Tier 3: shuffle freely
// Items past the last tier keep their order.
//
// The seed combines the session id with the current minute, so a session
// sees a stable order for about a minute.

use crate::config::{SamplingConfig, ShuffleStrategy, TierConfig};
use crate::models::RecommendationResult;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct WindowSampler {
    config: SamplingConfig,
}

impl WindowSampler {
    pub fn new(config: SamplingConfig) -> Self {
        Self { config }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Re-order `results` for `session_id`. Output has the same items.
    pub fn apply(
        &self,
        results: Vec<RecommendationResult>,
        session_id: Option<&str>,
    ) -> Vec<RecommendationResult> {
        if !self.config.enabled || results.is_empty() {
            return results;
        }
        self.apply_with_seed(results, session_seed(session_id))
    }

    pub(crate) fn apply_with_seed(
        &self,
        mut results: Vec<RecommendationResult>,
        seed: u64,
    ) -> Vec<RecommendationResult> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut start = 0;

        for tier in &self.config.tiers {
            let size = tier.size.min(results.len() - start);
            if size == 0 {
                break;
            }
            shuffle_tier(&mut results[start..start + size], tier, &mut rng);
            start += size;
        }

        debug!(items = results.len(), sampled = start, "Applied window sampling");
        results
    }
}

fn shuffle_tier(items: &mut [RecommendationResult], tier: &TierConfig, rng: &mut StdRng) {
    match tier.strategy {
        ShuffleStrategy::None => {}
        ShuffleStrategy::Partial => {
            let fixed = tier.param.min(items.len());
            items[fixed..].shuffle(rng);
        }
        ShuffleStrategy::Window => {
            for window in items.chunks_mut(tier.param.max(1)) {
                window.shuffle(rng);
            }
        }
        ShuffleStrategy::Full => items.shuffle(rng),
    }
}

fn session_seed(session_id: Option<&str>) -> u64 {
    let now_ms = Utc::now().timestamp_millis() as u64;
    match session_id.filter(|s| !s.is_empty()) {
        Some(session_id) => {
            let mut hasher = DefaultHasher::new();
            session_id.hash(&mut hasher);
            hasher.finish() ^ (now_ms / 60_000)
        }
        None => now_ms,
    }
}
