use serde::Deserialize;
use std::env;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key} has invalid value {value:?}")]
    InvalidValue { key: String, value: String },

    #[error("{0}")]
    OutOfRange(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecommendationConfig {
    pub redis: RedisConfig,
    pub book: BookRecommendationConfig,
    pub review: ReviewRecommendationConfig,
    pub sampling: SamplingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
        }
    }
}

/// How far back the user analysis context looks.
#[derive(Debug, Clone, Deserialize)]
pub struct ContextConfig {
    pub review_limit: usize,
    pub library_limit: usize,
    pub search_limit: usize,
    pub search_days: i64,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            review_limit: 10,
            library_limit: 10,
            search_limit: 10,
            search_days: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    pub max_items: usize,
    pub ttl_hours: u64,
}

impl CacheConfig {
    pub fn ttl_seconds(&self) -> i64 {
        hours_to_seconds(self.ttl_hours)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_items: 100,
            ttl_hours: 24,
        }
    }
}

/// Rolling exposure history of the review feed.
#[derive(Debug, Clone, Deserialize)]
pub struct ExposureConfig {
    /// How many of the most recent exposures are used for filtering
    pub filter_limit: usize,
    pub max_items: usize,
    pub ttl_hours: u64,
}

impl ExposureConfig {
    pub fn ttl_seconds(&self) -> i64 {
        hours_to_seconds(self.ttl_hours)
    }
}

impl Default for ExposureConfig {
    fn default() -> Self {
        Self {
            filter_limit: 200,
            max_items: 500,
            ttl_hours: 72,
        }
    }
}

/// Weights of the popularity formulas. Raw counts are combined linearly and
/// squashed with `log10(x + 1) / divisor`, capped at 1.0.
#[derive(Debug, Clone, Deserialize)]
pub struct PopularityWeights {
    pub view: f64,
    pub wishlist: f64,
    pub review: f64,
    pub like: f64,
    pub comment: f64,
    pub bookmark: f64,
    pub book_log_divisor: f64,
    pub review_log_divisor: f64,
}

impl Default for PopularityWeights {
    fn default() -> Self {
        Self {
            view: 1.0,
            wishlist: 5.0,
            review: 3.0,
            like: 1.0,
            comment: 2.0,
            bookmark: 1.5,
            book_log_divisor: 4.0,
            review_log_divisor: 2.5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BookScoringWeights {
    pub graph: f64,
    pub semantic: f64,
    pub engagement: f64,
    pub popularity: f64,
    pub freshness: f64,
}

impl Default for BookScoringWeights {
    fn default() -> Self {
        Self {
            graph: 0.4,
            semantic: 0.3,
            engagement: 0.15,
            popularity: 0.1,
            freshness: 0.05,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReviewScoringWeights {
    pub popularity: f64,
    pub freshness: f64,
    pub engagement: f64,
    pub content: f64,
    pub book_context: f64,
}

impl Default for ReviewScoringWeights {
    fn default() -> Self {
        Self {
            popularity: 0.35,
            freshness: 0.15,
            engagement: 0.2,
            content: 0.2,
            book_context: 0.1,
        }
    }
}

/// Values substituted when a candidate has no signal for a component.
#[derive(Debug, Clone, Deserialize)]
pub struct NeutralScores {
    pub source_component: f64,
    pub freshness: f64,
}

impl Default for NeutralScores {
    fn default() -> Self {
        Self {
            source_component: 0.0,
            freshness: 0.5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BookRecommendationConfig {
    pub max_candidates: usize,
    /// Share of `max_candidates` requested from the graph generator
    pub graph_share: f64,
    pub popular_pool_size: usize,
    pub seed_limit: usize,
    /// Limit used when a refresh recomputes the cache
    pub refresh_limit: usize,
    pub context: ContextConfig,
    pub cache: CacheConfig,
    pub weights: BookScoringWeights,
    pub neutral: NeutralScores,
    pub popularity: PopularityWeights,
}

impl Default for BookRecommendationConfig {
    fn default() -> Self {
        Self {
            max_candidates: 200,
            graph_share: 0.5,
            popular_pool_size: 100,
            seed_limit: 3,
            refresh_limit: 50,
            context: ContextConfig::default(),
            cache: CacheConfig::default(),
            weights: BookScoringWeights::default(),
            neutral: NeutralScores::default(),
            popularity: PopularityWeights::default(),
        }
    }
}

/// Mixing ratios of the review feed.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedMixConfig {
    /// Share of `max_candidates` requested from the graph generator
    pub graph_share: f64,
    /// Share of the graph budget spent on the similar-users traversal
    pub graph_similar_ratio: f64,
    pub graph_book_seed_limit: usize,
    /// Share of the search budget spent on interest (MLT + semantic) retrieval
    pub interest_ratio: f64,
    pub mlt_ratio: f64,
    pub semantic_ratio: f64,
}

impl Default for FeedMixConfig {
    fn default() -> Self {
        Self {
            graph_share: 0.3,
            graph_similar_ratio: 0.5,
            graph_book_seed_limit: 5,
            interest_ratio: 0.4,
            mlt_ratio: 0.5,
            semantic_ratio: 0.5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReviewRecommendationConfig {
    pub max_candidates: usize,
    pub seed_limit: usize,
    pub refresh_limit: usize,
    pub context: ContextConfig,
    pub cache: CacheConfig,
    pub exposure: ExposureConfig,
    pub mix: FeedMixConfig,
    pub weights: ReviewScoringWeights,
    pub neutral: NeutralScores,
    pub popularity: PopularityWeights,
}

impl Default for ReviewRecommendationConfig {
    fn default() -> Self {
        Self {
            max_candidates: 200,
            seed_limit: 3,
            refresh_limit: 50,
            context: ContextConfig::default(),
            cache: CacheConfig {
                max_items: 200,
                ttl_hours: 6,
            },
            exposure: ExposureConfig::default(),
            mix: FeedMixConfig::default(),
            weights: ReviewScoringWeights::default(),
            neutral: NeutralScores::default(),
            popularity: PopularityWeights::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum ShuffleStrategy {
    /// Keep the original order
    None,
    /// Keep the top N fixed, shuffle the rest
    Partial,
    /// Shuffle independently inside consecutive windows of N
    Window,
    Full,
}

impl FromStr for ShuffleStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(ShuffleStrategy::None),
            "partial" => Ok(ShuffleStrategy::Partial),
            "window" => Ok(ShuffleStrategy::Window),
            "full" => Ok(ShuffleStrategy::Full),
            other => Err(format!("unknown shuffle strategy: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TierConfig {
    pub size: usize,
    pub strategy: ShuffleStrategy,
    /// Fixed head for `Partial`, window size for `Window`
    pub param: usize,
}

impl TierConfig {
    pub fn new(size: usize, strategy: ShuffleStrategy, param: usize) -> Self {
        Self {
            size,
            strategy,
            param,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SamplingConfig {
    pub enabled: bool,
    pub tiers: Vec<TierConfig>,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tiers: vec![
                TierConfig::new(10, ShuffleStrategy::Partial, 3),
                TierConfig::new(40, ShuffleStrategy::Window, 8),
                TierConfig::new(50, ShuffleStrategy::Full, 0),
            ],
        }
    }
}

impl RecommendationConfig {
    /// Load configuration from the environment, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let defaults = RecommendationConfig::default();
        let book_defaults = defaults.book;
        let review_defaults = defaults.review;

        let config = RecommendationConfig {
            redis: RedisConfig {
                url: env::var("REDIS_URL").unwrap_or(defaults.redis.url),
            },
            book: BookRecommendationConfig {
                max_candidates: env_or("BOOK_REC_MAX_CANDIDATES", book_defaults.max_candidates)?,
                graph_share: env_or("BOOK_REC_GRAPH_SHARE", book_defaults.graph_share)?,
                popular_pool_size: env_or(
                    "BOOK_REC_POPULAR_POOL_SIZE",
                    book_defaults.popular_pool_size,
                )?,
                seed_limit: env_or("BOOK_REC_SEED_LIMIT", book_defaults.seed_limit)?,
                refresh_limit: env_or("BOOK_REC_REFRESH_LIMIT", book_defaults.refresh_limit)?,
                context: context_from_env("BOOK_REC", book_defaults.context)?,
                cache: CacheConfig {
                    max_items: env_or("BOOK_REC_CACHE_MAX_ITEMS", book_defaults.cache.max_items)?,
                    ttl_hours: env_or("BOOK_REC_CACHE_TTL_HOURS", book_defaults.cache.ttl_hours)?,
                },
                weights: BookScoringWeights {
                    graph: env_or("BOOK_REC_WEIGHT_GRAPH", book_defaults.weights.graph)?,
                    semantic: env_or("BOOK_REC_WEIGHT_SEMANTIC", book_defaults.weights.semantic)?,
                    engagement: env_or(
                        "BOOK_REC_WEIGHT_ENGAGEMENT",
                        book_defaults.weights.engagement,
                    )?,
                    popularity: env_or(
                        "BOOK_REC_WEIGHT_POPULARITY",
                        book_defaults.weights.popularity,
                    )?,
                    freshness: env_or(
                        "BOOK_REC_WEIGHT_FRESHNESS",
                        book_defaults.weights.freshness,
                    )?,
                },
                neutral: book_defaults.neutral,
                popularity: book_defaults.popularity,
            },
            review: ReviewRecommendationConfig {
                max_candidates: env_or(
                    "REVIEW_REC_MAX_CANDIDATES",
                    review_defaults.max_candidates,
                )?,
                seed_limit: env_or("REVIEW_REC_SEED_LIMIT", review_defaults.seed_limit)?,
                refresh_limit: env_or("REVIEW_REC_REFRESH_LIMIT", review_defaults.refresh_limit)?,
                context: context_from_env("REVIEW_REC", review_defaults.context)?,
                cache: CacheConfig {
                    max_items: env_or(
                        "REVIEW_REC_CACHE_MAX_ITEMS",
                        review_defaults.cache.max_items,
                    )?,
                    ttl_hours: env_or(
                        "REVIEW_REC_CACHE_TTL_HOURS",
                        review_defaults.cache.ttl_hours,
                    )?,
                },
                exposure: ExposureConfig {
                    filter_limit: env_or(
                        "REVIEW_REC_EXPOSURE_FILTER_LIMIT",
                        review_defaults.exposure.filter_limit,
                    )?,
                    max_items: env_or(
                        "REVIEW_REC_EXPOSURE_MAX_ITEMS",
                        review_defaults.exposure.max_items,
                    )?,
                    ttl_hours: env_or(
                        "REVIEW_REC_EXPOSURE_TTL_HOURS",
                        review_defaults.exposure.ttl_hours,
                    )?,
                },
                mix: FeedMixConfig {
                    graph_share: env_or("REVIEW_REC_GRAPH_SHARE", review_defaults.mix.graph_share)?,
                    graph_similar_ratio: env_or(
                        "REVIEW_REC_GRAPH_SIMILAR_RATIO",
                        review_defaults.mix.graph_similar_ratio,
                    )?,
                    graph_book_seed_limit: env_or(
                        "REVIEW_REC_GRAPH_BOOK_SEED_LIMIT",
                        review_defaults.mix.graph_book_seed_limit,
                    )?,
                    interest_ratio: env_or(
                        "REVIEW_REC_INTEREST_RATIO",
                        review_defaults.mix.interest_ratio,
                    )?,
                    mlt_ratio: env_or("REVIEW_REC_MLT_RATIO", review_defaults.mix.mlt_ratio)?,
                    semantic_ratio: env_or(
                        "REVIEW_REC_SEMANTIC_RATIO",
                        review_defaults.mix.semantic_ratio,
                    )?,
                },
                weights: review_defaults.weights,
                neutral: review_defaults.neutral,
                popularity: review_defaults.popularity,
            },
            sampling: SamplingConfig {
                enabled: env_or("REC_SAMPLING_ENABLED", defaults.sampling.enabled)?,
                tiers: defaults.sampling.tiers,
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let ratios = [
            ("BOOK_REC_GRAPH_SHARE", self.book.graph_share),
            ("REVIEW_REC_GRAPH_SHARE", self.review.mix.graph_share),
            ("REVIEW_REC_GRAPH_SIMILAR_RATIO", self.review.mix.graph_similar_ratio),
            ("REVIEW_REC_INTEREST_RATIO", self.review.mix.interest_ratio),
            ("REVIEW_REC_MLT_RATIO", self.review.mix.mlt_ratio),
            ("REVIEW_REC_SEMANTIC_RATIO", self.review.mix.semantic_ratio),
        ];
        for (key, value) in ratios {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::OutOfRange(format!(
                    "{} must be within [0, 1], got {}",
                    key, value
                )));
            }
        }

        if self.book.cache.max_items == 0 || self.review.cache.max_items == 0 {
            return Err(ConfigError::OutOfRange(
                "cache max items must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

/// Saturates at `i64::MAX` for absurd hour counts.
fn hours_to_seconds(hours: u64) -> i64 {
    i64::try_from(hours.saturating_mul(3600)).unwrap_or(i64::MAX)
}

fn context_from_env(prefix: &str, defaults: ContextConfig) -> Result<ContextConfig, ConfigError> {
    Ok(ContextConfig {
        review_limit: env_or(&format!("{}_CONTEXT_REVIEW_LIMIT", prefix), defaults.review_limit)?,
        library_limit: env_or(
            &format!("{}_CONTEXT_LIBRARY_LIMIT", prefix),
            defaults.library_limit,
        )?,
        search_limit: env_or(&format!("{}_CONTEXT_SEARCH_LIMIT", prefix), defaults.search_limit)?,
        search_days: env_or(&format!("{}_CONTEXT_SEARCH_DAYS", prefix), defaults.search_days)?,
    })
}

fn env_or<T: FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw,
        }),
        Err(_) => Ok(default),
    }
}
