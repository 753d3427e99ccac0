pub mod config;
pub mod error;
pub mod models;
pub mod ports;
pub mod services;
pub mod store;
pub mod utils;

pub use config::{ConfigError, RecommendationConfig};
pub use error::{RecommendationError, Result};
pub use models::{
    CandidateSource, RecommendationCandidate, RecommendationResult, RecommendationStats,
    ReviewScoreBreakdown, ScoreBreakdown,
};
pub use services::{
    BookRecommendationRequest, RecommendationService, ReviewRecommendationRequest,
    ReviewRecommendationService,
};
pub use store::{InMemoryStore, RedisStore, SessionSignalStore, SortedSetStore};
