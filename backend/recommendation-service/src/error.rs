use thiserror::Error;

pub type Result<T> = std::result::Result<T, RecommendationError>;

#[derive(Debug, Error)]
pub enum RecommendationError {
    #[error("Graph store error: {0}")]
    Graph(String),

    #[error("Search store error: {0}")]
    Search(String),

    #[error("Sorted-set store error: {0}")]
    Store(String),

    #[error("User context error: {0}")]
    Context(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl From<redis::RedisError> for RecommendationError {
    fn from(err: redis::RedisError) -> Self {
        RecommendationError::Store(err.to_string())
    }
}

impl From<crate::config::ConfigError> for RecommendationError {
    fn from(err: crate::config::ConfigError) -> Self {
        RecommendationError::Config(err.to_string())
    }
}
