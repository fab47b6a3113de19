use thiserror::Error;

pub type Result<T> = std::result::Result<T, ModeratorError>;

/// Error type for the moderation service
#[derive(Error, Debug)]
pub enum ModeratorError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Redis pool error: {0}")]
    Pool(#[from] deadpool_redis::PoolError),

    #[error("Failed to create Redis pool: {0}")]
    PoolCreation(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Model call failed: {0}")]
    ModelCall(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
