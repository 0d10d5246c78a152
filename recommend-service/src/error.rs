use quasar_cache::CacheError;
use quasar_data::DataError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RecommendError>;

#[derive(Debug, Error)]
pub enum RecommendError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("cancelled: {0}")]
    Cancelled(String),

    #[error("pipeline budget exceeded: {0}")]
    BudgetExceeded(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<CacheError> for RecommendError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::NotFound(key) => RecommendError::NotFound(key),
            CacheError::Unavailable(msg) => RecommendError::Unavailable(msg),
            other => RecommendError::Internal(other.to_string()),
        }
    }
}

impl From<DataError> for RecommendError {
    fn from(err: DataError) -> Self {
        match err {
            DataError::NotFound(id) => RecommendError::NotFound(id),
            DataError::Unavailable(msg) => RecommendError::Unavailable(msg),
            DataError::InvalidArgument(msg) => RecommendError::InvalidArgument(msg),
            DataError::Internal(msg) => RecommendError::Internal(msg),
        }
    }
}
