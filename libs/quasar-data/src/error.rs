//! Storage error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DataError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("storage backend unavailable: {0}")]
    Unavailable(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("internal storage error: {0}")]
    Internal(String),
}

pub type DataResult<T> = Result<T, DataError>;
