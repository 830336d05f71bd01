//! Persistence gateway error types.

use thiserror::Error;

/// Errors produced by the persistence gateway.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Result type for gateway operations.
pub type DbResult<T> = std::result::Result<T, DbError>;
