use std::time::Duration;
use thiserror::Error;

/// Failure of a single post-commit observer. Never surfaced to the caller.
#[derive(Debug, Error)]
pub enum ObserverError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Observer timed out after {0:?}")]
    Timeout(Duration),
}
