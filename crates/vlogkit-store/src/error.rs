//! Repository error types.

use thiserror::Error;

/// Result type for repository operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors surfaced by the asset repository.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique-identity column collided. `field` names the offending
    /// column so callers can produce a precise message.
    #[error("{field} already exists")]
    Duplicate { field: &'static str },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    /// Classify a write error, attributing unique violations to the column
    /// named in SQLite's diagnostic ("UNIQUE constraint failed: users.email").
    pub(crate) fn from_write(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err {
            let message = db.message();
            if message.contains("UNIQUE constraint failed") {
                let field = if message.contains(".username") {
                    "username"
                } else if message.contains(".email") {
                    "email"
                } else {
                    "record"
                };
                return StoreError::Duplicate { field };
            }
        }
        StoreError::Database(err)
    }
}
