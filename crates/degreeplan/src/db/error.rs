//! Error types for the plan database.

use thiserror::Error;

/// Errors raised by the storage layer.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// SQLite rejected a statement or the connection failed
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Another thread panicked while holding the connection
    #[error("Database lock poisoned: {message}")]
    Lock { message: String },

    /// A stored value could not be mapped into the domain model
    #[error("Invalid stored value in {column}: {message}")]
    InvalidData { column: &'static str, message: String },
}
