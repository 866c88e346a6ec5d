use thiserror::Error;

/// Errors that can occur when interacting with the observation store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness invariant was violated by a racing writer
    /// (second draft for a creator, duplicate item pair).
    #[error("Conflicting write: {0}")]
    Conflict(String),

    /// A stored value could not be mapped back to a domain value.
    #[error("Corrupt stored value: {0}")]
    Corrupt(String),

    /// A value does not fit the stored column.
    #[error("Value out of range: {0}")]
    OutOfRange(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
