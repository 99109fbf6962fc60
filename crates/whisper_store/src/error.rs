use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Serialisation error: {0}")]
    Serialisation(#[from] serde_json::Error),

    /// A stored value failed to parse back into its domain type. Indicates
    /// external tampering or a bug, never normal operation.
    #[error("Corrupt record: {0}")]
    Corrupt(String),

    #[error("Migration error: {0}")]
    Migration(String),
}
