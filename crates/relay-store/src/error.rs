use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("document not found: {id}")]
    NotFound { id: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("migration incomplete: required column/index missing: {0}")]
    MigrationIncomplete(String),

    #[error("snapshot failed: {0}")]
    SnapshotFailed(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;
