use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("queue entry not found: {0}")]
    NotFound(String),

    #[error("conversation '{0}' already has an in-flight entry")]
    AlreadyInFlight(String),
}

pub type Result<T> = std::result::Result<T, QueueError>;
