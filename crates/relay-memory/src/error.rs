use thiserror::Error;

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("store error: {0}")]
    Store(#[from] relay_store::StoreError),

    #[error("retrieval error: {0}")]
    Retrieval(#[from] relay_retrieval::RetrievalError),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid envelope: {0}")]
    InvalidEnvelope(String),
}

pub type Result<T> = std::result::Result<T, MemoryError>;
