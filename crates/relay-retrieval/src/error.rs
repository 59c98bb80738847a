use thiserror::Error;

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("store error: {0}")]
    Store(#[from] relay_store::StoreError),

    #[error("embedding backend error: {0}")]
    Embedding(String),
}

pub type Result<T> = std::result::Result<T, RetrievalError>;
