use thiserror::Error;

#[derive(Debug, Error)]
pub enum IpcError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HMAC mismatch on {0}, file quarantined")]
    HmacMismatch(String),

    #[error("document missing '_hmac' field")]
    MissingHmac,

    #[error("malformed output frame: {0}")]
    MalformedFrame(String),
}

pub type Result<T> = std::result::Result<T, IpcError>;
