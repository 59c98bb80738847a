use thiserror::Error;

/// Top-level error type shared across the dispatcher and memory cores.
///
/// Variants map onto the error categories in the design: admission,
/// validation, transient-backend, turn-failure, and fatal. Individual crates
/// define narrower error enums and convert into this one at their outer
/// boundary (the API surface, the dispatcher binary).
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("admission rejected: {0}")]
    Admission(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("authentication failed")]
    AuthFailed,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("backend temporarily unavailable: {0}")]
    Transient(String),

    #[error("turn failed: {0}")]
    TurnFailure(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("fatal: {0}")]
    Fatal(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl RelayError {
    /// Short SCREAMING_SNAKE_CASE code sent to HTTP/IPC clients.
    pub fn code(&self) -> &'static str {
        match self {
            RelayError::Config(_) => "CONFIG_ERROR",
            RelayError::Admission(_) => "ADMISSION_ERROR",
            RelayError::Validation(_) => "VALIDATION_ERROR",
            RelayError::AuthFailed => "AUTH_FAILED",
            RelayError::NotFound(_) => "NOT_FOUND",
            RelayError::Transient(_) => "TRANSIENT_ERROR",
            RelayError::TurnFailure(_) => "TURN_FAILURE",
            RelayError::Database(_) => "DATABASE_ERROR",
            RelayError::Serialization(_) => "SERIALIZATION_ERROR",
            RelayError::Io(_) => "IO_ERROR",
            RelayError::Fatal(_) => "FATAL",
            RelayError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether this error class is safe to retry with backoff (§7, Transient).
    pub fn is_retryable(&self) -> bool {
        matches!(self, RelayError::Transient(_))
    }
}

pub type Result<T> = std::result::Result<T, RelayError>;
