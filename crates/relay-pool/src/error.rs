use thiserror::Error;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("container runtime create failed: {0}")]
    CreateFailed(String),

    #[error("container runtime start failed: {0}")]
    StartFailed(String),

    #[error("container runtime stop failed: {0}")]
    StopFailed(String),

    #[error("container runtime exec failed: {0}")]
    ExecFailed(String),

    #[error("instance '{0}' not found")]
    InstanceNotFound(String),

    #[error("warming timed out after {0}ms")]
    WarmingTimedOut(u64),
}

pub type Result<T> = std::result::Result<T, PoolError>;
