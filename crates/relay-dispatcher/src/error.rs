use thiserror::Error;

/// Errors surfaced while orchestrating a single queue entry through a
/// container turn (§4.7/§4.8/§7 "Turn failure").
#[derive(Debug, Error)]
pub enum TurnError {
    #[error("pool error: {0}")]
    Pool(#[from] relay_pool::PoolError),

    #[error("ipc error: {0}")]
    Ipc(#[from] relay_ipc::IpcError),

    #[error("conversation {0} is not registered")]
    UnknownConversation(String),

    #[error("warming timed out after {0}ms")]
    WarmingTimedOut(u64),

    #[error("agent produced no framed result before the output timeout")]
    OutputTimedOut,

    #[error("agent exited with an error: {0}")]
    AgentError(String),

    #[error("channel send failed: {0}")]
    Channel(#[from] relay_channels::ChannelError),
}

pub type Result<T> = std::result::Result<T, TurnError>;
