use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("channel '{0}' connect failed: {1}")]
    ConnectFailed(String, String),

    #[error("channel '{0}' send failed: {1}")]
    SendFailed(String, String),

    #[error("channel '{0}' is not connected")]
    NotConnected(String),
}

pub type Result<T> = std::result::Result<T, ChannelError>;
