use thiserror::Error;

#[derive(Debug, Error)]
pub enum BusError {
    #[error("conversation '{0}' is not registered")]
    UnregisteredConversation(String),

    #[error("message does not match conversation '{0}'s trigger policy")]
    TriggerMismatch(String),

    #[error("delivery '{0}' was already admitted")]
    DuplicateDelivery(String),
}

pub type Result<T> = std::result::Result<T, BusError>;
