pub mod atomic;
pub mod canonical;
pub mod error;
pub mod frame;
pub mod slot;
pub mod types;

pub use error::{IpcError, Result};
pub use slot::Slot;
pub use types::{AgentBootstrap, AgentResult, InterimMessage, TurnStatus};
