pub mod channel;
pub mod error;
pub mod loopback;
pub mod manager;
pub mod types;

pub use channel::Channel;
pub use error::{ChannelError, Result};
pub use loopback::LoopbackChannel;
pub use manager::ChannelManager;
pub use types::{ChannelConversation, ChannelInbound, ChannelOutbound, ChannelStatus};
