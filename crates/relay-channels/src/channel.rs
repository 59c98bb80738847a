use async_trait::async_trait;

use crate::error::ChannelError;
use crate::types::{ChannelOutbound, ChannelStatus};

/// Common interface implemented by every channel adapter. Concrete
/// adapters (Discord, Telegram, web chat, …) are external collaborators;
/// this crate owns only the contract plus a loopback test double (§1/§6).
#[async_trait]
pub trait Channel: Send + Sync {
    /// Stable lowercase identifier, unique across registered adapters.
    fn name(&self) -> &str;

    async fn connect(&mut self) -> Result<(), ChannelError>;
    async fn disconnect(&mut self) -> Result<(), ChannelError>;

    /// Deliver a single outbound reply. `&self` so a connected adapter can
    /// send concurrently without a mutable borrow.
    async fn send(&self, msg: &ChannelOutbound) -> Result<(), ChannelError>;

    fn status(&self) -> ChannelStatus;
}
