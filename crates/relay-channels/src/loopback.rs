use std::sync::Mutex;

use async_trait::async_trait;

use crate::channel::Channel;
use crate::error::ChannelError;
use crate::types::{ChannelOutbound, ChannelStatus};

/// In-process test double that simply records whatever it is asked to send.
/// Never talks to a real network — used by relay-bus/relay-dispatcher tests
/// in place of a Discord/Telegram/web adapter.
pub struct LoopbackChannel {
    name: String,
    status: Mutex<ChannelStatus>,
    sent: Mutex<Vec<ChannelOutbound>>,
}

impl LoopbackChannel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: Mutex::new(ChannelStatus::Disconnected),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// All replies sent through this channel so far, in order.
    pub fn sent(&self) -> Vec<ChannelOutbound> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Channel for LoopbackChannel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn connect(&mut self) -> Result<(), ChannelError> {
        *self.status.lock().unwrap() = ChannelStatus::Connected;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), ChannelError> {
        *self.status.lock().unwrap() = ChannelStatus::Disconnected;
        Ok(())
    }

    async fn send(&self, msg: &ChannelOutbound) -> Result<(), ChannelError> {
        if !matches!(*self.status.lock().unwrap(), ChannelStatus::Connected) {
            return Err(ChannelError::NotConnected(self.name.clone()));
        }
        self.sent.lock().unwrap().push(msg.clone());
        Ok(())
    }

    fn status(&self) -> ChannelStatus {
        self.status.lock().unwrap().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::types::{ConversationId, OutboundReply};

    fn reply(body: &str) -> ChannelOutbound {
        ChannelOutbound {
            channel: "loopback".into(),
            reply: OutboundReply {
                conversation: ConversationId::from("c1"),
                body: body.to_string(),
                sender_tag: None,
            },
        }
    }

    #[tokio::test]
    async fn send_before_connect_fails() {
        let channel = LoopbackChannel::new("loopback");
        let result = channel.send(&reply("hi")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn connect_then_send_records_message() {
        let mut channel = LoopbackChannel::new("loopback");
        channel.connect().await.unwrap();
        channel.send(&reply("hi")).await.unwrap();

        let sent = channel.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].reply.body, "hi");
    }

    #[tokio::test]
    async fn disconnect_blocks_further_sends() {
        let mut channel = LoopbackChannel::new("loopback");
        channel.connect().await.unwrap();
        channel.disconnect().await.unwrap();
        assert!(channel.send(&reply("hi")).await.is_err());
    }
}
