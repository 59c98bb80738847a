use tokio::sync::mpsc;

use crate::types::MessageBatch;

/// Destination for admitted batches. The Group Queue (C6) implements this;
/// tests use the plain channel-backed `ChannelSink`.
pub trait BatchSink: Send + Sync {
    fn accept(&self, batch: MessageBatch);
}

/// Forwards every batch onto an unbounded channel.
pub struct ChannelSink {
    sender: mpsc::UnboundedSender<MessageBatch>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<MessageBatch>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl BatchSink for ChannelSink {
    fn accept(&self, batch: MessageBatch) {
        // Receiver dropped means nobody is listening anymore; nothing to
        // recover from at this layer.
        let _ = self.sender.send(batch);
    }
}
