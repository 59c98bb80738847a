pub mod bus;
pub mod dedupe;
pub mod error;
pub mod registry;
pub mod sink;
pub mod types;

pub use bus::Bus;
pub use error::{BusError, Result};
pub use registry::ConversationRegistry;
pub use sink::{BatchSink, ChannelSink};
pub use types::MessageBatch;
