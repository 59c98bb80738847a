pub mod dedup;
pub mod heartbeat;
pub mod types;

pub use dedup::AlertDedup;
pub use heartbeat::HeartbeatRunner;
pub use types::{DeliveryPolicy, HeartbeatJob, HeartbeatResult, HEARTBEAT_OK_TOKEN};
