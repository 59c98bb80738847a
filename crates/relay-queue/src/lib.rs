pub mod backoff;
pub mod db;
pub mod deadletter;
pub mod error;
pub mod queue;
pub mod store;
pub mod types;

pub use error::{QueueError, Result};
pub use queue::GroupQueue;
pub use store::QueueStore;
pub use types::{DeadLetterRecord, EntryState, QueueEntry};
