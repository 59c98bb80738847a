pub mod db;
pub mod error;
pub mod fts;
pub mod snapshot;
pub mod store;
pub mod types;
pub mod vector;

pub use error::{Result, StoreError};
pub use store::Store;
pub use types::{Document, Layer, NewDocument};
