pub mod error;
pub mod pool;
pub mod runtime;
pub mod types;

pub use error::{PoolError, Result};
pub use pool::Pool;
pub use runtime::{FakeSandboxRuntime, SandboxRuntime};
pub use types::{
    ContainerHandle, ContainerSpec, ExecOutput, ExitStatus, InstanceState, PoolInstance, PoolStats,
};
