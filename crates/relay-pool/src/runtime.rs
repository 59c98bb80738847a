use async_trait::async_trait;

use crate::error::Result;
use crate::types::{ContainerHandle, ContainerSpec, ExecOutput, ExitStatus};

/// Abstraction over the container runtime. The runtime itself is a black
/// box — this crate only needs to create/start/stop/exec/wait on it
/// (§1/§9 Non-goals: the sandbox implementation is out of scope).
#[async_trait]
pub trait SandboxRuntime: Send + Sync {
    async fn create(&self, spec: &ContainerSpec) -> Result<ContainerHandle>;
    async fn start(&self, handle: &ContainerHandle) -> Result<()>;
    async fn stop(&self, handle: &ContainerHandle) -> Result<()>;
    async fn exec(&self, handle: &ContainerHandle, command: &[String]) -> Result<ExecOutput>;
    async fn wait(&self, handle: &ContainerHandle) -> Result<ExitStatus>;
}

/// In-memory fake used by tests: every instance starts immediately and
/// stays "running" until `stop` is called.
pub struct FakeSandboxRuntime {
    running: std::sync::Mutex<std::collections::HashSet<String>>,
    next_id: std::sync::atomic::AtomicU64,
}

impl FakeSandboxRuntime {
    pub fn new() -> Self {
        Self {
            running: std::sync::Mutex::new(std::collections::HashSet::new()),
            next_id: std::sync::atomic::AtomicU64::new(0),
        }
    }

    pub fn is_running(&self, handle: &ContainerHandle) -> bool {
        self.running.lock().unwrap().contains(&handle.0)
    }
}

impl Default for FakeSandboxRuntime {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SandboxRuntime for FakeSandboxRuntime {
    async fn create(&self, _spec: &ContainerSpec) -> Result<ContainerHandle> {
        let id = self
            .next_id
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(ContainerHandle(format!("fake-{id}")))
    }

    async fn start(&self, handle: &ContainerHandle) -> Result<()> {
        self.running.lock().unwrap().insert(handle.0.clone());
        Ok(())
    }

    async fn stop(&self, handle: &ContainerHandle) -> Result<()> {
        self.running.lock().unwrap().remove(&handle.0);
        Ok(())
    }

    async fn exec(&self, handle: &ContainerHandle, _command: &[String]) -> Result<ExecOutput> {
        if !self.is_running(handle) {
            return Err(crate::error::PoolError::ExecFailed(format!(
                "{handle} is not running"
            )));
        }
        Ok(ExecOutput {
            stdout: Vec::new(),
            stderr: Vec::new(),
        })
    }

    async fn wait(&self, handle: &ContainerHandle) -> Result<ExitStatus> {
        if self.is_running(handle) {
            Ok(ExitStatus::StillRunning)
        } else {
            Ok(ExitStatus::Exited(0))
        }
    }
}
