use serde::{Deserialize, Serialize};

use relay_core::types::ConversationId;

/// State diagram for a pool instance (§3/§4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceState {
    Warming,
    Ready,
    InUse,
    Draining,
    Destroyed,
}

/// Resource caps and mounts for a single container (§4.7).
#[derive(Debug, Clone)]
pub struct ContainerSpec {
    pub memory_limit_mb: u64,
    pub cpu_limit: f64,
    /// Read-only mount of the conversation's workspace directory.
    pub workspace_mount: String,
    /// Read-write mount of the IPC slot.
    pub ipc_mount: String,
    /// Per-session persistent mount, stable across reuse.
    pub session_mount: String,
}

/// Opaque handle to a running container, owned by the `SandboxRuntime` impl.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContainerHandle(pub String);

impl std::fmt::Display for ContainerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone)]
pub struct ExecOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Exited(i32),
    Killed,
    StillRunning,
}

/// One entry of the warm pool, tracked in-memory by `Pool` (§4.7).
#[derive(Debug, Clone)]
pub struct PoolInstance {
    pub id: ContainerHandle,
    pub state: InstanceState,
    pub bound_conversation: Option<ConversationId>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub reuse_count: u32,
}

/// Snapshot for the `/health` surface (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolStats {
    pub total: usize,
    pub ready: usize,
    pub in_use: usize,
    pub warming: usize,
    pub max_size: usize,
    pub reuse_count: u64,
    pub cold_spawn_fallbacks: u64,
}
