use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{RelayError, Result};

pub const DEFAULT_PORT: u16 = 8787;
pub const DEFAULT_BIND: &str = "127.0.0.1";

/// Top-level config (relay.toml + RELAY_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub pool: PoolConfig,
    #[serde(default)]
    pub container: ContainerConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub heartbeat: HeartbeatConfig,
    #[serde(default)]
    pub ipc: IpcConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            data: DataConfig::default(),
            api: ApiConfig::default(),
            pool: PoolConfig::default(),
            container: ContainerConfig::default(),
            queue: QueueConfig::default(),
            scheduler: SchedulerConfig::default(),
            heartbeat: HeartbeatConfig::default(),
            ipc: IpcConfig::default(),
            retrieval: RetrievalConfig::default(),
        }
    }
}

/// Where durable state lives on disk (§6 Persisted state layout).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_root")]
    pub root: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            root: default_data_root(),
        }
    }
}

fn default_data_root() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{home}/.relay")
}

/// Memory API + health surface (C4/C11).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Bearer token compared in constant time on every C4 request.
    #[serde(default = "default_token")]
    pub token: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind: default_bind(),
            token: default_token(),
        }
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_token() -> String {
    "change-me".to_string()
}

/// Warm pool sizing and lifecycle (§4.7, §7 config list).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    #[serde(default = "default_pool_min")]
    pub pool_min: usize,
    #[serde(default = "default_pool_max")]
    pub pool_max: usize,
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_containers: usize,
    #[serde(default = "default_idle_timeout_ms")]
    pub pool_idle_timeout_ms: u64,
    #[serde(default = "default_max_reuse")]
    pub pool_max_reuse: u32,
    #[serde(default = "default_warmup_interval_ms")]
    pub pool_warmup_interval_ms: u64,
    #[serde(default = "default_session_max_age_ms")]
    pub session_max_age_ms: u64,
    #[serde(default = "default_warming_max_ms")]
    pub warming_max_ms: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            pool_min: default_pool_min(),
            pool_max: default_pool_max(),
            max_concurrent_containers: default_max_concurrent(),
            pool_idle_timeout_ms: default_idle_timeout_ms(),
            pool_max_reuse: default_max_reuse(),
            pool_warmup_interval_ms: default_warmup_interval_ms(),
            session_max_age_ms: default_session_max_age_ms(),
            warming_max_ms: default_warming_max_ms(),
        }
    }
}

fn default_pool_min() -> usize {
    2
}
fn default_pool_max() -> usize {
    8
}
fn default_max_concurrent() -> usize {
    8
}
fn default_idle_timeout_ms() -> u64 {
    600_000
}
fn default_max_reuse() -> u32 {
    50
}
fn default_warmup_interval_ms() -> u64 {
    2_000
}
fn default_session_max_age_ms() -> u64 {
    3_600_000
}
fn default_warming_max_ms() -> u64 {
    15_000
}

/// Per-container resource caps and turn timeouts (§4.7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerConfig {
    #[serde(default = "default_memory_limit_mb")]
    pub memory_limit_mb: u64,
    #[serde(default = "default_cpu_limit")]
    pub cpu_limit: f64,
    #[serde(default = "default_hard_kill_timeout_ms")]
    pub hard_kill_timeout_ms: u64,
    #[serde(default = "default_output_timeout_ms")]
    pub output_timeout_ms: u64,
    #[serde(default = "default_idle_close_stdin_ms")]
    pub idle_close_stdin_ms: u64,
    #[serde(default = "default_typing_max_ttl_ms")]
    pub typing_max_ttl_ms: u64,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            memory_limit_mb: default_memory_limit_mb(),
            cpu_limit: default_cpu_limit(),
            hard_kill_timeout_ms: default_hard_kill_timeout_ms(),
            output_timeout_ms: default_output_timeout_ms(),
            idle_close_stdin_ms: default_idle_close_stdin_ms(),
            typing_max_ttl_ms: default_typing_max_ttl_ms(),
        }
    }
}

fn default_memory_limit_mb() -> u64 {
    512
}
fn default_cpu_limit() -> f64 {
    1.0
}
fn default_hard_kill_timeout_ms() -> u64 {
    120_000
}
fn default_output_timeout_ms() -> u64 {
    60_000
}
fn default_idle_close_stdin_ms() -> u64 {
    30_000
}
fn default_typing_max_ttl_ms() -> u64 {
    10_000
}

/// Per-conversation FIFO sizing and retry policy (§4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    #[serde(default = "default_queue_capacity")]
    pub capacity: usize,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_backoff_cap_ms")]
    pub backoff_cap_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: default_queue_capacity(),
            max_attempts: default_max_attempts(),
            backoff_cap_ms: default_backoff_cap_ms(),
        }
    }
}

fn default_queue_capacity() -> usize {
    20
}
fn default_max_attempts() -> u32 {
    5
}
fn default_backoff_cap_ms() -> u64 {
    60_000
}

/// Scheduler clock (§4.9).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_scheduler_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_scheduler_poll_interval_ms(),
        }
    }
}

fn default_scheduler_poll_interval_ms() -> u64 {
    1_000
}

/// Heartbeat delivery policy (§4.10).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatConfig {
    #[serde(default = "default_heartbeat_interval_ms")]
    pub interval_ms: u64,
    #[serde(default = "default_alert_cooldown_ms")]
    pub alert_repeat_cooldown_ms: u64,
    #[serde(default = "bool_true")]
    pub show_ok: bool,
    #[serde(default = "bool_true")]
    pub show_alerts: bool,
    #[serde(default)]
    pub use_indicator: bool,
    #[serde(default)]
    pub delivery_muted: bool,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_heartbeat_interval_ms(),
            alert_repeat_cooldown_ms: default_alert_cooldown_ms(),
            show_ok: true,
            show_alerts: true,
            use_indicator: false,
            delivery_muted: false,
        }
    }
}

fn default_heartbeat_interval_ms() -> u64 {
    900_000
}
fn default_alert_cooldown_ms() -> u64 {
    1_800_000
}
fn bool_true() -> bool {
    true
}

/// IPC fabric secrets (§6/§8 HMAC round-trip).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpcConfig {
    #[serde(default = "default_hmac_secret")]
    pub hmac_secret: String,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for IpcConfig {
    fn default() -> Self {
        Self {
            hmac_secret: default_hmac_secret(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

fn default_hmac_secret() -> String {
    "change-me-ipc-secret".to_string()
}
fn default_poll_interval_ms() -> u64 {
    500
}

/// Retrieval engine backends (§4.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Optional external Thai-language segmenter service. Best-effort.
    pub thai_nlp_url: Option<String>,
    /// Optional external vector backend URL override. When unset, the
    /// in-process sqlite-vec collection is used.
    pub vector_backend_url: Option<String>,
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            thai_nlp_url: None,
            vector_backend_url: None,
            cache_ttl_secs: default_cache_ttl_secs(),
        }
    }
}

fn default_cache_ttl_secs() -> u64 {
    30
}

impl RelayConfig {
    /// Load config from a TOML file with RELAY_* env var overrides.
    ///
    /// Checks in order:
    ///   1. Explicit path argument
    ///   2. ~/.relay/relay.toml
    ///   3. built-in defaults
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: RelayConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("RELAY_").split("_"))
            .extract()
            .map_err(|e| RelayError::Config(e.to_string()))?;

        Ok(config)
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{home}/.relay/relay.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_internally_consistent() {
        let cfg = RelayConfig::default();
        assert!(cfg.pool.pool_min <= cfg.pool.pool_max);
        assert!(cfg.queue.max_attempts >= 1);
    }

    #[test]
    fn load_falls_back_to_defaults_when_file_missing() {
        let cfg = RelayConfig::load(Some("/nonexistent/relay.toml")).unwrap();
        assert_eq!(cfg.api.port, DEFAULT_PORT);
    }
}
