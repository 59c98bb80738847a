use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

use relay_bus::{Bus, ConversationRegistry};
use relay_channels::{ChannelManager, LoopbackChannel};
use relay_core::config::RelayConfig;
use relay_heartbeat::{DeliveryPolicy, HeartbeatRunner};
use relay_memory::MemoryManager;
use relay_pool::{ContainerSpec, FakeSandboxRuntime, Pool};
use relay_queue::{GroupQueue, QueueStore};
use relay_retrieval::{Embedder, HashingEmbedder, RemoteEmbedder, RetrievalEngine};
use relay_scheduler::JobStore;
use relay_store::Store;

use relay_dispatcher::health;
use relay_dispatcher::state::DispatcherState;
use relay_dispatcher::worker::QueueSink;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "relay_dispatcher=info,tower_http=debug".into()),
        )
        .init();

    let config_path = std::env::var("RELAY_CONFIG").ok();
    let config = RelayConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        warn!("config load failed ({}), using defaults", e);
        RelayConfig::default()
    });

    let data_root = PathBuf::from(&config.data.root);
    std::fs::create_dir_all(&data_root)?;
    std::fs::create_dir_all(data_root.join("store"))?;
    std::fs::create_dir_all(data_root.join("ipc"))?;
    std::fs::create_dir_all(data_root.join("groups"))?;
    std::fs::create_dir_all(data_root.join("sessions"))?;
    std::fs::create_dir_all(data_root.join("dead-letter"))?;

    let store = Arc::new(Store::open(&data_root.join("store").join("relay.db"))?);

    let embedder: Arc<dyn Embedder> = match &config.retrieval.vector_backend_url {
        Some(url) => Arc::new(RemoteEmbedder::new(url.clone())),
        None => Arc::new(HashingEmbedder),
    };

    let memory = MemoryManager::new(store.clone(), embedder.clone());
    let retrieval = RetrievalEngine::with_thai_segmenter(
        store.clone(),
        embedder,
        config.retrieval.cache_ttl_secs,
        config.retrieval.thai_nlp_url.clone(),
    );
    let auth_token = Some(config.api.token.clone());
    let memory_state = Arc::new(relay_api::AppState::new(memory, retrieval, auth_token));

    let registry = Arc::new(ConversationRegistry::new());
    let queue_store = Arc::new(QueueStore::open(&data_root.join("store").join("queue.db"))?);
    let queue = Arc::new(GroupQueue::new(
        queue_store,
        config.queue.capacity,
        config.queue.max_attempts,
        config.queue.backoff_cap_ms,
        data_root.join("dead-letter"),
    ));

    let sandbox_runtime = Arc::new(FakeSandboxRuntime::new());
    let container_spec = ContainerSpec {
        memory_limit_mb: config.container.memory_limit_mb,
        cpu_limit: config.container.cpu_limit,
        workspace_mount: data_root.join("groups").display().to_string(),
        ipc_mount: data_root.join("ipc").display().to_string(),
        session_mount: data_root.join("sessions").display().to_string(),
    };
    let pool = Arc::new(Pool::new(
        sandbox_runtime,
        container_spec,
        config.pool.pool_min,
        config.pool.pool_max,
        config.pool.pool_max_reuse,
        config.pool.session_max_age_ms,
        config.pool.pool_warmup_interval_ms,
    ));

    let scheduler_store = Arc::new(JobStore::open(&data_root.join("store").join("scheduler.db"))?);

    let mut channels = ChannelManager::new();
    channels.register(Box::new(LoopbackChannel::new("loopback")));

    let state = Arc::new(DispatcherState::new(
        config.clone(),
        memory_state,
        registry.clone(),
        queue,
        pool,
        scheduler_store,
        channels,
        "loopback",
        config.ipc.hmac_secret.clone().into_bytes(),
        data_root,
    ));

    channels_connect(&state).await;

    // The Group Queue (via `QueueSink`) is the bus's sink; constructed after
    // `state` so the sink can reach the queue and the active-worker set.
    let sink = Arc::new(QueueSink::new(state.clone()));
    let bus = Arc::new(Bus::new(registry, sink));

    let scheduler = relay_scheduler::SchedulerClock::new(
        state.scheduler_store.clone(),
        bus.clone(),
        config.scheduler.poll_interval_ms,
    );
    let heartbeat_policy = DeliveryPolicy {
        show_ok: config.heartbeat.show_ok,
        show_alerts: config.heartbeat.show_alerts,
        use_indicator: config.heartbeat.use_indicator,
        delivery_muted: config.heartbeat.delivery_muted,
        alert_repeat_cooldown_ms: config.heartbeat.alert_repeat_cooldown_ms,
    };
    let heartbeat = Arc::new(HeartbeatRunner::new(
        Vec::new(),
        bus,
        heartbeat_policy,
        config.heartbeat.interval_ms,
    ));

    // One shutdown broadcast fans out to the scheduler clock, the heartbeat
    // runner, and the axum server, matching the teacher's
    // `watch::Receiver<bool>` drain pattern (SPEC_FULL.md "Graceful shutdown").
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let scheduler_rx = shutdown_rx.clone();
    let scheduler_task = tokio::spawn(async move { scheduler.run(scheduler_rx).await });
    let heartbeat_rx = shutdown_rx.clone();
    let heartbeat_task = tokio::spawn({
        let heartbeat = heartbeat.clone();
        async move { heartbeat.run(heartbeat_rx).await }
    });

    let router = health::build_router(state.clone());

    let addr: std::net::SocketAddr = format!("{}:{}", config.api.bind, config.api.port).parse()?;
    info!("relay dispatcher listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal(shutdown_tx))
        .await?;

    let _ = tokio::join!(scheduler_task, heartbeat_task);

    Ok(())
}

async fn channels_connect(state: &DispatcherState) {
    state.channels.lock().await.connect_all().await;
}

async fn shutdown_signal(shutdown_tx: tokio::sync::watch::Sender<bool>) {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received, draining in-flight turns");
    let _ = shutdown_tx.send(true);
}
