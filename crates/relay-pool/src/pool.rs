use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{info, warn};
use uuid::Uuid;

use relay_core::types::ConversationId;

use crate::error::Result;
use crate::runtime::SandboxRuntime;
use crate::types::{ContainerHandle, ContainerSpec, InstanceState, PoolInstance, PoolStats};

/// Warm pool of sandboxed instances, sized `[pool_min, pool_max]` (§4.7).
pub struct Pool {
    runtime: Arc<dyn SandboxRuntime>,
    spec_template: ContainerSpec,
    pool_min: usize,
    pool_max: usize,
    max_reuse: u32,
    session_max_age: chrono::Duration,
    warmup_interval: chrono::Duration,
    instances: Mutex<HashMap<String, PoolInstance>>,
    cold_spawn_fallbacks: AtomicU64,
    total_reuses: AtomicU64,
    last_warmup_at: Mutex<Option<chrono::DateTime<chrono::Utc>>>,
}

impl Pool {
    pub fn new(
        runtime: Arc<dyn SandboxRuntime>,
        spec_template: ContainerSpec,
        pool_min: usize,
        pool_max: usize,
        max_reuse: u32,
        session_max_age_ms: u64,
        warmup_interval_ms: u64,
    ) -> Self {
        Self {
            runtime,
            spec_template,
            pool_min,
            pool_max,
            max_reuse,
            session_max_age: chrono::Duration::milliseconds(session_max_age_ms as i64),
            warmup_interval: chrono::Duration::milliseconds(warmup_interval_ms as i64),
            instances: Mutex::new(HashMap::new()),
            cold_spawn_fallbacks: AtomicU64::new(0),
            total_reuses: AtomicU64::new(0),
            last_warmup_at: Mutex::new(None),
        }
    }

    /// Acquisition policy (§4.7 step 1-2): reuse a ready instance, or
    /// cold-spawn synchronously and count the fallback.
    pub async fn acquire(&self, conversation: &ConversationId) -> Result<ContainerHandle> {
        let ready_id = {
            let mut instances = self.instances.lock().unwrap();
            instances
                .iter()
                .find(|(_, inst)| inst.state == InstanceState::Ready)
                .map(|(id, _)| id.clone())
        };

        if let Some(id) = ready_id {
            let mut instances = self.instances.lock().unwrap();
            if let Some(inst) = instances.get_mut(&id) {
                inst.state = InstanceState::InUse;
                inst.bound_conversation = Some(conversation.clone());
                info!(instance = %id, "reused ready instance");
                return Ok(inst.id.clone());
            }
        }

        let handle = self.runtime.create(&self.spec_template).await?;
        self.runtime.start(&handle).await?;
        self.cold_spawn_fallbacks.fetch_add(1, Ordering::SeqCst);
        warn!(instance = %handle, "no ready instance available, cold-spawned");

        let instance = PoolInstance {
            id: handle.clone(),
            state: InstanceState::InUse,
            bound_conversation: Some(conversation.clone()),
            created_at: chrono::Utc::now(),
            reuse_count: 0,
        };
        self.instances
            .lock()
            .unwrap()
            .insert(handle.0.clone(), instance);

        Ok(handle)
    }

    /// Release policy (§4.7 step 3): return to the pool if still within
    /// reuse/age limits, otherwise drain and destroy; eagerly warm a
    /// replacement if below `pool_min`, rate-limited by the warmup interval.
    pub async fn release(&self, handle: &ContainerHandle) -> Result<()> {
        let decision = {
            let mut instances = self.instances.lock().unwrap();
            let Some(inst) = instances.get_mut(&handle.0) else {
                return Err(crate::error::PoolError::InstanceNotFound(handle.0.clone()));
            };

            inst.reuse_count += 1;
            inst.bound_conversation = None;
            let age = chrono::Utc::now() - inst.created_at;

            if inst.reuse_count < self.max_reuse && age < self.session_max_age {
                inst.state = InstanceState::Ready;
                false
            } else {
                inst.state = InstanceState::Draining;
                true
            }
        };

        self.total_reuses.fetch_add(1, Ordering::SeqCst);

        if decision {
            self.runtime.stop(handle).await?;
            let mut instances = self.instances.lock().unwrap();
            if let Some(inst) = instances.get_mut(&handle.0) {
                inst.state = InstanceState::Destroyed;
            }
            instances.remove(&handle.0);
        }

        self.maybe_warm().await?;
        Ok(())
    }

    async fn maybe_warm(&self) -> Result<()> {
        let ready_count = {
            let instances = self.instances.lock().unwrap();
            instances
                .values()
                .filter(|i| i.state == InstanceState::Ready)
                .count()
        };

        if ready_count >= self.pool_min {
            return Ok(());
        }

        let total = self.instances.lock().unwrap().len();
        if total >= self.pool_max {
            return Ok(());
        }

        let now = chrono::Utc::now();
        {
            let mut last = self.last_warmup_at.lock().unwrap();
            if let Some(prev) = *last {
                if now - prev < self.warmup_interval {
                    return Ok(());
                }
            }
            *last = Some(now);
        }

        let handle = self.runtime.create(&self.spec_template).await?;
        self.runtime.start(&handle).await?;
        self.instances.lock().unwrap().insert(
            handle.0.clone(),
            PoolInstance {
                id: handle,
                state: InstanceState::Ready,
                bound_conversation: None,
                created_at: now,
                reuse_count: 0,
            },
        );
        Ok(())
    }

    pub fn stats(&self) -> PoolStats {
        let instances = self.instances.lock().unwrap();
        let total = instances.len();
        let ready = instances
            .values()
            .filter(|i| i.state == InstanceState::Ready)
            .count();
        let in_use = instances
            .values()
            .filter(|i| i.state == InstanceState::InUse)
            .count();
        let warming = instances
            .values()
            .filter(|i| i.state == InstanceState::Warming)
            .count();

        PoolStats {
            total,
            ready,
            in_use,
            warming,
            max_size: self.pool_max,
            reuse_count: self.total_reuses.load(Ordering::SeqCst),
            cold_spawn_fallbacks: self.cold_spawn_fallbacks.load(Ordering::SeqCst),
        }
    }

    /// Force-terminate an instance outside the normal release flow, used by
    /// the dispatcher's cancellation path (§5) on deadline.
    pub async fn kill(&self, handle: &ContainerHandle) -> Result<()> {
        self.runtime.stop(handle).await?;
        let mut instances = self.instances.lock().unwrap();
        if let Some(inst) = instances.get_mut(&handle.0) {
            inst.state = InstanceState::Destroyed;
        }
        instances.remove(&handle.0);
        Ok(())
    }
}

pub fn new_session_mount(conversation: &ConversationId) -> String {
    format!("sessions/{}/{}", conversation, Uuid::new_v4())
}
