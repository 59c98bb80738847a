use std::sync::Arc;

use tokio::time::{interval, Duration};
use tracing::{error, info};

use relay_bus::Bus;
use relay_core::types::{ConversationId, Message, SyntheticOrigin};

use crate::error::Result;
use crate::store::JobStore;

/// Drives the scheduler poll loop: every tick, fire all active jobs whose
/// `next_run` has passed and inject a synthesized Message via the bus
/// (§4.9). A job offline past several fire windows fires exactly once on
/// the first tick after restart, since `due_jobs` only looks at the
/// current `next_run`, never at how many windows were missed.
pub struct SchedulerClock {
    store: Arc<JobStore>,
    bus: Arc<Bus>,
    poll_interval: Duration,
}

impl SchedulerClock {
    pub fn new(store: Arc<JobStore>, bus: Arc<Bus>, poll_interval_ms: u64) -> Self {
        Self {
            store,
            bus,
            poll_interval: Duration::from_millis(poll_interval_ms),
        }
    }

    /// Run the poll loop until `shutdown` broadcasts `true`. Intended to be
    /// spawned as its own task.
    pub async fn run(&self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        info!("scheduler clock started");
        let mut ticker = interval(self.poll_interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.tick() {
                        error!(error = %e, "scheduler tick failed");
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("scheduler clock shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// One poll iteration, exposed separately so tests can drive it without
    /// waiting on real time.
    pub fn tick(&self) -> Result<()> {
        let now = chrono::Utc::now();
        let due = self.store.due_jobs(now)?;

        for job in due {
            let message = Message {
                conversation: ConversationId::from(job.owner_conversation.clone()),
                body: format!("[scheduled:{}] {}", job.id, job.name),
                author: "scheduler".to_string(),
                received_at: now,
                origin_timestamp: now,
                delivery_id: format!("sched-{}-{}", job.id, now.timestamp_millis()),
                synthetic: Some(SyntheticOrigin::Scheduled),
            };

            if let Err(e) = self.bus.submit(message) {
                error!(job = %job.id, error = %e, "failed to submit scheduled message to bus");
            } else {
                info!(job = %job.id, conversation = %job.owner_conversation, "fired scheduled job");
            }

            self.store.record_fire(&job.id, now)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_bus::ConversationRegistry;
    use relay_core::types::Conversation;

    fn bus_with_registered(id: &str) -> Arc<Bus> {
        let registry = Arc::new(ConversationRegistry::new());
        registry.register(Conversation {
            id: ConversationId::from(id),
            display_name: id.to_string(),
            folder_slug: id.to_string(),
            trigger_token: None,
            is_main: false,
            created_at: chrono::Utc::now(),
        });
        let (sink, _rx) = relay_bus::ChannelSink::new();
        Arc::new(Bus::new(registry, Arc::new(sink)))
    }

    #[test]
    fn tick_fires_due_jobs_and_advances_next_run() {
        let store = Arc::new(JobStore::open_in_memory().unwrap());
        let job = store
            .submit("c1", "ping", crate::types::Schedule::Interval { every_ms: 60_000 })
            .unwrap();

        let bus = bus_with_registered("c1");
        let clock = SchedulerClock::new(store.clone(), bus, 1_000);

        // Not due yet.
        clock.tick().unwrap();
        assert_eq!(store.get(&job.id).unwrap().run_count, 0);
    }

    #[test]
    fn interval_job_missed_while_offline_fires_once_on_restart() {
        let store = Arc::new(JobStore::open_in_memory().unwrap());
        let job = store
            .submit("c1", "ping", crate::types::Schedule::Interval { every_ms: 60_000 })
            .unwrap();

        let bus = bus_with_registered("c1");
        let clock = SchedulerClock::new(store.clone(), bus, 1_000);

        // Simulate the process having been offline for several missed windows.
        let restart_at = chrono::Utc::now() + chrono::Duration::seconds(400);
        let due = store.due_jobs(restart_at).unwrap();
        assert_eq!(due.len(), 1);
        store.record_fire(&job.id, restart_at).unwrap();

        let updated = store.get(&job.id).unwrap();
        assert_eq!(updated.run_count, 1);
        assert_eq!(
            updated.next_run.unwrap(),
            restart_at + chrono::Duration::milliseconds(60_000)
        );
    }
}
