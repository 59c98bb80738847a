use std::sync::Arc;

use tokio::time::{interval, Duration};
use tracing::{error, info};

use relay_bus::Bus;
use relay_core::types::{ConversationId, Message, SyntheticOrigin};

use crate::dedup::AlertDedup;
use crate::types::{DeliveryPolicy, HeartbeatJob, HeartbeatResult};

/// Runs configured heartbeat checks on a fixed interval and decides what
/// (if anything) should be delivered back to each conversation (§4.10).
pub struct HeartbeatRunner {
    jobs: Vec<HeartbeatJob>,
    bus: Arc<Bus>,
    dedup: AlertDedup,
    policy: DeliveryPolicy,
    interval_ms: u64,
}

impl HeartbeatRunner {
    pub fn new(jobs: Vec<HeartbeatJob>, bus: Arc<Bus>, policy: DeliveryPolicy, interval_ms: u64) -> Self {
        Self {
            jobs,
            bus,
            dedup: AlertDedup::new(),
            policy,
            interval_ms,
        }
    }

    /// Run the poll loop until `shutdown` broadcasts `true`.
    pub async fn run(&self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        info!("heartbeat runner started");
        let mut ticker = interval(Duration::from_millis(self.interval_ms));
        loop {
            tokio::select! {
                _ = ticker.tick() => self.fire_checks(),
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("heartbeat runner shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// Synthesize one heartbeat prompt per configured job and route it
    /// through the same admission pipeline as scheduled tasks. Runs
    /// unconditionally, even when `delivery_muted` is set — muting only
    /// affects the outward notification, not whether checks execute.
    pub fn fire_checks(&self) {
        let now = chrono::Utc::now();
        for job in &self.jobs {
            let message = Message {
                conversation: ConversationId::from(job.conversation.clone()),
                body: job.prompt.clone(),
                author: "heartbeat".to_string(),
                received_at: now,
                origin_timestamp: now,
                delivery_id: format!("heartbeat-{}-{}", job.id, now.timestamp_millis()),
                synthetic: Some(SyntheticOrigin::Heartbeat),
            };

            if let Err(e) = self.bus.submit(message) {
                error!(job = %job.id, error = %e, "failed to submit heartbeat check to bus");
            } else {
                info!(job = %job.id, "fired heartbeat check");
            }
        }
    }

    /// Given the agent's raw response to a heartbeat prompt, decide what (if
    /// anything) should be sent to the conversation's channel.
    pub fn handle_response(&self, body: &str, now: chrono::DateTime<chrono::Utc>) -> Option<String> {
        match HeartbeatResult::from_response(body) {
            HeartbeatResult::Ok => {
                if self.policy.delivery_muted || !self.policy.show_ok {
                    None
                } else if self.policy.use_indicator {
                    Some("●".to_string())
                } else {
                    Some("heartbeat ok".to_string())
                }
            }
            HeartbeatResult::Alert(content) => {
                if self.policy.delivery_muted || !self.policy.show_alerts {
                    return None;
                }
                if self
                    .dedup
                    .should_deliver(&content, now, self.policy.alert_repeat_cooldown_ms)
                {
                    Some(content)
                } else {
                    None
                }
            }
        }
    }
}
