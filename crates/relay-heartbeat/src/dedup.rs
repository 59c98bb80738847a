use std::collections::HashMap;
use std::sync::Mutex;

/// Suppresses repeat delivery of the same alert content within a cooldown
/// window (§4.10 "alerts are deduplicated").
pub struct AlertDedup {
    last_seen: Mutex<HashMap<String, chrono::DateTime<chrono::Utc>>>,
}

impl AlertDedup {
    pub fn new() -> Self {
        Self {
            last_seen: Mutex::new(HashMap::new()),
        }
    }

    /// Returns `true` if this alert content should be delivered now (either
    /// never seen, or outside the cooldown), and records the delivery.
    pub fn should_deliver(&self, content: &str, now: chrono::DateTime<chrono::Utc>, cooldown_ms: u64) -> bool {
        let mut last_seen = self.last_seen.lock().unwrap();

        if let Some(prev) = last_seen.get(content) {
            let elapsed = (now - *prev).num_milliseconds();
            if elapsed >= 0 && (elapsed as u64) < cooldown_ms {
                return false;
            }
        }

        last_seen.insert(content.to_string(), now);
        true
    }
}

impl Default for AlertDedup {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_alert_is_delivered() {
        let dedup = AlertDedup::new();
        assert!(dedup.should_deliver("disk full", chrono::Utc::now(), 60_000));
    }

    #[test]
    fn repeat_within_cooldown_is_suppressed() {
        let dedup = AlertDedup::new();
        let now = chrono::Utc::now();
        assert!(dedup.should_deliver("disk full", now, 60_000));
        assert!(!dedup.should_deliver("disk full", now + chrono::Duration::seconds(5), 60_000));
    }

    #[test]
    fn repeat_after_cooldown_is_delivered_again() {
        let dedup = AlertDedup::new();
        let now = chrono::Utc::now();
        assert!(dedup.should_deliver("disk full", now, 60_000));
        assert!(dedup.should_deliver("disk full", now + chrono::Duration::seconds(61), 60_000));
    }

    #[test]
    fn distinct_content_is_independent() {
        let dedup = AlertDedup::new();
        let now = chrono::Utc::now();
        assert!(dedup.should_deliver("disk full", now, 60_000));
        assert!(dedup.should_deliver("memory high", now, 60_000));
    }
}
