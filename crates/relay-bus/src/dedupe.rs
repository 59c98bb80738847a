use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;

/// Bounds how many delivery-ids are remembered before the oldest are
/// evicted, so a long-lived process doesn't grow this set forever.
const MAX_TRACKED_DELIVERIES: usize = 10_000;

/// Tracks delivery-ids that have already been admitted (§4.5 dedupe).
pub struct DeliveryDedupe {
    inner: Mutex<DedupeState>,
}

struct DedupeState {
    seen: HashSet<String>,
    order: VecDeque<String>,
}

impl DeliveryDedupe {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(DedupeState {
                seen: HashSet::new(),
                order: VecDeque::new(),
            }),
        }
    }

    /// Returns `true` the first time a delivery-id is seen, `false` on any
    /// repeat. Marks the id as seen either way is a no-op for repeats.
    pub fn admit(&self, delivery_id: &str) -> bool {
        let mut state = self.inner.lock().unwrap();
        if state.seen.contains(delivery_id) {
            return false;
        }

        state.seen.insert(delivery_id.to_string());
        state.order.push_back(delivery_id.to_string());

        while state.order.len() > MAX_TRACKED_DELIVERIES {
            if let Some(oldest) = state.order.pop_front() {
                state.seen.remove(&oldest);
            }
        }

        true
    }
}

impl Default for DeliveryDedupe {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_sighting_admits() {
        let dedupe = DeliveryDedupe::new();
        assert!(dedupe.admit("m1"));
    }

    #[test]
    fn repeat_sighting_is_rejected() {
        let dedupe = DeliveryDedupe::new();
        assert!(dedupe.admit("m1"));
        assert!(!dedupe.admit("m1"));
    }

    #[test]
    fn distinct_ids_are_independent() {
        let dedupe = DeliveryDedupe::new();
        assert!(dedupe.admit("m1"));
        assert!(dedupe.admit("m2"));
    }

    #[test]
    fn eviction_forgets_oldest_beyond_the_cap() {
        let dedupe = DeliveryDedupe::new();
        for i in 0..(MAX_TRACKED_DELIVERIES + 5) {
            assert!(dedupe.admit(&format!("m{i}")));
        }
        // m0 should have been evicted and would be re-admitted if retried.
        assert!(dedupe.admit("m0"));
    }
}
