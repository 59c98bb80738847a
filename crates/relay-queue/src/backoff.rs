use std::time::Duration;

const BACKOFF_BASE_MS: u64 = 1_000;
const JITTER_FRACTION: f64 = 0.10;

/// Exponential backoff with jitter, capped (default 60s, §4.6).
///
/// `attempt` is 1-based (the first retry after an initial failure).
pub fn backoff_for(attempt: u32, cap_ms: u64) -> Duration {
    let exp = BACKOFF_BASE_MS.saturating_mul(1u64 << attempt.min(20));
    let base = exp.min(cap_ms);
    let jitter = jitter_ms(base);
    Duration::from_millis(base.saturating_add(jitter))
}

/// Jitter derived from current time, avoiding a `rand` dependency (matches
/// the manager-level backoff style used for channel reconnects).
fn jitter_ms(base_ms: u64) -> u64 {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);

    let max_jitter = ((base_ms as f64) * JITTER_FRACTION) as u64;
    if max_jitter == 0 {
        return 0;
    }
    (nanos as u64) % max_jitter
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_with_attempt() {
        let first = backoff_for(1, 60_000).as_millis();
        let second = backoff_for(3, 60_000).as_millis();
        assert!(second > first);
    }

    #[test]
    fn backoff_is_capped() {
        let d = backoff_for(15, 60_000);
        // allow for jitter above the cap
        assert!(d.as_millis() <= 60_000 + 6_000);
    }
}
