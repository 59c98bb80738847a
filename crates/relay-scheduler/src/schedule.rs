use std::str::FromStr;

use chrono::{DateTime, Local, Utc};
use cron::Schedule as CronSchedule;

use crate::error::{Result, SchedulerError};
use crate::types::Schedule;

/// Submission-time validation (§4.9: "values are validated at submission;
/// invalid values are rejected with a specific error and no state change").
pub fn validate(schedule: &Schedule) -> Result<()> {
    match schedule {
        Schedule::Cron { expression } => {
            CronSchedule::from_str(expression)
                .map_err(|e| SchedulerError::InvalidSchedule(format!("bad cron expression: {e}")))?;
            Ok(())
        }
        Schedule::Interval { every_ms } => {
            if *every_ms == 0 {
                Err(SchedulerError::InvalidSchedule(
                    "interval must be a positive millisecond count".to_string(),
                ))
            } else {
                Ok(())
            }
        }
        Schedule::Once { .. } => Ok(()),
    }
}

/// Compute the next fire time strictly after `from`. Cron is evaluated in
/// the host's local time, then converted back to UTC for storage (§4.9).
pub fn compute_next_run(schedule: &Schedule, from: DateTime<Utc>) -> Result<Option<DateTime<Utc>>> {
    validate(schedule)?;

    match schedule {
        Schedule::Cron { expression } => {
            let cron_schedule = CronSchedule::from_str(expression)
                .map_err(|e| SchedulerError::InvalidSchedule(e.to_string()))?;
            let from_local = from.with_timezone(&Local);
            let next = cron_schedule.after(&from_local).next();
            Ok(next.map(|dt| dt.with_timezone(&Utc)))
        }
        Schedule::Interval { every_ms } => {
            Ok(Some(from + chrono::Duration::milliseconds(*every_ms as i64)))
        }
        Schedule::Once { at } => {
            if *at > from {
                Ok(Some(*at))
            } else {
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_cron_expression_is_rejected() {
        let schedule = Schedule::Cron {
            expression: "not a cron expression".to_string(),
        };
        assert!(validate(&schedule).is_err());
    }

    #[test]
    fn zero_interval_is_rejected() {
        let schedule = Schedule::Interval { every_ms: 0 };
        assert!(validate(&schedule).is_err());
    }

    #[test]
    fn interval_next_run_adds_the_interval() {
        let from = Utc::now();
        let schedule = Schedule::Interval { every_ms: 60_000 };
        let next = compute_next_run(&schedule, from).unwrap().unwrap();
        assert_eq!(next, from + chrono::Duration::milliseconds(60_000));
    }

    #[test]
    fn once_in_the_past_never_fires_again() {
        let from = Utc::now();
        let schedule = Schedule::Once {
            at: from - chrono::Duration::seconds(10),
        };
        assert_eq!(compute_next_run(&schedule, from).unwrap(), None);
    }

    #[test]
    fn once_in_the_future_fires_at_that_instant() {
        let from = Utc::now();
        let at = from + chrono::Duration::seconds(10);
        let schedule = Schedule::Once { at };
        assert_eq!(compute_next_run(&schedule, from).unwrap(), Some(at));
    }

    #[test]
    fn valid_cron_expression_computes_a_next_run() {
        // Every minute at second 0 — six fields including seconds, as the
        // `cron` crate expects.
        let schedule = Schedule::Cron {
            expression: "0 * * * * *".to_string(),
        };
        let from = Utc::now();
        let next = compute_next_run(&schedule, from).unwrap();
        assert!(next.is_some());
        assert!(next.unwrap() > from - chrono::Duration::seconds(1));
    }
}
