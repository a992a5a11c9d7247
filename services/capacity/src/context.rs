use chrono::{Datelike, Local, NaiveDate, NaiveDateTime, Timelike};
use uuid::Uuid;

/// Identity and clock of one batch run.
///
/// Created once at start-up and passed to every step, so every row written by
/// the run carries the same `timestamp`.
#[derive(Debug, Clone, PartialEq)]
pub struct RunContext {
    pub run_id: Uuid,
    pub started_at: NaiveDateTime,
    pub timestamp: NaiveDateTime,
}

impl RunContext {
    /// Context for a run starting now.
    pub fn new(use_rounded_timestamp: bool) -> Self {
        Self::at(Local::now().naive_local(), use_rounded_timestamp)
    }

    pub fn at(started_at: NaiveDateTime, use_rounded_timestamp: bool) -> Self {
        let timestamp = if use_rounded_timestamp {
            truncate_to_hour(started_at)
        } else {
            truncate_to_second(started_at)
        };
        RunContext {
            run_id: Uuid::new_v4(),
            started_at,
            timestamp,
        }
    }

    pub fn today(&self) -> NaiveDate {
        self.timestamp.date()
    }

    pub fn year(&self) -> i32 {
        self.timestamp.year()
    }
}

pub fn truncate_to_hour(dt: NaiveDateTime) -> NaiveDateTime {
    dt.date()
        .and_hms_opt(dt.hour(), 0, 0)
        .unwrap_or(dt)
}

fn truncate_to_second(dt: NaiveDateTime) -> NaiveDateTime {
    dt.with_nanosecond(0).unwrap_or(dt)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f").unwrap()
    }

    #[test]
    fn test_rounded_timestamp() {
        let ctx = RunContext::at(dt("2024-04-03 14:37:12.5"), true);
        assert_eq!(ctx.timestamp, dt("2024-04-03 14:00:00.0"));
        assert_eq!(ctx.today(), NaiveDate::from_ymd_opt(2024, 4, 3).unwrap());
        assert_eq!(ctx.year(), 2024);
    }

    #[test]
    fn test_exact_timestamp_drops_subseconds() {
        let ctx = RunContext::at(dt("2024-04-03 14:37:12.5"), false);
        assert_eq!(ctx.timestamp, dt("2024-04-03 14:37:12.0"));
    }

    #[test]
    fn test_run_ids_differ() {
        let a = RunContext::at(dt("2024-04-03 14:37:12.0"), true);
        let b = RunContext::at(dt("2024-04-03 14:37:12.0"), true);
        assert_ne!(a.run_id, b.run_id);
        assert_eq!(a.timestamp, b.timestamp);
    }
}
