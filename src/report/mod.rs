//! Reporting utilities: per-hour aggregation and formatted terminal output.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, DurationRound, NaiveDateTime, Utc};

use crate::domain::NormalizedRecord;
use crate::time::calendar::TransitionCalendar;
use crate::time::resolver::to_local;

pub mod format;

pub use format::*;

/// Records falling into one UTC hour.
#[derive(Debug, Clone, PartialEq)]
pub struct HourBucket {
    pub hour: DateTime<Utc>,
    /// Local wall-clock start of the hour and the offset in force.
    pub local: NaiveDateTime,
    pub offset: Duration,
    pub count: usize,
    pub total_kwh: f64,
}

/// Group records by UTC hour, in instant order.
pub fn hourly_breakdown(records: &[NormalizedRecord], calendar: &TransitionCalendar) -> Vec<HourBucket> {
    let mut hours: BTreeMap<DateTime<Utc>, (usize, f64)> = BTreeMap::new();
    for r in records {
        let hour = r
            .instant
            .duration_trunc(Duration::hours(1))
            .unwrap_or(r.instant);
        let entry = hours.entry(hour).or_default();
        entry.0 += 1;
        entry.1 += r.value_kwh;
    }

    hours
        .into_iter()
        .map(|(hour, (count, total_kwh))| {
            let (local, offset) = to_local(calendar, hour);
            HourBucket {
                hour,
                local,
                offset,
                count,
                total_kwh,
            }
        })
        .collect()
}
