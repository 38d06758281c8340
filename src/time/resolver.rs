//! Local wall-clock reading -> absolute UTC instant.
//!
//! A fall-back day repeats one hour of wall-clock time, so a bare local
//! timestamp is not enough to name an instant there. Callers pass an explicit
//! `Occurrence`: `First` uses the offset in force before the switch, `Second`
//! the one after it. Outside the repeated hour the occurrence is ignored.
//!
//! A spring-forward day skips one hour. Readings inside it name no instant at
//! all and are reported as `ResolveError::Nonexistent`, never shifted.

use std::fmt;

use chrono::{DateTime, Duration, NaiveDateTime, NaiveTime, Utc};

use crate::domain::{LocalReading, Occurrence, TransitionInfo, TransitionKind};
use crate::time::calendar::TransitionCalendar;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveError {
    /// The reading lies inside the hour skipped by a spring-forward switch.
    Nonexistent { local: NaiveDateTime },
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveError::Nonexistent { local } => {
                write!(f, "local time {local} does not exist (skipped by DST switch)")
            }
        }
    }
}

impl std::error::Error for ResolveError {}

/// Resolve `reading` to a UTC instant, classifying its date first.
pub fn resolve(
    calendar: &TransitionCalendar,
    reading: LocalReading,
) -> Result<DateTime<Utc>, ResolveError> {
    let info = calendar.classify(reading.date);
    resolve_on(&info, reading.clock, reading.occurrence)
}

/// Resolve a clock reading on an already classified date.
pub fn resolve_on(
    info: &TransitionInfo,
    clock: NaiveTime,
    occurrence: Occurrence,
) -> Result<DateTime<Utc>, ResolveError> {
    let local = info.date.and_time(clock);
    let offset = offset_for(info, clock, occurrence).ok_or(ResolveError::Nonexistent { local })?;
    Ok((local - offset).and_utc())
}

/// UTC offset that applies to `clock` on `info.date`, or `None` for skipped readings.
fn offset_for(info: &TransitionInfo, clock: NaiveTime, occurrence: Occurrence) -> Option<Duration> {
    let Some((start, end)) = info.affected_hour() else {
        return Some(info.offset_before);
    };

    if clock < start {
        return Some(info.offset_before);
    }
    if clock >= end {
        return Some(info.offset_after);
    }

    match info.kind {
        TransitionKind::Gain => Some(match occurrence {
            Occurrence::First => info.offset_before,
            Occurrence::Second => info.offset_after,
        }),
        TransitionKind::Loss => None,
        TransitionKind::None => Some(info.offset_before),
    }
}

/// Wall-clock reading and offset for `instant`, under the calendar's rule.
pub fn to_local(calendar: &TransitionCalendar, instant: DateTime<Utc>) -> (NaiveDateTime, Duration) {
    let offset = calendar.rule().offset_at(instant);
    (instant.naive_utc() + offset, offset)
}
