//! Shared domain types.
//!
//! Everything here is an immutable value passed through one sync run:
//!
//! - raw upstream readings (`RawSample`)
//! - per-date DST classification (`TransitionInfo`)
//! - normalized output (`NormalizedRecord`)
//! - the fetch window (`SyncWindow`)

use std::fmt;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use clap::ValueEnum;

/// Sampling resolution requested from the metering API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum Resolution {
    /// 15-minute intervals (`PT15MIN`).
    #[value(name = "pt15min")]
    Pt15Min,
    /// Hourly intervals (`PT1H`).
    #[value(name = "pt1h")]
    Pt1H,
}

impl Resolution {
    /// Wire code used by the API `resultStep` parameter and stored in InfluxDB.
    pub fn code(self) -> &'static str {
        match self {
            Resolution::Pt15Min => "PT15MIN",
            Resolution::Pt1H => "PT1H",
        }
    }

    pub fn samples_per_hour(self) -> u32 {
        match self {
            Resolution::Pt15Min => 4,
            Resolution::Pt1H => 1,
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// One upstream reading, stamped with naive local wall-clock time.
///
/// Emission order matters: two samples with the same `local` time on a
/// fall-back day are told apart only by which came first.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawSample {
    pub local: NaiveDateTime,
    pub value_kwh: f64,
}

impl RawSample {
    pub fn new(local: NaiveDateTime, value_kwh: f64) -> Self {
        Self { local, value_kwh }
    }
}

/// Which repeat of an ambiguous wall-clock time is meant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Occurrence {
    /// Pre-transition offset (index 0).
    First,
    /// Post-transition offset (index 1).
    Second,
}

impl Occurrence {
    pub fn index(self) -> usize {
        match self {
            Occurrence::First => 0,
            Occurrence::Second => 1,
        }
    }
}

/// A wall-clock reading on a given local date, with its disambiguation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LocalReading {
    pub date: NaiveDate,
    pub clock: NaiveTime,
    pub occurrence: Occurrence,
}

impl LocalReading {
    pub fn new(date: NaiveDate, clock: NaiveTime, occurrence: Occurrence) -> Self {
        Self {
            date,
            clock,
            occurrence,
        }
    }

    pub fn unambiguous(local: NaiveDateTime) -> Self {
        Self::new(local.date(), local.time(), Occurrence::First)
    }
}

/// Kind of DST transition on a local calendar date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransitionKind {
    /// Ordinary 24-hour day.
    None,
    /// Clocks move back; one local hour is repeated (25-hour day).
    Gain,
    /// Clocks move forward; one local hour is skipped (23-hour day).
    Loss,
}

impl TransitionKind {
    pub fn label(self) -> &'static str {
        match self {
            TransitionKind::None => "none",
            TransitionKind::Gain => "gain (fall back)",
            TransitionKind::Loss => "loss (spring forward)",
        }
    }
}

/// DST classification of one local calendar date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransitionInfo {
    pub date: NaiveDate,
    pub kind: TransitionKind,
    /// Local wall-clock time at which the affected hour begins.
    ///
    /// For `Gain` this is the first clock reading that becomes ambiguous,
    /// for `Loss` the first reading that is skipped. `None` on ordinary days.
    pub local_transition: Option<NaiveDateTime>,
    /// UTC offset in force at local midnight.
    pub offset_before: Duration,
    /// UTC offset in force at the end of the local day.
    pub offset_after: Duration,
}

impl TransitionInfo {
    /// Length of the local day in hours (23, 24 or 25).
    pub fn hours_in_day(&self) -> i64 {
        24 + (self.offset_before - self.offset_after).num_hours()
    }

    /// Number of samples a complete day holds at `resolution`.
    pub fn expected_sample_count(&self, resolution: Resolution) -> usize {
        let hours = usize::try_from(self.hours_in_day()).unwrap_or(0);
        hours * resolution.samples_per_hour() as usize
    }

    /// Half-open `[start, end)` wall-clock window affected by the transition.
    pub fn affected_hour(&self) -> Option<(NaiveTime, NaiveTime)> {
        let start = self.local_transition?.time();
        let width = (self.offset_before - self.offset_after).abs();
        let (end, _) = start.overflowing_add_signed(width);
        Some((start, end))
    }

    /// Whether `clock` falls inside the repeated or skipped hour.
    pub fn in_affected_hour(&self, clock: NaiveTime) -> bool {
        match self.affected_hour() {
            Some((start, end)) => clock >= start && clock < end,
            None => false,
        }
    }
}

/// One normalized reading, ready to be written to storage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedRecord {
    pub instant: DateTime<Utc>,
    pub value_kwh: f64,
    pub resolution: Resolution,
}

impl NormalizedRecord {
    pub fn value_wh(&self) -> f64 {
        self.value_kwh * 1000.0
    }
}

/// Half-open `[start, end)` time range requested from upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl SyncWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant < self.end
    }
}

/// Data-quality condition found while normalizing.
///
/// None of these abort a run; they are logged and reported in the summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataWarning {
    /// A repeated-hour clock time did not appear exactly twice.
    RepeatedHourCount {
        date: NaiveDate,
        clock: NaiveTime,
        count: usize,
    },
    /// A sample was stamped inside a skipped hour and was dropped.
    NonexistentLocalTime { local: NaiveDateTime },
    /// The same clock time appeared more than once outside any repeated hour.
    DuplicateLocalTime { local: NaiveDateTime, count: usize },
    /// Records resolved to instants outside the fetch window and were dropped.
    OutsideWindow { count: usize },
}

impl fmt::Display for DataWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataWarning::RepeatedHourCount { date, clock, count } => write!(
                f,
                "{date} {clock}: repeated-hour time seen {count} time(s), expected 2"
            ),
            DataWarning::NonexistentLocalTime { local } => {
                write!(f, "{local}: falls in the skipped DST hour, dropped")
            }
            DataWarning::DuplicateLocalTime { local, count } => {
                write!(f, "{local}: seen {count} times on a non-repeating hour")
            }
            DataWarning::OutsideWindow { count } => {
                write!(f, "{count} record(s) outside the requested window, dropped")
            }
        }
    }
}
