//! Fetch-window planning.
//!
//! Incremental runs start a little before the newest persisted record so
//! late or corrected upstream values get re-written. Manual runs take the
//! caller's bounds verbatim.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use tracing::info;

use crate::config::SyncConfig;
use crate::domain::{LocalReading, SyncWindow};
use crate::error::AppError;
use crate::time::calendar::TransitionCalendar;
use crate::time::resolver::resolve;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowPlanner {
    /// Overlap re-requested before the newest persisted instant.
    pub buffer: Duration,
    /// How far back the very first run reaches.
    pub initial_lookback: Duration,
}

impl WindowPlanner {
    pub fn new(buffer: Duration, initial_lookback: Duration) -> Self {
        Self {
            buffer,
            initial_lookback,
        }
    }

    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(
            Duration::hours(config.sync_buffer_hours),
            Duration::days(config.initial_sync_days),
        )
    }

    /// Window for an incremental run evaluated at `now`.
    pub fn plan(&self, last_known: Option<DateTime<Utc>>, now: DateTime<Utc>) -> SyncWindow {
        match last_known {
            Some(latest) => {
                let start = latest - self.buffer;
                info!(
                    "Starting sync from {} (latest {} minus {}h buffer)",
                    start.to_rfc3339(),
                    latest.to_rfc3339(),
                    self.buffer.num_hours()
                );
                SyncWindow::new(start, now)
            }
            None => {
                let start = now - self.initial_lookback;
                info!(
                    "No existing data, fetching last {} days from {}",
                    self.initial_lookback.num_days(),
                    start.to_rfc3339()
                );
                SyncWindow::new(start, now)
            }
        }
    }
}

/// Caller-supplied `[start, end)`, used as given.
pub fn manual_window(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<SyncWindow, AppError> {
    let window = SyncWindow::new(start, end);
    if window.is_empty() {
        return Err(AppError::usage(format!(
            "Start {} is not before end {}.",
            start.to_rfc3339(),
            end.to_rfc3339()
        )));
    }
    Ok(window)
}

/// Parse a CLI date bound.
///
/// Accepted forms:
/// - `YYYY-MM-DD` (local midnight)
/// - `YYYY-MM-DDTHH:MM[:SS]` (naive local time; the earlier occurrence on a fall-back day)
/// - RFC 3339 with an explicit offset or `Z`
pub fn parse_bound(raw: &str, calendar: &TransitionCalendar) -> Result<DateTime<Utc>, AppError> {
    let raw = raw.trim();

    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return local_to_utc(date.and_hms_opt(0, 0, 0).unwrap_or_default(), raw, calendar);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }

    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(local) = NaiveDateTime::parse_from_str(raw, fmt) {
            return local_to_utc(local, raw, calendar);
        }
    }

    Err(AppError::usage(format!(
        "Invalid date '{raw}'. Use YYYY-MM-DD, YYYY-MM-DDTHH:MM:SS or an RFC 3339 timestamp."
    )))
}

fn local_to_utc(
    local: NaiveDateTime,
    raw: &str,
    calendar: &TransitionCalendar,
) -> Result<DateTime<Utc>, AppError> {
    resolve(calendar, LocalReading::unambiguous(local))
        .map_err(|e| AppError::usage(format!("Invalid date '{raw}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, 0)
            .unwrap()
            .and_utc()
    }

    #[test]
    fn incremental_window_starts_buffer_before_latest() {
        let planner = WindowPlanner::new(Duration::hours(2), Duration::days(7));
        let latest = utc(2025, 10, 26, 10, 45);
        let now = utc(2025, 10, 27, 6, 0);

        let window = planner.plan(Some(latest), now);
        assert_eq!(window.start, utc(2025, 10, 26, 8, 45));
        assert_eq!(window.end, now);
    }

    #[test]
    fn first_run_uses_initial_lookback() {
        let planner = WindowPlanner::new(Duration::hours(2), Duration::days(7));
        let now = utc(2025, 10, 27, 6, 0);

        let window = planner.plan(None, now);
        assert_eq!(window.start, utc(2025, 10, 20, 6, 0));
        assert_eq!(window.end, now);
    }

    #[test]
    fn manual_window_is_verbatim_and_rejects_inverted_bounds() {
        let start = utc(2025, 10, 25, 21, 0);
        let end = utc(2025, 10, 26, 22, 0);
        assert_eq!(manual_window(start, end).unwrap(), SyncWindow::new(start, end));

        let err = manual_window(end, start).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(manual_window(start, start).is_err());
    }

    #[test]
    fn parses_date_only_as_local_midnight() {
        let cal = TransitionCalendar::helsinki();
        assert_eq!(parse_bound("2025-10-26", &cal).unwrap(), utc(2025, 10, 25, 21, 0));
        assert_eq!(parse_bound("2025-10-27", &cal).unwrap(), utc(2025, 10, 26, 22, 0));
        assert_eq!(parse_bound("2025-01-15", &cal).unwrap(), utc(2025, 1, 14, 22, 0));
    }

    #[test]
    fn parses_naive_and_offset_timestamps() {
        let cal = TransitionCalendar::helsinki();
        assert_eq!(parse_bound("2025-06-01T12:30:00", &cal).unwrap(), utc(2025, 6, 1, 9, 30));
        assert_eq!(parse_bound("2025-06-01T12:30", &cal).unwrap(), utc(2025, 6, 1, 9, 30));
        assert_eq!(parse_bound("2025-10-26T03:30:00", &cal).unwrap(), utc(2025, 10, 26, 0, 30));
        assert_eq!(parse_bound("2025-06-01T12:30:00Z", &cal).unwrap(), utc(2025, 6, 1, 12, 30));
        assert_eq!(
            parse_bound("2025-06-01T12:30:00+03:00", &cal).unwrap(),
            utc(2025, 6, 1, 9, 30)
        );
    }

    #[test]
    fn rejects_garbage_and_skipped_times() {
        let cal = TransitionCalendar::helsinki();
        assert_eq!(parse_bound("yesterday", &cal).unwrap_err().exit_code(), 2);
        assert_eq!(parse_bound("2025-03-30T03:30:00", &cal).unwrap_err().exit_code(), 2);
    }
}
