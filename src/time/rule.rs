//! Hard-coded DST rule for a single timezone.
//!
//! The metering points all live in Finland, so the only rule wired into the
//! binary is the EU one as applied to Europe/Helsinki: clocks change on the
//! last Sunday of March and October at 01:00 UTC, switching between
//! EET (UTC+2) and EEST (UTC+3).

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc, Weekday};

/// A "last Sunday of month" DST rule with fixed UTC switch time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DstRule {
    pub name: &'static str,
    /// Offset outside summer time.
    pub standard_offset: Duration,
    /// Offset during summer time.
    pub dst_offset: Duration,
    /// Month whose last Sunday starts summer time.
    pub start_month: u32,
    /// Month whose last Sunday ends summer time.
    pub end_month: u32,
    /// UTC time of day at which both switches happen.
    pub switch_utc: NaiveTime,
}

impl DstRule {
    pub fn helsinki() -> Self {
        Self {
            name: "Europe/Helsinki",
            standard_offset: Duration::hours(2),
            dst_offset: Duration::hours(3),
            start_month: 3,
            end_month: 10,
            switch_utc: NaiveTime::from_hms_opt(1, 0, 0).unwrap_or_default(),
        }
    }

    /// Local date of the spring-forward switch in `year`.
    pub fn dst_start_date(&self, year: i32) -> Option<NaiveDate> {
        last_sunday(year, self.start_month)
    }

    /// Local date of the fall-back switch in `year`.
    pub fn dst_end_date(&self, year: i32) -> Option<NaiveDate> {
        last_sunday(year, self.end_month)
    }

    /// UTC instant at which summer time starts in `year`.
    pub fn dst_start(&self, year: i32) -> Option<DateTime<Utc>> {
        self.dst_start_date(year)
            .map(|d| d.and_time(self.switch_utc).and_utc())
    }

    /// UTC instant at which summer time ends in `year`.
    pub fn dst_end(&self, year: i32) -> Option<DateTime<Utc>> {
        self.dst_end_date(year)
            .map(|d| d.and_time(self.switch_utc).and_utc())
    }

    /// Whether summer time is in force at `instant`.
    pub fn is_dst(&self, instant: DateTime<Utc>) -> bool {
        let year = instant.year();
        match (self.dst_start(year), self.dst_end(year)) {
            (Some(start), Some(end)) => instant >= start && instant < end,
            _ => false,
        }
    }

    /// UTC offset in force at `instant`.
    pub fn offset_at(&self, instant: DateTime<Utc>) -> Duration {
        if self.is_dst(instant) {
            self.dst_offset
        } else {
            self.standard_offset
        }
    }

    /// Wall-clock reading at `instant`.
    pub fn to_local(&self, instant: DateTime<Utc>) -> NaiveDateTime {
        instant.naive_utc() + self.offset_at(instant)
    }

    /// `instant` expressed with the offset in force at that moment.
    pub fn to_fixed(&self, instant: DateTime<Utc>) -> Option<DateTime<FixedOffset>> {
        let secs = i32::try_from(self.offset_at(instant).num_seconds()).ok()?;
        let offset = FixedOffset::east_opt(secs)?;
        Some(instant.with_timezone(&offset))
    }

    /// Local wall-clock time at which the affected hour starts on either
    /// transition day (the moment the switch happens, read on the standard-time clock).
    pub fn local_switch_time(&self) -> NaiveTime {
        let (time, _) = self.switch_utc.overflowing_add_signed(self.standard_offset);
        time
    }
}

/// Last Sunday of `month` in `year`.
pub fn last_sunday(year: i32, month: u32) -> Option<NaiveDate> {
    let first_of_next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    let last_day = first_of_next.pred_opt()?;
    let back = i64::from(last_day.weekday().num_days_from_sunday());
    let sunday = last_day - Duration::days(back);
    debug_assert_eq!(sunday.weekday(), Weekday::Sun);
    Some(sunday)
}
