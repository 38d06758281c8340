//! Raw local-time samples -> ordered UTC records.
//!
//! Samples are partitioned by local calendar date and each date is handled
//! according to its DST classification:
//!
//! - ordinary days map every sample with the day's single offset
//! - fall-back days pair the samples of the repeated hour **by exact clock
//!   time**: the first sample at 03:15 is the pre-switch 03:15, the second one
//!   the post-switch 03:15, no matter how the pairs interleave with other
//!   minutes in the response
//! - spring-forward days drop anything stamped inside the skipped hour
//!
//! When the fetch window is known, a repeated-hour clock time seen only once
//! is placed in whichever occurrence the window covers, and records landing
//! outside the window are dropped: the store already holds those instants.
//!
//! Anomalies are logged and collected as `DataWarning`s; they never abort the
//! run and never disturb the mapping of the rest of the day.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveTime};
use tracing::{debug, info, warn};

use crate::domain::{
    DataWarning, NormalizedRecord, Occurrence, RawSample, Resolution, SyncWindow, TransitionInfo,
    TransitionKind,
};
use crate::time::calendar::TransitionCalendar;
use crate::time::resolver::{ResolveError, resolve_on};

/// Normalizer output: records sorted by instant, plus what went wrong.
#[derive(Debug, Clone, Default)]
pub struct Normalization {
    pub records: Vec<NormalizedRecord>,
    pub warnings: Vec<DataWarning>,
    /// Samples that produced no record.
    pub dropped: usize,
}

/// Normalize `samples` (in upstream emission order) and stamp each record with `resolution`.
///
/// `window` is the range the samples were requested for, if any.
pub fn normalize(
    calendar: &TransitionCalendar,
    samples: &[RawSample],
    resolution: Resolution,
    window: Option<&SyncWindow>,
) -> Normalization {
    let mut by_date: BTreeMap<NaiveDate, Vec<&RawSample>> = BTreeMap::new();
    for sample in samples {
        by_date.entry(sample.local.date()).or_default().push(sample);
    }

    let mut out = DayWriter {
        resolution,
        window: window.copied(),
        norm: Normalization {
            records: Vec::with_capacity(samples.len()),
            ..Normalization::default()
        },
    };

    for (date, day) in &by_date {
        let info = calendar.classify(*date);
        match info.kind {
            TransitionKind::None => out.plain_day(&info, day),
            TransitionKind::Gain => out.gain_day(&info, day, resolution),
            TransitionKind::Loss => out.loss_day(&info, day, resolution),
        }
    }

    // Pairs inside a repeated hour land an hour apart, so emission order is
    // not instant order.
    let mut norm = out.norm;
    norm.records.sort_by_key(|r| r.instant);

    if let Some(window) = window {
        let before = norm.records.len();
        norm.records.retain(|r| window.contains(r.instant));
        let count = before - norm.records.len();
        if count > 0 {
            warn!(
                "Dropping {count} record(s) outside {} .. {}",
                window.start.to_rfc3339(),
                window.end.to_rfc3339()
            );
            norm.warnings.push(DataWarning::OutsideWindow { count });
            norm.dropped += count;
        }
    }

    norm
}

struct DayWriter {
    resolution: Resolution,
    window: Option<SyncWindow>,
    norm: Normalization,
}

impl DayWriter {
    fn plain_day(&mut self, info: &TransitionInfo, day: &[&RawSample]) {
        self.warn_on_duplicates(day);
        for sample in day {
            self.push(info, sample, Occurrence::First);
        }
    }

    fn gain_day(&mut self, info: &TransitionInfo, day: &[&RawSample], resolution: Resolution) {
        let mut repeated: BTreeMap<NaiveTime, Vec<&RawSample>> = BTreeMap::new();
        let mut outside = Vec::with_capacity(day.len());
        for sample in day {
            let clock = sample.local.time();
            if info.in_affected_hour(clock) {
                repeated.entry(clock).or_default().push(sample);
            } else {
                outside.push(*sample);
            }
        }

        info!(
            "Fall-back day {}: {} samples ({} expected at {resolution}), {} in repeated hour",
            info.date,
            day.len(),
            info.expected_sample_count(resolution),
            day.len() - outside.len()
        );

        self.plain_day(info, &outside);

        for (clock, group) in &repeated {
            if let [sample] = group.as_slice() {
                if let Some(occurrence) = self.occurrence_in_window(info, *clock) {
                    self.push(info, sample, occurrence);
                    continue;
                }
            }

            if group.len() != 2 {
                warn!(
                    "Repeated-hour time {} {clock} appears {} time(s), expected 2; mapping best-effort",
                    info.date,
                    group.len()
                );
                self.norm.warnings.push(DataWarning::RepeatedHourCount {
                    date: info.date,
                    clock: *clock,
                    count: group.len(),
                });
            }

            for (sample, occurrence) in group.iter().zip([Occurrence::First, Occurrence::Second]) {
                self.push(info, sample, occurrence);
            }

            let surplus = group.len().saturating_sub(2);
            if surplus > 0 {
                warn!("Dropping {surplus} surplus sample(s) at {} {clock}", info.date);
                self.norm.dropped += surplus;
            }
        }
    }

    /// The single occurrence of `clock` that lies inside the fetch window.
    fn occurrence_in_window(&self, info: &TransitionInfo, clock: NaiveTime) -> Option<Occurrence> {
        let window = self.window?;
        let first = resolve_on(info, clock, Occurrence::First).ok()?;
        let second = resolve_on(info, clock, Occurrence::Second).ok()?;
        match (window.contains(first), window.contains(second)) {
            (true, false) => Some(Occurrence::First),
            (false, true) => Some(Occurrence::Second),
            _ => None,
        }
    }

    fn loss_day(&mut self, info: &TransitionInfo, day: &[&RawSample], resolution: Resolution) {
        let (skipped, valid): (Vec<&RawSample>, Vec<&RawSample>) = day
            .iter()
            .copied()
            .partition(|s| info.in_affected_hour(s.local.time()));

        info!(
            "Spring-forward day {}: {} samples ({} expected at {resolution})",
            info.date,
            day.len(),
            info.expected_sample_count(resolution)
        );

        for sample in &skipped {
            warn!(
                "Sample at {} falls in the hour skipped by the DST switch; dropping it",
                sample.local
            );
            self.norm
                .warnings
                .push(DataWarning::NonexistentLocalTime { local: sample.local });
            self.norm.dropped += 1;
        }

        self.plain_day(info, &valid);
    }

    fn push(&mut self, info: &TransitionInfo, sample: &RawSample, occurrence: Occurrence) {
        match resolve_on(info, sample.local.time(), occurrence) {
            Ok(instant) => {
                if info.kind == TransitionKind::Gain && info.in_affected_hour(sample.local.time()) {
                    debug!(
                        "Resolved ambiguous {} as occurrence {} -> {}",
                        sample.local,
                        occurrence.index(),
                        instant.to_rfc3339()
                    );
                }
                self.norm.records.push(NormalizedRecord {
                    instant,
                    value_kwh: sample.value_kwh,
                    resolution: self.resolution,
                });
            }
            Err(ResolveError::Nonexistent { local }) => {
                warn!("Sample at {local} has no UTC instant; dropping it");
                self.norm
                    .warnings
                    .push(DataWarning::NonexistentLocalTime { local });
                self.norm.dropped += 1;
            }
        }
    }

    fn warn_on_duplicates(&mut self, day: &[&RawSample]) {
        let mut counts: BTreeMap<NaiveTime, usize> = BTreeMap::new();
        for sample in day {
            *counts.entry(sample.local.time()).or_default() += 1;
        }
        let Some(date) = day.first().map(|s| s.local.date()) else {
            return;
        };
        for (clock, count) in counts {
            if count > 1 {
                let local = date.and_time(clock);
                warn!("Local time {local} appears {count} times outside a repeated hour");
                self.norm
                    .warnings
                    .push(DataWarning::DuplicateLocalTime { local, count });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, NaiveDateTime, Utc};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn local(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> NaiveDateTime {
        date(y, mo, d).and_hms_opt(h, mi, 0).unwrap()
    }

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        local(y, mo, d, h, mi).and_utc()
    }

    /// Samples for one full local day, emitted in true chronological order
    /// (so a repeated hour appears as two consecutive blocks).
    fn full_day(cal: &TransitionCalendar, day: NaiveDate, step: Duration) -> Vec<RawSample> {
        let rule = cal.rule();
        let info = cal.classify(day);
        let start = (day.and_hms_opt(0, 0, 0).unwrap() - info.offset_before).and_utc();
        let end = start + Duration::hours(info.hours_in_day());
        let mut out = Vec::new();
        let mut at = start;
        let mut value = 0.0;
        while at < end {
            value += 0.001;
            out.push(RawSample::new(rule.to_local(at), value));
            at += step;
        }
        out
    }

    fn assert_strictly_increasing(records: &[NormalizedRecord]) {
        for pair in records.windows(2) {
            assert!(pair[0].instant < pair[1].instant, "{:?} !< {:?}", pair[0], pair[1]);
        }
    }

    #[test]
    fn plain_day_maps_one_record_per_sample() {
        let cal = TransitionCalendar::helsinki();
        let samples = full_day(&cal, date(2025, 6, 10), Duration::minutes(15));
        assert_eq!(samples.len(), 96);

        let norm = normalize(&cal, &samples, Resolution::Pt15Min, None);
        assert_eq!(norm.records.len(), 96);
        assert!(norm.warnings.is_empty());
        assert_eq!(norm.dropped, 0);
        assert_strictly_increasing(&norm.records);
        assert_eq!(norm.records[0].instant, utc(2025, 6, 9, 21, 0));
        assert!(norm.records.iter().all(|r| r.resolution == Resolution::Pt15Min));
    }

    #[test]
    fn interleaved_fall_pairs_resolve_by_clock_time() {
        let cal = TransitionCalendar::helsinki();
        let clocks = [(3, 0), (3, 0), (3, 15), (3, 15), (3, 30), (3, 30), (3, 45), (3, 45)];
        let samples: Vec<RawSample> = clocks
            .iter()
            .enumerate()
            .map(|(i, (h, m))| RawSample::new(local(2025, 10, 26, *h, *m), (i + 1) as f64))
            .collect();

        let norm = normalize(&cal, &samples, Resolution::Pt15Min, None);
        assert!(norm.warnings.is_empty());

        let got: Vec<(DateTime<Utc>, f64)> =
            norm.records.iter().map(|r| (r.instant, r.value_kwh)).collect();
        let expected = vec![
            (utc(2025, 10, 26, 0, 0), 1.0),
            (utc(2025, 10, 26, 0, 15), 3.0),
            (utc(2025, 10, 26, 0, 30), 5.0),
            (utc(2025, 10, 26, 0, 45), 7.0),
            (utc(2025, 10, 26, 1, 0), 2.0),
            (utc(2025, 10, 26, 1, 15), 4.0),
            (utc(2025, 10, 26, 1, 30), 6.0),
            (utc(2025, 10, 26, 1, 45), 8.0),
        ];
        assert_eq!(got, expected);
    }

    #[test]
    fn blocked_fall_hour_pairs_the_same_way() {
        let cal = TransitionCalendar::helsinki();
        let samples = full_day(&cal, date(2025, 10, 26), Duration::minutes(15));
        assert_eq!(samples.len(), 100);

        let norm = normalize(&cal, &samples, Resolution::Pt15Min, None);
        assert_eq!(norm.records.len(), 100);
        assert!(norm.warnings.is_empty());
        assert_strictly_increasing(&norm.records);

        // Contiguous 25 hours in 15-minute steps.
        assert_eq!(norm.records[0].instant, utc(2025, 10, 25, 21, 0));
        assert_eq!(norm.records[99].instant, utc(2025, 10, 26, 21, 45));
        // Emission order is chronological, so values must come back in order.
        for pair in norm.records.windows(2) {
            assert!(pair[0].value_kwh < pair[1].value_kwh);
        }

        // Both occurrences of each repeated clock time, exactly one hour apart.
        let first = norm.records.iter().find(|r| r.instant == utc(2025, 10, 26, 0, 15)).unwrap();
        let second = norm.records.iter().find(|r| r.instant == utc(2025, 10, 26, 1, 15)).unwrap();
        assert!(first.value_kwh < second.value_kwh);
    }

    #[test]
    fn hourly_fall_day_has_25_records() {
        let cal = TransitionCalendar::helsinki();
        let samples = full_day(&cal, date(2024, 10, 27), Duration::hours(1));
        assert_eq!(samples.len(), 25);

        let norm = normalize(&cal, &samples, Resolution::Pt1H, None);
        assert_eq!(norm.records.len(), 25);
        assert_strictly_increasing(&norm.records);
        assert!(norm.records.iter().any(|r| r.instant == utc(2024, 10, 27, 0, 0)));
        assert!(norm.records.iter().any(|r| r.instant == utc(2024, 10, 27, 1, 0)));
    }

    #[test]
    fn lone_repeated_sample_is_first_occurrence_with_warning() {
        let cal = TransitionCalendar::helsinki();
        let samples = vec![
            RawSample::new(local(2025, 10, 26, 3, 0), 1.0),
            RawSample::new(local(2025, 10, 26, 3, 0), 2.0),
            RawSample::new(local(2025, 10, 26, 3, 15), 3.0),
        ];

        let norm = normalize(&cal, &samples, Resolution::Pt15Min, None);
        assert_eq!(norm.records.len(), 3);
        assert_eq!(
            norm.warnings,
            vec![DataWarning::RepeatedHourCount {
                date: date(2025, 10, 26),
                clock: NaiveTime::from_hms_opt(3, 15, 0).unwrap(),
                count: 1,
            }]
        );
        let lone = norm.records.iter().find(|r| r.value_kwh == 3.0).unwrap();
        assert_eq!(lone.instant, utc(2025, 10, 26, 0, 15));
    }

    #[test]
    fn surplus_repeated_samples_are_dropped() {
        let cal = TransitionCalendar::helsinki();
        let samples = vec![
            RawSample::new(local(2025, 10, 26, 3, 30), 1.0),
            RawSample::new(local(2025, 10, 26, 3, 30), 2.0),
            RawSample::new(local(2025, 10, 26, 3, 30), 3.0),
            RawSample::new(local(2025, 10, 26, 5, 0), 4.0),
        ];

        let norm = normalize(&cal, &samples, Resolution::Pt15Min, None);
        assert_eq!(norm.records.len(), 3);
        assert_eq!(norm.dropped, 1);
        assert_eq!(norm.warnings.len(), 1);
        assert_strictly_increasing(&norm.records);
        assert!(norm.records.iter().all(|r| r.value_kwh != 3.0));
    }

    #[test]
    fn spring_day_has_no_synthetic_records() {
        let cal = TransitionCalendar::helsinki();
        let samples = full_day(&cal, date(2025, 3, 30), Duration::minutes(15));
        assert_eq!(samples.len(), 92);
        assert!(samples.iter().all(|s| s.local.time() < NaiveTime::from_hms_opt(3, 0, 0).unwrap()
            || s.local.time() >= NaiveTime::from_hms_opt(4, 0, 0).unwrap()));

        let norm = normalize(&cal, &samples, Resolution::Pt15Min, None);
        assert_eq!(norm.records.len(), 92);
        assert!(norm.warnings.is_empty());
        assert_strictly_increasing(&norm.records);

        // 02:45 EET and 04:00 EEST are adjacent instants.
        let before = norm.records.iter().position(|r| r.instant == utc(2025, 3, 30, 0, 45)).unwrap();
        assert_eq!(norm.records[before + 1].instant, utc(2025, 3, 30, 1, 0));
    }

    #[test]
    fn spring_day_drops_samples_in_skipped_hour() {
        let cal = TransitionCalendar::helsinki();
        let samples = vec![
            RawSample::new(local(2025, 3, 30, 2, 45), 1.0),
            RawSample::new(local(2025, 3, 30, 3, 0), 9.0),
            RawSample::new(local(2025, 3, 30, 3, 15), 9.0),
            RawSample::new(local(2025, 3, 30, 4, 0), 2.0),
        ];

        let norm = normalize(&cal, &samples, Resolution::Pt15Min, None);
        assert_eq!(norm.dropped, 2);
        assert_eq!(
            norm.warnings,
            vec![
                DataWarning::NonexistentLocalTime { local: local(2025, 3, 30, 3, 0) },
                DataWarning::NonexistentLocalTime { local: local(2025, 3, 30, 3, 15) },
            ]
        );
        let instants: Vec<_> = norm.records.iter().map(|r| r.instant).collect();
        assert_eq!(instants, vec![utc(2025, 3, 30, 0, 45), utc(2025, 3, 30, 1, 0)]);
    }

    #[test]
    fn multi_day_input_is_partitioned_and_sorted() {
        let cal = TransitionCalendar::helsinki();
        let mut samples = full_day(&cal, date(2025, 10, 25), Duration::hours(1));
        samples.extend(full_day(&cal, date(2025, 10, 26), Duration::hours(1)));
        samples.extend(full_day(&cal, date(2025, 10, 27), Duration::hours(1)));
        assert_eq!(samples.len(), 24 + 25 + 24);

        let norm = normalize(&cal, &samples, Resolution::Pt1H, None);
        assert_eq!(norm.records.len(), 73);
        assert_strictly_increasing(&norm.records);
        assert_eq!(
            norm.records.last().unwrap().instant - norm.records[0].instant,
            Duration::hours(72)
        );
    }

    #[test]
    fn duplicate_on_plain_day_is_kept_and_flagged() {
        let cal = TransitionCalendar::helsinki();
        let samples = vec![
            RawSample::new(local(2025, 6, 1, 10, 0), 1.0),
            RawSample::new(local(2025, 6, 1, 10, 0), 1.0),
        ];

        let norm = normalize(&cal, &samples, Resolution::Pt1H, None);
        assert_eq!(norm.records.len(), 2);
        assert_eq!(norm.records[0], norm.records[1]);
        assert_eq!(
            norm.warnings,
            vec![DataWarning::DuplicateLocalTime { local: local(2025, 6, 1, 10, 0), count: 2 }]
        );
    }

    #[test]
    fn normalization_is_deterministic() {
        let cal = TransitionCalendar::helsinki();
        let samples = full_day(&cal, date(2025, 10, 26), Duration::minutes(15));
        let a = normalize(&cal, &samples, Resolution::Pt15Min, None);
        let b = normalize(&cal, &samples, Resolution::Pt15Min, None);
        assert_eq!(a.records, b.records);
        assert_eq!(a.warnings, b.warnings);
    }

    fn fall_window(start: (u32, u32), end: (u32, u32)) -> SyncWindow {
        SyncWindow::new(utc(2025, 10, 26, start.0, start.1), utc(2025, 10, 26, end.0, end.1))
    }

    #[test]
    fn lone_repeated_sample_takes_the_occurrence_inside_the_window() {
        let cal = TransitionCalendar::helsinki();
        // Window opens at the first 03:30, so 03:00 and 03:15 are only
        // available from the second pass through the hour.
        let samples: Vec<RawSample> = [(3, 30), (3, 45), (3, 0), (3, 15), (3, 30), (3, 45)]
            .iter()
            .enumerate()
            .map(|(i, (h, m))| RawSample::new(local(2025, 10, 26, *h, *m), (i + 1) as f64))
            .collect();

        let window = fall_window((0, 30), (6, 0));
        let norm = normalize(&cal, &samples, Resolution::Pt15Min, Some(&window));
        assert!(norm.warnings.is_empty());
        assert_eq!(norm.dropped, 0);

        let got: Vec<(DateTime<Utc>, f64)> =
            norm.records.iter().map(|r| (r.instant, r.value_kwh)).collect();
        assert_eq!(
            got,
            vec![
                (utc(2025, 10, 26, 0, 30), 1.0),
                (utc(2025, 10, 26, 0, 45), 2.0),
                (utc(2025, 10, 26, 1, 0), 3.0),
                (utc(2025, 10, 26, 1, 15), 4.0),
                (utc(2025, 10, 26, 1, 30), 5.0),
                (utc(2025, 10, 26, 1, 45), 6.0),
            ]
        );
    }

    #[test]
    fn lone_repeated_sample_before_window_end_stays_first() {
        let cal = TransitionCalendar::helsinki();
        let samples = vec![
            RawSample::new(local(2025, 10, 26, 3, 0), 1.0),
            RawSample::new(local(2025, 10, 26, 3, 15), 2.0),
        ];

        // Run made during the first pass through the repeated hour.
        let window = fall_window((0, 0), (0, 30));
        let norm = normalize(&cal, &samples, Resolution::Pt15Min, Some(&window));
        assert!(norm.warnings.is_empty());
        let instants: Vec<_> = norm.records.iter().map(|r| r.instant).collect();
        assert_eq!(instants, vec![utc(2025, 10, 26, 0, 0), utc(2025, 10, 26, 0, 15)]);
    }

    #[test]
    fn records_outside_the_window_are_dropped_with_warning() {
        let cal = TransitionCalendar::helsinki();
        let samples = vec![
            RawSample::new(local(2025, 6, 1, 11, 0), 1.0),
            RawSample::new(local(2025, 6, 1, 12, 0), 2.0),
            RawSample::new(local(2025, 6, 1, 13, 0), 3.0),
        ];
        let window = SyncWindow::new(utc(2025, 6, 1, 9, 0), utc(2025, 6, 1, 10, 0));

        let norm = normalize(&cal, &samples, Resolution::Pt1H, Some(&window));
        assert_eq!(norm.records.len(), 1);
        assert_eq!(norm.records[0].instant, utc(2025, 6, 1, 9, 0));
        assert_eq!(norm.dropped, 2);
        assert_eq!(norm.warnings, vec![DataWarning::OutsideWindow { count: 2 }]);
    }

    #[test]
    fn empty_input_yields_empty_output() {
        let cal = TransitionCalendar::helsinki();
        let norm = normalize(&cal, &[], Resolution::Pt15Min, None);
        assert!(norm.records.is_empty());
        assert!(norm.warnings.is_empty());
    }
}
