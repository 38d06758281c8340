//! Formatted terminal output.
//!
//! Formatting lives here so the pipeline stays free of presentation code.

use chrono::Duration;

use crate::app::pipeline::SyncOutcome;
use crate::domain::{DataWarning, TransitionInfo, TransitionKind};
use crate::report::HourBucket;

/// Summary of a `sync` or `inspect` run.
pub fn format_sync_summary(outcome: &SyncOutcome) -> String {
    let mut out = String::new();

    out.push_str("=== wattivahti-sync ===\n");
    out.push_str(&format!(
        "Window: {} .. {}\n",
        outcome.window.start.to_rfc3339(),
        outcome.window.end.to_rfc3339()
    ));
    if let Some(latest) = outcome.previous_latest {
        out.push_str(&format!("Previous latest: {}\n", latest.to_rfc3339()));
    }

    match outcome.resolution {
        Some(res) => out.push_str(&format!(
            "Resolution: {res} ({} request{})\n",
            outcome.attempts,
            if outcome.attempts == 1 { "" } else { "s" }
        )),
        None => out.push_str("Resolution: - (nothing fetched)\n"),
    }

    out.push_str(&format!(
        "Samples: fetched={} | records={} | dropped={}\n",
        outcome.fetched,
        outcome.records.len(),
        outcome.dropped
    ));

    if let (Some(first), Some(last)) = (outcome.records.first(), outcome.records.last()) {
        let total: f64 = outcome.records.iter().map(|r| r.value_kwh).sum();
        out.push_str(&format!(
            "Range: {} .. {} | total={total:.3} kWh\n",
            first.instant.to_rfc3339(),
            last.instant.to_rfc3339()
        ));
    }

    if outcome.dry_run {
        out.push_str("Written: 0 (dry run)\n");
    } else {
        out.push_str(&format!("Written: {}\n", outcome.written));
    }

    if !outcome.warnings.is_empty() {
        out.push('\n');
        out.push_str(&format_warnings(&outcome.warnings));
    }

    out
}

pub fn format_warnings(warnings: &[DataWarning]) -> String {
    let mut out = format!("Warnings ({}):\n", warnings.len());
    for w in warnings {
        out.push_str(&format!("  - {w}\n"));
    }
    out
}

/// Per-UTC-hour table used by `inspect`.
pub fn format_hourly(buckets: &[HourBucket]) -> String {
    let mut out = String::new();

    out.push_str(
        format!(
            "{:<17} {:<17} {:<7} {:>5} {:>10}",
            "UTC hour", "Local hour", "Offset", "n", "kWh"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(&format!("{:-<17} {:-<17} {:-<7} {:->5} {:->10}\n", "", "", "", "", ""));

    for b in buckets {
        out.push_str(&format!(
            "{:<17} {:<17} {:<7} {:>5} {:>10.3}\n",
            b.hour.format("%Y-%m-%d %H:%M").to_string(),
            b.local.format("%Y-%m-%d %H:%M").to_string(),
            fmt_offset(b.offset),
            b.count,
            b.total_kwh
        ));
    }

    let count: usize = buckets.iter().map(|b| b.count).sum();
    let total: f64 = buckets.iter().map(|b| b.total_kwh).sum();
    out.push_str(&format!("Total: {} hours, {count} records, {total:.3} kWh\n", buckets.len()));

    out
}

/// DST transition days of `year`.
pub fn format_calendar(rule_name: &str, year: i32, transitions: &[TransitionInfo]) -> String {
    let mut out = format!("DST transitions for {rule_name} in {year}:\n");
    if transitions.is_empty() {
        out.push_str("  (none)\n");
        return out;
    }

    for t in transitions {
        let hour = match t.affected_hour() {
            Some((start, end)) => format!("{}-{}", start.format("%H:%M"), end.format("%H:%M")),
            None => "-".to_string(),
        };
        let effect = match t.kind {
            TransitionKind::Gain => "repeated",
            TransitionKind::Loss => "skipped",
            TransitionKind::None => "",
        };
        out.push_str(
            format!(
                "  {}  {:<22} {} {:<8} {} -> {}  {}h day",
                t.date,
                t.kind.label(),
                hour,
                effect,
                fmt_offset(t.offset_before),
                fmt_offset(t.offset_after),
                t.hours_in_day()
            )
            .trim_end(),
        );
        out.push('\n');
    }

    out
}

fn fmt_offset(offset: Duration) -> String {
    let minutes = offset.num_minutes();
    let sign = if minutes < 0 { '-' } else { '+' };
    let minutes = minutes.abs();
    format!("{sign}{:02}:{:02}", minutes / 60, minutes % 60)
}
