//! Command-line parsing for the WattiVahti to InfluxDB sync.
//!
//! Argument parsing stays here; dispatch lives in `app`.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::domain::Resolution;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "wattivahti-sync",
    version,
    about = "Sync WattiVahti electricity consumption into InfluxDB"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch new readings and write them to InfluxDB (default).
    ///
    /// Without `--start-date` the run resumes from the newest stored record.
    Sync(SyncArgs),
    /// Fetch and normalize a window without writing, printing a per-hour breakdown.
    Inspect(InspectArgs),
    /// Print the DST transition days of a year.
    Calendar(CalendarArgs),
}

#[derive(Debug, Parser, Clone, Default)]
pub struct SyncArgs {
    /// Window start: YYYY-MM-DD (local midnight), local YYYY-MM-DDTHH:MM[:SS] or RFC 3339.
    #[arg(long)]
    pub start_date: Option<String>,

    /// Window end (same formats); defaults to now.
    #[arg(long, requires = "start_date")]
    pub end_date: Option<String>,

    /// Fetch and normalize, but do not write.
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Debug, Parser, Clone)]
pub struct InspectArgs {
    /// Window start (same formats as `sync`).
    #[arg(long)]
    pub start_date: String,

    /// Window end; defaults to the start plus one local day.
    #[arg(long)]
    pub end_date: Option<String>,

    /// Fetch only this resolution instead of PT15MIN with PT1H fallback.
    #[arg(long, value_enum)]
    pub resolution: Option<Resolution>,

    /// Also write the raw API response to this file.
    #[arg(long, value_name = "JSON")]
    pub dump_raw: Option<PathBuf>,
}

#[derive(Debug, Parser, Clone)]
pub struct CalendarArgs {
    /// Year to list; defaults to the current year.
    #[arg(long)]
    pub year: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_flags_parse() {
        let cli = Cli::parse_from(["wattivahti-sync", "sync", "--start-date", "2025-10-26", "--dry-run"]);
        let Command::Sync(args) = cli.command else {
            panic!("expected sync");
        };
        assert_eq!(args.start_date.as_deref(), Some("2025-10-26"));
        assert!(args.end_date.is_none());
        assert!(args.dry_run);
    }

    #[test]
    fn end_date_requires_start_date() {
        assert!(Cli::try_parse_from(["wattivahti-sync", "sync", "--end-date", "2025-10-27"]).is_err());
    }

    #[test]
    fn inspect_takes_resolution_by_short_name() {
        let cli = Cli::parse_from([
            "wattivahti-sync",
            "inspect",
            "--start-date",
            "2025-10-26",
            "--resolution",
            "pt1h",
        ]);
        let Command::Inspect(args) = cli.command else {
            panic!("expected inspect");
        };
        assert_eq!(args.resolution, Some(Resolution::Pt1H));
        assert!(Cli::try_parse_from(["wattivahti-sync", "inspect"]).is_err());
    }

    #[test]
    fn calendar_year_is_optional() {
        let cli = Cli::parse_from(["wattivahti-sync", "calendar", "--year", "2026"]);
        let Command::Calendar(args) = cli.command else {
            panic!("expected calendar");
        };
        assert_eq!(args.year, Some(2026));
    }
}
