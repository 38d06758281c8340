//! Top-level application orchestration.
//!
//! `src/main.rs` stays tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - loads configuration and exchanges the refresh token
//! - runs the sync pipeline against WattiVahti and InfluxDB
//! - prints summaries

use chrono::{DateTime, Datelike, Duration, Utc};
use clap::Parser;
use tracing::info;

use crate::cli::{CalendarArgs, Command, InspectArgs, SyncArgs};
use crate::config::SyncConfig;
use crate::data::{B2cClient, WattiVahtiClient};
use crate::domain::LocalReading;
use crate::error::AppError;
use crate::io::{InfluxStore, read_refresh_token, remediation, save_refresh_token, write_raw_json};
use crate::sync::{WindowPlanner, manual_window, parse_bound};
use crate::time::calendar::TransitionCalendar;
use crate::time::resolver::{resolve, to_local};

pub mod pipeline;

use pipeline::{SyncMode, SyncOptions};

/// Entry point for the `wattivahti-sync` binary.
pub fn run() -> Result<(), AppError> {
    // `wattivahti-sync` and `wattivahti-sync --dry-run` behave like `... sync`.
    let argv = rewrite_args(std::env::args().collect());
    let cli = crate::cli::Cli::parse_from(argv);

    match cli.command {
        Command::Sync(args) => handle_sync(args),
        Command::Inspect(args) => handle_inspect(args),
        Command::Calendar(args) => handle_calendar(args),
    }
}

fn handle_sync(args: SyncArgs) -> Result<(), AppError> {
    let config = SyncConfig::from_env()?;
    let calendar = TransitionCalendar::helsinki();
    let now = Utc::now();

    let mode = match &args.start_date {
        Some(start) => {
            let start = parse_bound(start, &calendar)?;
            let end = match &args.end_date {
                Some(end) => parse_bound(end, &calendar)?,
                None => now,
            };
            SyncMode::Manual(manual_window(start, end)?)
        }
        None => SyncMode::Incremental(WindowPlanner::from_config(&config)),
    };

    let access_token = authenticate(&config)?;
    let source = WattiVahtiClient::new(&config.api_base, &config.metering_point, access_token, *calendar.rule())?;
    let store = InfluxStore::from_config(&config)?;

    let options = SyncOptions {
        dry_run: args.dry_run,
        ..SyncOptions::default()
    };
    let outcome = pipeline::run_sync(&source, &store, &calendar, mode, options, now)?;

    println!("{}", crate::report::format_sync_summary(&outcome));
    Ok(())
}

fn handle_inspect(args: InspectArgs) -> Result<(), AppError> {
    let config = SyncConfig::from_env()?;
    let calendar = TransitionCalendar::helsinki();

    let start = parse_bound(&args.start_date, &calendar)?;
    let end = match &args.end_date {
        Some(end) => parse_bound(end, &calendar)?,
        None => next_local_day(&calendar, start),
    };
    let window = manual_window(start, end)?;

    let options = match args.resolution {
        Some(res) => SyncOptions {
            preferred: res,
            fallback: res,
            dry_run: true,
        },
        None => SyncOptions::default(),
    };

    let access_token = authenticate(&config)?;
    let source = WattiVahtiClient::new(&config.api_base, &config.metering_point, access_token, *calendar.rule())?;
    let outcome = pipeline::run_inspect(&source, &calendar, window, options)?;

    if let Some(path) = &args.dump_raw {
        match source.take_last_response() {
            Some(raw) => {
                write_raw_json(path, &raw)?;
                info!("Wrote raw response to {}", path.display());
            }
            None => info!("No response to dump"),
        }
    }

    println!("{}", crate::report::format_sync_summary(&outcome));
    let buckets = crate::report::hourly_breakdown(&outcome.records, &calendar);
    println!("{}", crate::report::format_hourly(&buckets));
    Ok(())
}

fn handle_calendar(args: CalendarArgs) -> Result<(), AppError> {
    let calendar = TransitionCalendar::helsinki();
    let year = args
        .year
        .unwrap_or_else(|| calendar.rule().to_local(Utc::now()).year());

    println!(
        "{}",
        crate::report::format_calendar(calendar.rule().name, year, &calendar.transitions(year))
    );
    Ok(())
}

/// Exchange the stored refresh token for an access token, persisting any rotation.
fn authenticate(config: &SyncConfig) -> Result<String, AppError> {
    let path = &config.refresh_token_file;
    let refresh_token = read_refresh_token(path)?;

    let tokens = B2cClient::new()?
        .refresh(&refresh_token)
        .map_err(|e| AppError::new(e.exit_code(), format!("{}\n{}", e.message(), remediation(path))))?;

    if let Some(rotated) = tokens.rotated_from(&refresh_token) {
        save_refresh_token(path, rotated)?;
    }
    Ok(tokens.access_token)
}

/// Same local clock reading one calendar day later (23 to 25 hours away).
fn next_local_day(calendar: &TransitionCalendar, start: DateTime<Utc>) -> DateTime<Utc> {
    let (local, _) = to_local(calendar, start);
    resolve(calendar, LocalReading::unambiguous(local + Duration::days(1)))
        .unwrap_or(start + Duration::days(1))
}

/// Rewrite argv so `wattivahti-sync` defaults to `wattivahti-sync sync`.
///
/// Rules:
/// - `wattivahti-sync`                     -> `wattivahti-sync sync`
/// - `wattivahti-sync --dry-run ...`       -> `wattivahti-sync sync --dry-run ...`
/// - `wattivahti-sync --help/--version/-h` -> unchanged
fn rewrite_args(mut argv: Vec<String>) -> Vec<String> {
    let Some(arg1) = argv.get(1).cloned() else {
        argv.push("sync".to_string());
        return argv;
    };

    let is_top_level_help_or_version = matches!(
        arg1.as_str(),
        "-h" | "--help" | "-V" | "--version" | "help"
    );
    if is_top_level_help_or_version {
        return argv;
    }

    let is_subcommand = matches!(arg1.as_str(), "sync" | "inspect" | "calendar");
    if is_subcommand {
        return argv;
    }

    if arg1.starts_with('-') {
        argv.insert(1, "sync".to_string());
        return argv;
    }

    argv
}
