//! The sync run shared by the `sync` and `inspect` commands.
//!
//! plan window -> fetch (with resolution fallback) -> normalize -> write
//!
//! Everything here is generic over `ConsumptionSource` / `RecordStore` and
//! takes `now` explicitly, so the whole run is testable with in-memory fakes.

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::domain::{DataWarning, NormalizedRecord, Resolution, SyncWindow};
use crate::error::AppError;
use crate::sync::{WindowPlanner, fetch_with_fallback, normalize};
use crate::time::calendar::TransitionCalendar;
use crate::traits::{ConsumptionSource, RecordStore};

/// Where the fetch window comes from.
#[derive(Debug, Clone, Copy)]
pub enum SyncMode {
    /// Resume from the newest persisted record.
    Incremental(WindowPlanner),
    /// Explicit `[start, end)`.
    Manual(SyncWindow),
}

#[derive(Debug, Clone, Copy)]
pub struct SyncOptions {
    pub preferred: Resolution,
    pub fallback: Resolution,
    /// Fetch and normalize, but skip the write.
    pub dry_run: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            preferred: Resolution::Pt15Min,
            fallback: Resolution::Pt1H,
            dry_run: false,
        }
    }
}

/// Everything a finished run produced.
#[derive(Debug, Clone)]
pub struct SyncOutcome {
    pub window: SyncWindow,
    /// Newest persisted instant before this run (incremental mode only).
    pub previous_latest: Option<DateTime<Utc>>,
    /// Resolution the records were fetched at; `None` when nothing was fetched.
    pub resolution: Option<Resolution>,
    pub attempts: usize,
    pub fetched: usize,
    pub records: Vec<NormalizedRecord>,
    pub warnings: Vec<DataWarning>,
    pub dropped: usize,
    pub written: usize,
    pub dry_run: bool,
}

impl SyncOutcome {
    fn skipped(window: SyncWindow, previous_latest: Option<DateTime<Utc>>, dry_run: bool) -> Self {
        Self {
            window,
            previous_latest,
            resolution: None,
            attempts: 0,
            fetched: 0,
            records: Vec::new(),
            warnings: Vec::new(),
            dropped: 0,
            written: 0,
            dry_run,
        }
    }
}

/// Run one sync.
pub fn run_sync<S, R>(
    source: &S,
    store: &R,
    calendar: &TransitionCalendar,
    mode: SyncMode,
    options: SyncOptions,
    now: DateTime<Utc>,
) -> Result<SyncOutcome, AppError>
where
    S: ConsumptionSource + ?Sized,
    R: RecordStore + ?Sized,
{
    let (window, previous_latest) = match mode {
        SyncMode::Incremental(planner) => {
            let latest = match store.latest_instant() {
                Ok(latest) => latest,
                Err(e) => {
                    warn!("Could not query latest timestamp, treating as no data: {e}");
                    None
                }
            };
            (planner.plan(latest, now), latest)
        }
        SyncMode::Manual(window) => {
            info!(
                "Manual sync from {} to {}",
                window.start.to_rfc3339(),
                window.end.to_rfc3339()
            );
            (window, None)
        }
    };

    if window.is_empty() {
        warn!(
            "Nothing to fetch: window start {} is not before {}",
            window.start.to_rfc3339(),
            window.end.to_rfc3339()
        );
        return Ok(SyncOutcome::skipped(window, previous_latest, options.dry_run));
    }

    let fetched = fetch_with_fallback(source, &window, options.preferred, options.fallback)?;
    let fetched_count = fetched.samples.len();
    let norm = normalize(calendar, &fetched.samples, fetched.resolution, Some(&window));

    let written = if options.dry_run {
        info!("Dry run: skipping write of {} records", norm.records.len());
        0
    } else if norm.records.is_empty() {
        info!("No records to write");
        0
    } else {
        store.write(&norm.records)?
    };

    Ok(SyncOutcome {
        window,
        previous_latest,
        resolution: Some(fetched.resolution),
        attempts: fetched.attempts,
        fetched: fetched_count,
        records: norm.records,
        warnings: norm.warnings,
        dropped: norm.dropped,
        written,
        dry_run: options.dry_run,
    })
}

/// Fetch and normalize a manual window without touching storage.
pub fn run_inspect<S>(
    source: &S,
    calendar: &TransitionCalendar,
    window: SyncWindow,
    options: SyncOptions,
) -> Result<SyncOutcome, AppError>
where
    S: ConsumptionSource + ?Sized,
{
    run_sync(
        source,
        &NoStore,
        calendar,
        SyncMode::Manual(window),
        SyncOptions {
            dry_run: true,
            ..options
        },
        window.end,
    )
}

/// Store stand-in for read-only runs.
struct NoStore;

impl RecordStore for NoStore {
    fn latest_instant(&self) -> Result<Option<DateTime<Utc>>, AppError> {
        Ok(None)
    }

    fn write(&self, _records: &[NormalizedRecord]) -> Result<usize, AppError> {
        Ok(0)
    }
}
