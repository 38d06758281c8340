//! Seams between the sync core and its I/O collaborators.
//!
//! The production implementations live in `data::wattivahti` (source) and
//! `io::influx` (store); tests drive the pipeline with in-memory fakes.

use chrono::{DateTime, Utc};

use crate::domain::{NormalizedRecord, RawSample, Resolution, SyncWindow};
use crate::error::AppError;

/// Upstream metering data.
pub trait ConsumptionSource {
    /// Fetch readings for `window` at `resolution`.
    ///
    /// An empty vector means "no data at this resolution", not a failure.
    fn fetch(&self, window: &SyncWindow, resolution: Resolution) -> Result<Vec<RawSample>, AppError>;
}

/// Time-series storage for normalized records.
pub trait RecordStore {
    /// Most recent persisted instant, or `None` for an empty store.
    fn latest_instant(&self) -> Result<Option<DateTime<Utc>>, AppError>;

    /// Persist `records`, returning how many were sent.
    ///
    /// Re-writing an identical `(instant, value)` must be harmless: the
    /// incremental window always overlaps the previous run.
    fn write(&self, records: &[NormalizedRecord]) -> Result<usize, AppError>;
}
