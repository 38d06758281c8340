//! Resolution fallback: try fine-grained data first, coarse second.
//!
//! Older meters only report hourly values. Asking them for `PT15MIN` returns
//! an empty series rather than an error, so an empty result at the preferred
//! resolution triggers exactly one retry at the fallback resolution.

use tracing::{info, warn};

use crate::domain::{RawSample, Resolution, SyncWindow};
use crate::error::AppError;
use crate::traits::ConsumptionSource;

/// Samples plus the resolution they were fetched at.
#[derive(Debug, Clone)]
pub struct Fetched {
    pub samples: Vec<RawSample>,
    pub resolution: Resolution,
    /// Upstream calls made (1 or 2).
    pub attempts: usize,
}

/// Fetch `window` at `preferred`, retrying once at `fallback` on an empty result.
///
/// Errors are returned as-is; they never trigger the fallback.
pub fn fetch_with_fallback<S: ConsumptionSource + ?Sized>(
    source: &S,
    window: &SyncWindow,
    preferred: Resolution,
    fallback: Resolution,
) -> Result<Fetched, AppError> {
    info!("Fetching with resolution {preferred}");
    let samples = source.fetch(window, preferred)?;
    if !samples.is_empty() {
        info!("Fetched {} samples with {preferred} resolution", samples.len());
        return Ok(Fetched {
            samples,
            resolution: preferred,
            attempts: 1,
        });
    }

    if fallback == preferred {
        warn!("No data returned with {preferred} resolution");
        return Ok(Fetched {
            samples,
            resolution: fallback,
            attempts: 1,
        });
    }

    info!("No data with {preferred}, trying {fallback} resolution");
    let samples = source.fetch(window, fallback)?;
    if samples.is_empty() {
        warn!("No data returned with either {preferred} or {fallback} resolution");
    } else {
        info!("Fetched {} samples with {fallback} resolution", samples.len());
    }

    Ok(Fetched {
        samples,
        resolution: fallback,
        attempts: 2,
    })
}
