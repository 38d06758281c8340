//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - sampling resolutions (`Resolution`)
//! - raw and normalized readings (`RawSample`, `NormalizedRecord`)
//! - DST classification and local readings (`TransitionInfo`, `LocalReading`)
//! - the fetch window (`SyncWindow`)

pub mod types;

pub use types::*;
