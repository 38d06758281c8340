//! `wattivahti-sync` library crate.
//!
//! Pulls electricity consumption from the WattiVahti metering API and writes
//! it to InfluxDB with correct UTC instants across DST transitions.
//!
//! The binary is a thin wrapper around this library so the sync core is
//! testable without network access or spawning processes.

pub mod app;
pub mod cli;
pub mod config;
pub mod data;
pub mod domain;
pub mod error;
pub mod io;
pub mod report;
pub mod sync;
pub mod time;
pub mod traits;
