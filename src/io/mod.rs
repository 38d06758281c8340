//! Local and storage-side I/O.
//!
//! - refresh-token file (`token`)
//! - InfluxDB record store (`influx`)
//! - raw response dumps (`dump`)

pub mod dump;
pub mod influx;
pub mod token;

pub use dump::*;
pub use influx::*;
pub use token::*;
