//! Timezone handling for the single supported metering timezone.
//!
//! - the hard-coded DST rule (`rule`)
//! - per-date transition classification (`calendar`)
//! - local reading -> UTC resolution (`resolver`)

pub mod calendar;
pub mod resolver;
pub mod rule;

pub use calendar::*;
pub use resolver::*;
pub use rule::*;
