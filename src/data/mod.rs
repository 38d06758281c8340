//! Upstream data sources.
//!
//! - B2C refresh-token exchange (`auth`)
//! - WattiVahti consumption API (`wattivahti`)

pub mod auth;
pub mod wattivahti;

pub use auth::*;
pub use wattivahti::*;
