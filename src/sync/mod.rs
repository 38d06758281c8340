//! The sync core.
//!
//! Responsibilities:
//!
//! - plan the fetch window (`window`)
//! - fetch with resolution fallback (`resolution`)
//! - turn raw local-time samples into UTC records (`normalizer`)

pub mod normalizer;
pub mod resolution;
pub mod window;

pub use normalizer::*;
pub use resolution::*;
pub use window::*;
