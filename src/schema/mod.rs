//! Schema module - Configuration and source data for curve compression.

mod config;
mod curve;
mod morph;

pub use config::*;
pub use curve::*;
pub use morph::*;
