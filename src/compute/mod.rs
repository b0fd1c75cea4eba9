//! Compute module - Track building and compression for animation curves.

mod driver;
mod precision;
mod quantize;
mod track;

pub use driver::*;
pub use precision::*;
pub use quantize::*;
pub use track::*;
