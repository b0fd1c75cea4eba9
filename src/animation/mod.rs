//! Packaging, validation and playback of compressed animation curves.
//!
//! # Persisted Layout
//!
//! Compressed curves are stored as the compressor's payload, optionally followed by an
//! error sentinel:
//!
//! ```text
//! Payload (size bytes):
//!   Compressed tracks, see `compute::CompressedTracks`
//!
//! Sentinel (4 bytes, only after a fallback):
//!   0xFAFACDCD, little-endian
//! ```
//!
//! The payload declares its own size, so the sentinel is found by looking right past it.

mod codec;
mod context;
mod format;
mod packager;
mod validate;

pub use codec::{CompressionInput, CompressionStats, CurveCompressionCodec, FORCE_REBUILD_VERSION};
pub use context::{
    DecompressionContext, SampleRoundingPolicy, decompress_all, decompress_all_filtered,
    decompress_one,
};
pub use format::{
    CodecIoError, CompressedCurves, ERROR_SENTINEL, SENTINEL_SIZE, has_error_sentinel,
    sentinel_bytes,
};
pub use packager::{package, package_output};
pub use validate::{ValidationError, check, validate};
