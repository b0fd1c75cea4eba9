//! Packages compressor output into persisted bytes.

use super::format::sentinel_bytes;
use crate::compute::{CompressedTracks, DriverOutput};

/// Turn compressor output into persisted bytes.
///
/// Takes ownership of `compressed`; the returned bytes are the only copy of the payload.
/// When `did_fallback` is set the error sentinel is appended right after the payload.
pub fn package(compressed: CompressedTracks, did_fallback: bool) -> Vec<u8> {
    let mut bytes = compressed.into_bytes();
    if did_fallback {
        bytes.extend_from_slice(&sentinel_bytes());
    }
    bytes
}

/// Package a driver result; nothing compressed gives no bytes.
pub fn package_output(output: DriverOutput) -> Vec<u8> {
    match output.compressed {
        Some(compressed) => package(compressed, output.did_fallback),
        None => Vec::new(),
    }
}
