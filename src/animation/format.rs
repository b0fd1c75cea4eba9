//! Persisted layout of compressed curve data.

use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::schema::IndexedCurveName;

/// Appended after the compressed payload when the identity stubs were used.
pub const ERROR_SENTINEL: u32 = 0xFAFA_CDCD;

/// Size of the error sentinel in bytes.
pub const SENTINEL_SIZE: usize = 4;

/// Little-endian bytes of [`ERROR_SENTINEL`].
pub fn sentinel_bytes() -> [u8; SENTINEL_SIZE] {
    ERROR_SENTINEL.to_le_bytes()
}

/// True when the four bytes right after `compressed_size` hold the error sentinel.
pub fn has_error_sentinel(bytes: &[u8], compressed_size: usize) -> bool {
    compressed_size
        .checked_add(SENTINEL_SIZE)
        .and_then(|end| bytes.get(compressed_size..end))
        .is_some_and(|tail| tail == sentinel_bytes().as_slice())
}

/// Compressed curves as persisted alongside an animation sequence.
///
/// `compressed_bytes` holds `[payload][optional sentinel]`; it is empty when the sequence
/// has no curves.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompressedCurves {
    pub compressed_bytes: Vec<u8>,
    pub indexed_curve_names: Vec<IndexedCurveName>,
    /// Length in seconds of the source sequence.
    pub sequence_length: f32,
    /// Identity stubs were compressed in place of the real curves.
    #[serde(default)]
    pub did_fallback: bool,
}

impl CompressedCurves {
    pub fn is_empty(&self) -> bool {
        self.indexed_curve_names.is_empty()
    }

    pub fn num_curves(&self) -> usize {
        self.indexed_curve_names.len()
    }

    /// Write as JSON.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), CodecIoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Read JSON written by [`CompressedCurves::save`].
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, CodecIoError> {
        let json = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

/// Errors raised while saving or loading compressed curves.
#[derive(Debug, thiserror::Error)]
pub enum CodecIoError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_sentinel_byte_order() {
        assert_eq!(sentinel_bytes(), [0xCD, 0xCD, 0xFA, 0xFA]);
    }

    #[test]
    fn test_has_error_sentinel() {
        let mut bytes = vec![0u8; 16];
        assert!(!has_error_sentinel(&bytes, 16));

        bytes.extend_from_slice(&sentinel_bytes());
        assert!(has_error_sentinel(&bytes, 16));
        assert!(!has_error_sentinel(&bytes, 12));
        assert!(!has_error_sentinel(&bytes, 17));
        assert!(!has_error_sentinel(&bytes, usize::MAX));
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("curves.json");

        let curves = CompressedCurves {
            compressed_bytes: vec![1, 2, 3, 4],
            indexed_curve_names: vec![IndexedCurveName {
                curve_name: "jaw_open".to_string(),
                curve_index: 0,
            }],
            sequence_length: 1.5,
            did_fallback: true,
        };
        curves.save(&path).unwrap();

        let loaded = CompressedCurves::load(&path).unwrap();
        assert_eq!(loaded, curves);
        assert_eq!(loaded.num_curves(), 1);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempdir().unwrap();
        let err = CompressedCurves::load(dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(err, CodecIoError::Io(_)));
    }
}
