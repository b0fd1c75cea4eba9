//! Validation of persisted compressed curves.

use super::format::has_error_sentinel;
use crate::compute::{FormatError, TracksView};

/// Why a persisted buffer failed validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Compressed curve data is corrupt: {0}")]
    Format(#[from] FormatError),
    /// The buffer decompresses safely but holds identity stubs, not the real curves.
    #[error("Compressed curve data was produced by the identity fallback")]
    FallbackSentinel,
}

/// Check a persisted buffer, returning the reason it is unusable.
pub fn check(bytes: &[u8], expected_curve_count: usize) -> Result<(), ValidationError> {
    if expected_curve_count == 0 {
        return Ok(());
    }

    let view = TracksView::parse(bytes)?;
    view.is_valid(true)?;

    if has_error_sentinel(bytes, view.size()) {
        return Err(ValidationError::FallbackSentinel);
    }
    Ok(())
}

/// Validation gate used by cook/build steps.
///
/// Returns false and logs an error when the buffer is corrupt or carries the fallback
/// sentinel. Fallback data is still safe to decompress; callers decide whether to fail.
pub fn validate(bytes: &[u8], expected_curve_count: usize, asset_name: &str) -> bool {
    match check(bytes, expected_curve_count) {
        Ok(()) => true,
        Err(err) => {
            log::error!("Invalid compressed curve data for '{asset_name}': {err}");
            false
        }
    }
}
