//! Compression driver.
//!
//! Compression must never fail from the caller's point of view. When the real tracks
//! cannot be compressed every track is replaced by an identity stub and compressed again;
//! the caller is told through `did_fallback`.

use super::{CompressedTracks, Track, compress_track_list};
use crate::schema::CompressionSettings;

/// Progress of a single compression call.
///
/// `Idle → Compressing → Success`, or `Compressing → Failed → StubCompressing →
/// StubSucceeded` when the real tracks are rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Idle,
    Compressing,
    Success,
    Failed,
    StubCompressing,
    StubSucceeded,
}

/// Result of [`compress_tracks`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverOutput {
    /// `None` when there was nothing to compress.
    pub compressed: Option<CompressedTracks>,
    /// True when the identity stubs were compressed instead of the real tracks.
    pub did_fallback: bool,
    /// State the driver finished in: `Idle` for empty input, otherwise `Success` or
    /// `StubSucceeded`.
    pub state: DriverState,
}

/// Compress `tracks` as one batch, substituting identity stubs on failure.
///
/// `asset_name` only feeds the error log.
///
/// # Panics
///
/// Panics if the identity stubs themselves fail to compress. Stubs keep the output
/// indices of `tracks`, so this means either a compressor defect or duplicate indices.
pub fn compress_tracks(
    tracks: &[Track],
    settings: &CompressionSettings,
    asset_name: &str,
) -> DriverOutput {
    if tracks.is_empty() {
        log::trace!("{asset_name}: no tracks, staying {:?}", DriverState::Idle);
        return DriverOutput {
            compressed: None,
            did_fallback: false,
            state: DriverState::Idle,
        };
    }

    log::trace!(
        "{asset_name}: {:?} {} tracks",
        DriverState::Compressing,
        tracks.len()
    );

    match compress_track_list(tracks, settings) {
        Ok(compressed) => {
            log::debug!(
                "{asset_name}: {:?}, {} tracks in {} bytes",
                DriverState::Success,
                tracks.len(),
                compressed.size()
            );
            DriverOutput {
                compressed: Some(compressed),
                did_fallback: false,
                state: DriverState::Success,
            }
        }
        Err(err) => {
            match err.track() {
                Some(track) => log::error!(
                    "Failed to compress curves for '{asset_name}' (curve {track}): {err}"
                ),
                None => log::error!("Failed to compress curves for '{asset_name}': {err}"),
            }

            let stubs: Vec<Track> = tracks
                .iter()
                .map(|t| Track::identity_stub(t.output_index))
                .collect();
            log::trace!(
                "{asset_name}: {:?} {} stubs",
                DriverState::StubCompressing,
                stubs.len()
            );

            let compressed = compress_track_list(&stubs, settings).unwrap_or_else(|stub_err| {
                panic!("Identity stubs for '{asset_name}' failed to compress: {stub_err}")
            });
            log::debug!(
                "{asset_name}: {:?}, {} bytes",
                DriverState::StubSucceeded,
                compressed.size()
            );

            DriverOutput {
                compressed: Some(compressed),
                did_fallback: true,
                state: DriverState::StubSucceeded,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(output_index: u32, samples: Vec<f32>) -> Track {
        Track {
            output_index,
            precision: 0.001,
            sample_rate: 30.0,
            samples,
        }
    }

    #[test]
    fn test_empty_input_skips_compression() {
        let out = compress_tracks(&[], &CompressionSettings::default(), "empty");
        assert!(out.compressed.is_none());
        assert!(!out.did_fallback);
        assert_eq!(out.state, DriverState::Idle);
    }

    #[test]
    fn test_success_path() {
        let tracks = vec![track(0, vec![0.0, 0.5, 1.0]), track(1, vec![1.0; 3])];
        let out = compress_tracks(&tracks, &CompressionSettings::default(), "ok");
        assert!(!out.did_fallback);
        assert_eq!(out.state, DriverState::Success);

        let compressed = out.compressed.unwrap();
        let view = compressed.view().unwrap();
        assert_eq!(view.num_tracks(), 2);
        assert_eq!(view.num_samples(), 3);
    }

    #[test]
    fn test_nan_forces_identity_stubs() {
        let tracks = vec![
            track(0, vec![0.25; 4]),
            track(1, vec![0.0, f32::NAN, 1.0, 2.0]),
        ];
        let out = compress_tracks(&tracks, &CompressionSettings::default(), "broken");
        assert!(out.did_fallback);
        assert_eq!(out.state, DriverState::StubSucceeded);

        let compressed = out.compressed.unwrap();
        let view = compressed.view().unwrap();
        view.is_valid(true).unwrap();
        assert_eq!(view.num_tracks(), 2);
        assert_eq!(view.num_samples(), 1);
        assert_eq!(view.sample_rate(), 30.0);
        for i in 0..2 {
            assert_eq!(view.descriptor(i).unwrap().output_index, i as u32);
            assert_eq!(view.sample(i, 0), Some(0.0));
        }
    }

    #[test]
    fn test_mismatched_tracks_fall_back() {
        let tracks = vec![track(0, vec![0.0; 3]), track(1, vec![0.0; 5])];
        let out = compress_tracks(&tracks, &CompressionSettings::default(), "mismatch");
        assert!(out.did_fallback);
    }
}
