//! Fixed-rate scalar tracks built from continuous curves.

use crate::schema::{AnimationCurve, CurveEvaluator};

#[cfg(not(target_arch = "wasm32"))]
use rayon::prelude::*;

/// Sample rate used for static poses and identity stubs.
pub const DEFAULT_SAMPLE_RATE: f32 = 30.0;

/// Sequences shorter than this are treated as a static pose.
pub const MIN_SEQUENCE_LENGTH: f32 = 1e-4;

/// Precision given to identity stubs; any value works since stubs carry no real data.
pub const DEFAULT_TRACK_PRECISION: f32 = 0.0001;

/// Compressor-facing representation of one curve.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    /// Slot written during decompression; equals the curve's position in the input.
    pub output_index: u32,
    /// Maximum reconstruction error allowed, in curve-value units.
    pub precision: f32,
    /// Samples per second.
    pub sample_rate: f32,
    pub samples: Vec<f32>,
}

impl Track {
    /// One neutral sample standing in for a track that failed to compress.
    pub fn identity_stub(output_index: u32) -> Self {
        Self {
            output_index,
            precision: DEFAULT_TRACK_PRECISION,
            sample_rate: DEFAULT_SAMPLE_RATE,
            samples: vec![0.0],
        }
    }

    pub fn num_samples(&self) -> usize {
        self.samples.len()
    }

    /// Track duration in seconds.
    pub fn duration(&self) -> f32 {
        if self.samples.len() <= 1 {
            0.0
        } else {
            (self.samples.len() - 1) as f32 / self.sample_rate
        }
    }
}

/// Sample timing derived from a sequence's length and key count.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleTiming {
    pub sample_rate: f32,
    pub num_samples: u32,
}

impl SampleTiming {
    /// Static poses get exactly one sample at 30 Hz. Non-finite lengths are static too.
    pub fn new(sequence_length: f32, num_samples: u32) -> Self {
        const STATIC: SampleTiming = SampleTiming {
            sample_rate: DEFAULT_SAMPLE_RATE,
            num_samples: 1,
        };

        if num_samples <= 1
            || !sequence_length.is_finite()
            || sequence_length < MIN_SEQUENCE_LENGTH
        {
            return STATIC;
        }

        let sample_rate = (num_samples - 1) as f32 / sequence_length;
        if !sample_rate.is_finite() || sample_rate <= 0.0 {
            return STATIC;
        }
        Self {
            sample_rate,
            num_samples,
        }
    }

    pub fn is_static(&self) -> bool {
        self.num_samples == 1
    }

    /// Time of sample `index`, clamped to the sequence.
    #[inline]
    pub fn sample_time(&self, index: u32, sequence_length: f32) -> f32 {
        if self.is_static() {
            return 0.0;
        }
        (index as f32 / self.sample_rate).clamp(0.0, sequence_length)
    }
}

/// Sample every curve into a [`Track`].
///
/// `precisions` must hold one entry per curve. Curves are evaluated continuously, so any
/// interpolation baked into the keys is captured. An empty input gives no tracks.
pub fn build_tracks(
    curves: &[AnimationCurve],
    precisions: &[f32],
    sequence_length: f32,
    num_samples: u32,
) -> Vec<Track> {
    debug_assert_eq!(curves.len(), precisions.len());
    let timing = SampleTiming::new(sequence_length, num_samples);

    let build = |(index, (curve, &precision)): (usize, (&AnimationCurve, &f32))| Track {
        output_index: index as u32,
        precision,
        sample_rate: timing.sample_rate,
        samples: sample_curve(curve, &timing, sequence_length),
    };

    #[cfg(not(target_arch = "wasm32"))]
    {
        curves
            .par_iter()
            .zip(precisions.par_iter())
            .enumerate()
            .map(build)
            .collect()
    }

    #[cfg(target_arch = "wasm32")]
    {
        curves.iter().zip(precisions.iter()).enumerate().map(build).collect()
    }
}

/// Evaluate one curve at every sample time.
pub fn sample_curve<C: CurveEvaluator + ?Sized>(
    curve: &C,
    timing: &SampleTiming,
    sequence_length: f32,
) -> Vec<f32> {
    (0..timing.num_samples)
        .map(|i| curve.evaluate(timing.sample_time(i, sequence_length)))
        .collect()
}
