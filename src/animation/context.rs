//! Decompression context for sampling compressed curves at arbitrary times.

use std::collections::BTreeMap;

use crate::compute::{FormatError, TrackDescriptor, TracksView};
use crate::schema::IndexedCurveName;

/// How a seek time between two samples is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SampleRoundingPolicy {
    /// Interpolate linearly between the surrounding samples.
    #[default]
    None,
    /// Use the sample at or before the seek time.
    Floor,
    /// Use the sample at or after the seek time.
    Ceil,
    /// Use the closest sample.
    Nearest,
}

/// Read-only cursor over a compressed track buffer.
///
/// Usage:
/// ```ignore
/// let mut context = DecompressionContext::from_bytes(&curves.compressed_bytes)?;
/// context.seek(0.5, SampleRoundingPolicy::None);
/// context.decompress_tracks(|output_index, value| weights[output_index as usize] = value);
/// ```
#[derive(Debug, Clone)]
pub struct DecompressionContext<'a> {
    tracks: TracksView<'a>,
    key0: usize,
    key1: usize,
    alpha: f32,
}

impl<'a> DecompressionContext<'a> {
    /// Bind a context to parsed tracks, positioned at time zero.
    pub fn new(tracks: TracksView<'a>) -> Self {
        Self {
            tracks,
            key0: 0,
            key1: 0,
            alpha: 0.0,
        }
    }

    /// Parse `bytes` and bind a context to them. Trailing bytes are ignored.
    ///
    /// Descriptors are checked against the bitstream; the hash is not.
    pub fn from_bytes(bytes: &'a [u8]) -> Result<Self, FormatError> {
        let tracks = TracksView::parse(bytes)?;
        tracks.is_valid(false)?;
        Ok(Self::new(tracks))
    }

    pub fn num_tracks(&self) -> usize {
        self.tracks.num_tracks()
    }

    /// Duration covered by the compressed samples.
    pub fn duration(&self) -> f32 {
        self.tracks.duration()
    }

    /// Position the context at `time` seconds, clamped to the compressed range.
    ///
    /// Seeks are independent; the previous position does not matter.
    pub fn seek(&mut self, time: f32, rounding: SampleRoundingPolicy) {
        let num_samples = self.tracks.num_samples();
        if num_samples <= 1 {
            self.key0 = 0;
            self.key1 = 0;
            self.alpha = 0.0;
            return;
        }

        let last = num_samples - 1;
        let time = if time > 0.0 {
            time.min(self.duration())
        } else {
            0.0
        };
        let position = time * self.tracks.sample_rate();
        let key0 = (position.floor() as usize).min(last);
        let key1 = (key0 + 1).min(last);
        let alpha = if key0 == key1 {
            0.0
        } else {
            (position - key0 as f32).clamp(0.0, 1.0)
        };

        self.key0 = key0;
        self.key1 = key1;
        self.alpha = match rounding {
            SampleRoundingPolicy::None => alpha,
            SampleRoundingPolicy::Floor => 0.0,
            SampleRoundingPolicy::Ceil if alpha > 0.0 => 1.0,
            SampleRoundingPolicy::Ceil => 0.0,
            SampleRoundingPolicy::Nearest => alpha.round(),
        };
    }

    /// Value of `track` at the current position; 0.0 when out of range.
    #[inline]
    pub fn decompress_track(&self, track: usize) -> f32 {
        match self.tracks.descriptor(track) {
            Some(desc) => self.interpolate(&desc),
            None => 0.0,
        }
    }

    fn interpolate(&self, desc: &TrackDescriptor) -> f32 {
        let v0 = self.tracks.sample_with(desc, self.key0);
        if self.alpha <= 0.0 {
            return v0;
        }
        let v1 = self.tracks.sample_with(desc, self.key1);
        if self.alpha >= 1.0 {
            return v1;
        }
        v0 + (v1 - v0) * self.alpha
    }

    /// Decompress every track, handing `(output_index, value)` to `writer`.
    pub fn decompress_tracks<F>(&self, mut writer: F)
    where
        F: FnMut(u32, f32),
    {
        for desc in self.tracks.descriptors() {
            writer(desc.output_index, self.interpolate(&desc));
        }
    }
}

/// Sample every named curve at `time`, sorted by name.
pub fn decompress_all(
    bytes: &[u8],
    indexed_curve_names: &[IndexedCurveName],
    time: f32,
) -> BTreeMap<String, f32> {
    decompress_all_filtered(bytes, indexed_curve_names, time, |_| true)
}

/// Like [`decompress_all`], keeping only curves accepted by `filter`.
pub fn decompress_all_filtered<F>(
    bytes: &[u8],
    indexed_curve_names: &[IndexedCurveName],
    time: f32,
    filter: F,
) -> BTreeMap<String, f32>
where
    F: Fn(&str) -> bool,
{
    let mut result = BTreeMap::new();
    if indexed_curve_names.is_empty() {
        return result;
    }

    let mut values = Vec::new();
    match DecompressionContext::from_bytes(bytes) {
        Ok(mut context) => {
            context.seek(time, SampleRoundingPolicy::None);
            values.resize(context.num_tracks(), 0.0f32);
            context.decompress_tracks(|output_index, value| {
                if let Some(slot) = values.get_mut(output_index as usize) {
                    *slot = value;
                }
            });
        }
        Err(err) => {
            // Buffers are validated on load; reaching this is a caller bug.
            debug_assert!(false, "Decompressing invalid curve data: {err}");
            log::error!("Decompressing invalid curve data: {err}");
        }
    }

    for name in indexed_curve_names {
        if !filter(&name.curve_name) {
            continue;
        }
        let value = values
            .get(name.curve_index as usize)
            .copied()
            .unwrap_or(0.0);
        result.insert(name.curve_name.clone(), value);
    }
    result
}

/// Sample a single curve at `time`; 0.0 when the curve is not present.
pub fn decompress_one(
    bytes: &[u8],
    indexed_curve_names: &[IndexedCurveName],
    curve_name: &str,
    time: f32,
) -> f32 {
    let Some(name) = indexed_curve_names
        .iter()
        .find(|n| n.curve_name == curve_name)
    else {
        return 0.0;
    };

    match DecompressionContext::from_bytes(bytes) {
        Ok(mut context) => {
            let track = name.curve_index as usize;
            context.seek(time, SampleRoundingPolicy::None);
            context.decompress_track(track)
        }
        Err(err) => {
            debug_assert!(false, "Decompressing invalid curve data: {err}");
            log::error!("Decompressing invalid curve data: {err}");
            0.0
        }
    }
}
