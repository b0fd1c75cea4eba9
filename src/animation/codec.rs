//! Curve compression codec tying the write and read paths together.

use std::collections::BTreeMap;
use std::fmt;

use super::context::{decompress_all, decompress_one};
use super::format::CompressedCurves;
use super::packager::package_output;
use super::validate::validate;
use crate::compute::{FORMAT_VERSION, build_tracks, compress_tracks, derive_precisions, fnv1a};
use crate::schema::{AnimationCurve, CodecSettings, IndexedCurveName, MorphTargetSet};

/// Bump to invalidate every cached compressed buffer.
pub const FORCE_REBUILD_VERSION: u32 = 3;

/// Everything needed to compress the curves of one animation sequence.
#[derive(Debug, Clone, Copy)]
pub struct CompressionInput<'a> {
    /// Identity of the owning asset, used in log messages.
    pub asset_name: &'a str,
    pub curves: &'a [AnimationCurve],
    /// Sequence length in seconds.
    pub sequence_length: f32,
    /// Number of sampled keys in the sequence.
    pub num_samples: u32,
    /// Mesh supplying morph target deltas for adaptive precision.
    pub morph_targets: Option<&'a MorphTargetSet>,
}

/// Scalar curve codec.
///
/// Usage:
/// ```ignore
/// let codec = CurveCompressionCodec::new(CodecSettings::default());
/// let compressed = codec.compress(&input);
/// assert!(codec.validate(&compressed, "face_anim"));
/// let weight = codec.decompress_one(&compressed, "jaw_open", 0.5);
/// ```
#[derive(Debug, Clone, Default)]
pub struct CurveCompressionCodec {
    settings: CodecSettings,
}

impl CurveCompressionCodec {
    pub fn new(settings: CodecSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &CodecSettings {
        &self.settings
    }

    /// Compress every curve of a sequence. Never fails; see [`CompressedCurves::did_fallback`].
    pub fn compress(&self, input: &CompressionInput<'_>) -> CompressedCurves {
        let indexed_curve_names = IndexedCurveName::from_curves(input.curves);
        if input.curves.is_empty() {
            return CompressedCurves {
                compressed_bytes: Vec::new(),
                indexed_curve_names,
                sequence_length: input.sequence_length,
                did_fallback: false,
            };
        }

        let precisions = derive_precisions(input.curves, input.morph_targets, &self.settings);
        let tracks = build_tracks(
            input.curves,
            &precisions,
            input.sequence_length,
            input.num_samples,
        );
        let output = compress_tracks(&tracks, &self.settings.compression, input.asset_name);
        let did_fallback = output.did_fallback;

        CompressedCurves {
            compressed_bytes: package_output(output),
            indexed_curve_names,
            sequence_length: input.sequence_length,
            did_fallback,
        }
    }

    /// Validation gate for persisted curves.
    pub fn validate(&self, curves: &CompressedCurves, asset_name: &str) -> bool {
        validate(&curves.compressed_bytes, curves.num_curves(), asset_name)
    }

    /// Every curve's value at `time`, sorted by name.
    pub fn decompress_all(&self, curves: &CompressedCurves, time: f32) -> BTreeMap<String, f32> {
        decompress_all(&curves.compressed_bytes, &curves.indexed_curve_names, time)
    }

    /// One curve's value at `time`; 0.0 when the curve is not present.
    pub fn decompress_one(&self, curves: &CompressedCurves, curve_name: &str, time: f32) -> f32 {
        decompress_one(
            &curves.compressed_bytes,
            &curves.indexed_curve_names,
            curve_name,
            time,
        )
    }

    /// Key identifying compressed data produced with these settings.
    ///
    /// Changes whenever the precisions, the morph target structure, the compressor format
    /// or the compressor settings change.
    pub fn cache_key(&self, morph_targets: Option<&MorphTargetSet>) -> String {
        let morph_hash = morph_targets
            .and_then(|m| m.structure_guid.as_deref())
            .map(|guid| fnv1a(guid.as_bytes()))
            .unwrap_or(0);

        format!(
            "{:08X}_{:08X}_{:08X}_{}_{}_{:08X}",
            self.settings.curve_precision.to_bits(),
            self.settings.morph_target_position_precision.to_bits(),
            morph_hash,
            FORCE_REBUILD_VERSION,
            FORMAT_VERSION,
            self.settings.compression.hash(),
        )
    }

    /// Size statistics for compressed curves.
    pub fn stats(&self, curves: &CompressedCurves, num_samples: u32) -> CompressionStats {
        CompressionStats::new(curves, num_samples)
    }
}

/// Statistics from a compression pass.
#[derive(Debug, Clone, PartialEq)]
pub struct CompressionStats {
    /// Number of curves compressed.
    pub curve_count: usize,
    /// Size of the samples as raw f32 values.
    pub raw_bytes: usize,
    /// Persisted size, sentinel included.
    pub compressed_bytes: usize,
    /// Identity stubs were compressed instead of the real curves.
    pub did_fallback: bool,
}

impl CompressionStats {
    pub fn new(curves: &CompressedCurves, num_samples: u32) -> Self {
        Self {
            curve_count: curves.num_curves(),
            raw_bytes: curves.num_curves() * num_samples.max(1) as usize * 4,
            compressed_bytes: curves.compressed_bytes.len(),
            did_fallback: curves.did_fallback,
        }
    }

    /// Raw size divided by compressed size; 0 when nothing was compressed.
    pub fn ratio(&self) -> f32 {
        if self.compressed_bytes == 0 {
            0.0
        } else {
            self.raw_bytes as f32 / self.compressed_bytes as f32
        }
    }
}

impl fmt::Display for CompressionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} curves, {} bytes raw, {} bytes compressed ({:.2}x){}",
            self.curve_count,
            self.raw_bytes,
            self.compressed_bytes,
            self.ratio(),
            if self.did_fallback { ", FALLBACK" } else { "" }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::format::has_error_sentinel;
    use crate::compute::TracksView;
    use crate::schema::{CurveEvaluator, CurveKey, KeyedCurve, MorphTarget};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn sine_curve(name: &str, length: f32, keys: usize) -> AnimationCurve {
        let curve = KeyedCurve::new(
            (0..keys)
                .map(|i| {
                    let t = length * i as f32 / (keys - 1) as f32;
                    CurveKey::linear(t, (t * std::f32::consts::TAU).sin())
                })
                .collect(),
        );
        AnimationCurve::new(name, curve)
    }

    fn input<'a>(
        curves: &'a [AnimationCurve],
        morph_targets: Option<&'a MorphTargetSet>,
    ) -> CompressionInput<'a> {
        CompressionInput {
            asset_name: "test_sequence",
            curves,
            sequence_length: 1.0,
            num_samples: 31,
            morph_targets,
        }
    }

    #[test]
    fn test_roundtrip_within_precision() {
        let codec = CurveCompressionCodec::default();
        let curves = vec![sine_curve("wave", 1.0, 31)];
        let compressed = codec.compress(&input(&curves, None));

        assert!(!compressed.did_fallback);
        assert!(codec.validate(&compressed, "wave"));

        let precision = codec.settings().curve_precision;
        for i in 0..31 {
            let time = i as f32 / 30.0;
            let expected = curves[0].evaluate(time);
            let actual = codec.decompress_one(&compressed, "wave", time);
            assert!(
                (actual - expected).abs() <= precision + 1e-5,
                "Mismatch at sample {}: {} vs {}",
                i,
                actual,
                expected
            );
        }
    }

    #[test]
    fn test_empty_curves() {
        let codec = CurveCompressionCodec::default();
        let compressed = codec.compress(&input(&[], None));

        assert!(compressed.compressed_bytes.is_empty());
        assert!(!compressed.did_fallback);
        assert!(codec.validate(&compressed, "empty"));
        assert!(codec.decompress_all(&compressed, 0.5).is_empty());
        assert_eq!(codec.decompress_one(&compressed, "anything", 0.5), 0.0);
    }

    #[test]
    fn test_fallback_is_detectable() {
        let codec = CurveCompressionCodec::default();
        let broken = KeyedCurve::new(vec![
            CurveKey::linear(0.0, 0.0),
            CurveKey::linear(1.0, f32::NAN),
        ]);
        let curves = vec![
            sine_curve("wave", 1.0, 31),
            AnimationCurve::new("broken", broken),
        ];
        let compressed = codec.compress(&input(&curves, None));

        assert!(compressed.did_fallback);
        let size = TracksView::parse(&compressed.compressed_bytes)
            .unwrap()
            .size();
        assert_eq!(compressed.compressed_bytes.len(), size + 4);
        assert!(has_error_sentinel(&compressed.compressed_bytes, size));
        assert!(!codec.validate(&compressed, "broken"));

        // Still decompresses, to identity values.
        let values = codec.decompress_all(&compressed, 0.5);
        assert_eq!(values.len(), 2);
        assert!(values.values().all(|&v| v == 0.0));
    }

    #[test]
    fn test_deterministic_and_valid_for_random_curves() {
        let mut rng = StdRng::seed_from_u64(42);
        let curves: Vec<AnimationCurve> = (0..8)
            .map(|c| {
                let keys = (0..10)
                    .map(|k| CurveKey::linear(k as f32 / 9.0, rng.gen_range(-10.0..10.0)))
                    .collect();
                AnimationCurve::new(format!("curve_{c}"), KeyedCurve::new(keys))
            })
            .collect();

        let codec = CurveCompressionCodec::default();
        let a = codec.compress(&input(&curves, None));
        let b = codec.compress(&input(&curves, None));

        assert_eq!(a.compressed_bytes, b.compressed_bytes);
        assert!(!a.did_fallback);
        assert!(codec.validate(&a, "random"));
    }

    #[test]
    fn test_two_curve_scenario() {
        let curves = vec![
            AnimationCurve::new("CurveA", KeyedCurve::constant(0.5)),
            sine_curve("CurveB", 1.0, 31),
        ];
        let mesh = MorphTargetSet {
            structure_guid: Some("mesh-guid".to_string()),
            targets: vec![MorphTarget::new("CurveB", vec![vec![[0.0, 3.0, 0.0]]])],
        };
        let codec = CurveCompressionCodec::default();

        let precisions = derive_precisions(&curves, Some(&mesh), codec.settings());
        assert_eq!(precisions[0], 0.001);
        assert!((precisions[1] - 0.01 / 3.0).abs() < 1e-6);

        let compressed = codec.compress(&input(&curves, Some(&mesh)));
        assert!(!compressed.did_fallback);
        assert!(codec.validate(&compressed, "scenario"));

        for time in [0.0, 0.13, 0.5, 0.99, 1.0] {
            let a = codec.decompress_one(&compressed, "CurveA", time);
            assert!((a - 0.5).abs() <= 0.001);
        }

        // CurveB is held to the tighter morph-derived bound at every sample.
        for i in 0..31 {
            let time = i as f32 / 30.0;
            let expected = curves[1].evaluate(time);
            let actual = codec.decompress_one(&compressed, "CurveB", time);
            assert!(
                (actual - expected).abs() <= 0.01 / 3.0 + 1e-5,
                "CurveB mismatch at sample {}: {} vs {}",
                i,
                actual,
                expected
            );
        }
        assert_eq!(codec.decompress_one(&compressed, "CurveC", 0.5), 0.0);
    }

    #[test]
    fn test_infinite_sequence_length_compresses_static_pose() {
        let curves = vec![sine_curve("wave", 1.0, 31), sine_curve("other", 1.0, 5)];
        let codec = CurveCompressionCodec::default();
        let compressed = codec.compress(&CompressionInput {
            asset_name: "unbounded",
            curves: &curves,
            sequence_length: f32::INFINITY,
            num_samples: 31,
            morph_targets: None,
        });

        assert!(!compressed.did_fallback);
        assert!(codec.validate(&compressed, "unbounded"));
        let view = TracksView::parse(&compressed.compressed_bytes).unwrap();
        assert_eq!(view.num_samples(), 1);
        assert!(codec.decompress_one(&compressed, "wave", 0.5).abs() <= 0.001);
    }

    #[test]
    fn test_static_pose() {
        let curves = vec![AnimationCurve::new("pose", KeyedCurve::constant(0.75))];
        let codec = CurveCompressionCodec::default();
        let compressed = codec.compress(&CompressionInput {
            asset_name: "pose",
            curves: &curves,
            sequence_length: 0.0,
            num_samples: 1,
            morph_targets: None,
        });

        let view = TracksView::parse(&compressed.compressed_bytes).unwrap();
        assert_eq!(view.num_samples(), 1);
        assert_eq!(view.sample_rate(), 30.0);
        assert!((codec.decompress_one(&compressed, "pose", 3.0) - 0.75).abs() <= 0.001);
    }

    #[test]
    fn test_cache_key_changes_with_inputs() {
        let codec = CurveCompressionCodec::default();
        let base = codec.cache_key(None);
        assert_eq!(base, CurveCompressionCodec::default().cache_key(None));

        let mesh = MorphTargetSet {
            structure_guid: Some("guid-a".to_string()),
            targets: vec![],
        };
        let with_mesh = codec.cache_key(Some(&mesh));
        assert_ne!(base, with_mesh);

        let other_mesh = MorphTargetSet {
            structure_guid: Some("guid-b".to_string()),
            targets: vec![],
        };
        assert_ne!(with_mesh, codec.cache_key(Some(&other_mesh)));

        let finer = CurveCompressionCodec::new(CodecSettings {
            curve_precision: 0.0001,
            ..Default::default()
        });
        assert_ne!(base, finer.cache_key(None));

        let mut settings = CodecSettings::default();
        settings.compression.verify_error = false;
        assert_ne!(base, CurveCompressionCodec::new(settings).cache_key(None));
    }

    #[test]
    fn test_stats() {
        let codec = CurveCompressionCodec::default();
        let curves = vec![
            AnimationCurve::new("flat", KeyedCurve::constant(1.0)),
            sine_curve("wave", 1.0, 31),
        ];
        let compressed = codec.compress(&input(&curves, None));
        let stats = codec.stats(&compressed, 31);

        assert_eq!(stats.curve_count, 2);
        assert_eq!(stats.raw_bytes, 2 * 31 * 4);
        assert_eq!(stats.compressed_bytes, compressed.compressed_bytes.len());
        assert!(stats.ratio() > 0.0);
        assert!(!stats.to_string().contains("FALLBACK"));
    }
}
