//! Curve Codec - Error-bounded compression for scalar animation curves.
//!
//! This crate compresses the scalar curves of an animation sequence (morph target
//! weights, material parameters and so on) into a compact buffer with a per-curve error
//! bound, and samples that buffer at arbitrary times.
//!
//! # Architecture
//!
//! The crate is split into three modules:
//!
//! - `schema`: Settings, source curves and morph target data
//! - `compute`: Precision derivation, track building and the scalar track compressor
//! - `animation`: Packaging, validation and decompression of persisted curves
//!
//! Compression never fails. If the real curves cannot be compressed, neutral stubs are
//! compressed in their place and an error sentinel is appended so that validation can
//! reject the asset later.
//!
//! # Example
//!
//! ```rust,no_run
//! use curve_codec::{
//!     animation::{CompressionInput, CurveCompressionCodec},
//!     schema::{AnimationCurve, CodecSettings, CurveKey, KeyedCurve},
//! };
//!
//! let curves = vec![AnimationCurve::new(
//!     "jaw_open",
//!     KeyedCurve::new(vec![CurveKey::linear(0.0, 0.0), CurveKey::linear(1.0, 1.0)]),
//! )];
//!
//! let codec = CurveCompressionCodec::new(CodecSettings::default());
//! let compressed = codec.compress(&CompressionInput {
//!     asset_name: "face_anim",
//!     curves: &curves,
//!     sequence_length: 1.0,
//!     num_samples: 31,
//!     morph_targets: None,
//! });
//!
//! assert!(codec.validate(&compressed, "face_anim"));
//! println!("jaw_open at 0.5s: {}", codec.decompress_one(&compressed, "jaw_open", 0.5));
//! ```

pub mod animation;
pub mod compute;
pub mod schema;

// Re-export commonly used types
pub use animation::{CompressedCurves, CompressionInput, CurveCompressionCodec};
pub use schema::{AnimationCurve, CodecSettings, KeyedCurve, MorphTargetSet};
