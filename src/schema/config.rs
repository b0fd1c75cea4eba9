//! Configuration types for curve compression.

use serde::{Deserialize, Serialize};

/// Default flat precision applied to curves that do not drive a morph target.
pub const DEFAULT_CURVE_PRECISION: f32 = 0.001;

/// Default world-space vertex precision (in cm) for morph target curves.
pub const DEFAULT_MORPH_TARGET_POSITION_PRECISION: f32 = 0.01;

/// Top-level codec configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodecSettings {
    /// Flat quantization precision in curve-value units.
    #[serde(default = "default_curve_precision")]
    pub curve_precision: f32,
    /// Target vertex displacement error for curves driving morph targets.
    #[serde(default = "default_morph_target_position_precision")]
    pub morph_target_position_precision: f32,
    /// Settings handed to the scalar track compressor on every call.
    #[serde(default)]
    pub compression: CompressionSettings,
}

fn default_curve_precision() -> f32 {
    DEFAULT_CURVE_PRECISION
}

fn default_morph_target_position_precision() -> f32 {
    DEFAULT_MORPH_TARGET_POSITION_PRECISION
}

impl Default for CodecSettings {
    fn default() -> Self {
        Self {
            curve_precision: DEFAULT_CURVE_PRECISION,
            morph_target_position_precision: DEFAULT_MORPH_TARGET_POSITION_PRECISION,
            compression: CompressionSettings::default(),
        }
    }
}

/// How hard the compressor searches for the smallest bit rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum CompressionLevel {
    Lowest = 0,
    Low = 1,
    #[default]
    Medium = 2,
    High = 3,
    Highest = 4,
}

impl CompressionLevel {
    /// Bit rates tried, in increasing order, before falling back to raw floats.
    pub fn bit_rate_candidates(self) -> &'static [u8] {
        match self {
            CompressionLevel::Lowest => &[8, 16, 24],
            CompressionLevel::Low => &[4, 8, 12, 16, 20, 24],
            CompressionLevel::Medium | CompressionLevel::High | CompressionLevel::Highest => &[
                1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23,
                24,
            ],
        }
    }
}

/// Compressor settings shared by every compression call in a process.
///
/// Passed explicitly; callers keep one value around rather than rebuilding it per call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompressionSettings {
    /// Bit rate search effort.
    #[serde(default)]
    pub level: CompressionLevel,
    /// Re-measure the reconstruction error of every sample for each candidate bit rate.
    #[serde(default = "default_verify_error")]
    pub verify_error: bool,
}

fn default_verify_error() -> bool {
    true
}

impl Default for CompressionSettings {
    fn default() -> Self {
        Self {
            level: CompressionLevel::default(),
            verify_error: true,
        }
    }
}

impl CompressionSettings {
    /// Stable 32-bit hash of the settings, folded into cache keys.
    pub fn hash(&self) -> u32 {
        crate::compute::fnv1a(&[self.level as u8, self.verify_error as u8])
    }
}

impl CodecSettings {
    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.curve_precision.is_finite() && self.curve_precision > 0.0) {
            return Err(ConfigError::InvalidCurvePrecision(self.curve_precision));
        }
        if !(self.morph_target_position_precision.is_finite()
            && self.morph_target_position_precision > 0.0)
        {
            return Err(ConfigError::InvalidMorphTargetPrecision(
                self.morph_target_position_precision,
            ));
        }
        Ok(())
    }

    /// Parse settings from JSON and validate them.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Curve precision must be positive and finite, got {0}")]
    InvalidCurvePrecision(f32),
    #[error("Morph target position precision must be positive and finite, got {0}")]
    InvalidMorphTargetPrecision(f32),
    #[error("Failed to parse settings: {0}")]
    Parse(#[from] serde_json::Error),
}
