//! Per-curve quantization precision.
//!
//! Morph target weights are unitless, but the error on a weight shows up on screen as
//! `weight_error * max_delta` of vertex displacement. Curves driving a morph target are
//! therefore given `morph_precision / max_delta` so that the displacement error stays under
//! the configured world-space precision. All other curves use the flat precision.

use crate::schema::{AnimationCurve, CodecSettings, MorphTargetSet};

/// Compute the precision to target for one curve.
///
/// `flat_precision` and `morph_precision` must be positive; `morph_max_delta` is the largest
/// displacement the curve's morph target can produce, or 0 when it drives none.
#[inline]
pub fn derive_precision(morph_max_delta: f32, flat_precision: f32, morph_precision: f32) -> f32 {
    if morph_max_delta > 0.0 {
        let precision = morph_precision / morph_max_delta;
        if precision.is_finite() && precision > 0.0 {
            return precision;
        }
    }
    flat_precision
}

/// Precision for every curve, in curve order.
pub fn derive_precisions(
    curves: &[AnimationCurve],
    morph_targets: Option<&MorphTargetSet>,
    settings: &CodecSettings,
) -> Vec<f32> {
    match morph_targets {
        Some(mesh) => mesh
            .max_deltas_for(curves)
            .into_iter()
            .map(|delta| {
                derive_precision(
                    delta,
                    settings.curve_precision,
                    settings.morph_target_position_precision,
                )
            })
            .collect(),
        None => vec![settings.curve_precision; curves.len()],
    }
}
