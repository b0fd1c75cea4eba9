//! Morph target delta data supplied by the mesh being animated.

use serde::{Deserialize, Serialize};

use super::AnimationCurve;

/// Per-vertex position deltas of one morph target, one buffer per LOD.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MorphTarget {
    pub name: String,
    /// Position deltas indexed [lod][vertex].
    pub lod_deltas: Vec<Vec<[f32; 3]>>,
}

impl MorphTarget {
    pub fn new(name: impl Into<String>, lod_deltas: Vec<Vec<[f32; 3]>>) -> Self {
        Self {
            name: name.into(),
            lod_deltas,
        }
    }

    /// Largest delta magnitude across every LOD.
    pub fn max_delta(&self) -> f32 {
        self.lod_deltas
            .iter()
            .flatten()
            .map(|&[x, y, z]| (x * x + y * y + z * z).sqrt())
            .filter(|d| d.is_finite())
            .fold(0.0, f32::max)
    }
}

/// Morph targets of a mesh, plus the GUID identifying their structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MorphTargetSet {
    /// Changes whenever the morph target layout changes; folded into cache keys.
    #[serde(default)]
    pub structure_guid: Option<String>,
    pub targets: Vec<MorphTarget>,
}

impl MorphTargetSet {
    /// Maximum displacement of the named morph target, 0 when the mesh has none.
    ///
    /// Several targets with the same name (one per LOD source) are merged.
    pub fn max_delta(&self, name: &str) -> f32 {
        self.targets
            .iter()
            .filter(|t| t.name == name)
            .map(MorphTarget::max_delta)
            .fold(0.0, f32::max)
    }

    /// Maximum displacement for each curve, in curve order.
    pub fn max_deltas_for(&self, curves: &[AnimationCurve]) -> Vec<f32> {
        curves
            .iter()
            .map(|c| self.max_delta(c.morph_target_name()))
            .collect()
    }
}
