//! Source curve data read by the compressor.

use serde::{Deserialize, Serialize};

/// Interpolation used between a key and the one that follows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterpMode {
    /// Hold the key's value until the next key.
    Constant,
    /// Straight line to the next key.
    #[default]
    Linear,
    /// Cubic Hermite using the key's leave tangent and the next key's arrive tangent.
    Cubic,
}

/// A single key on a [`KeyedCurve`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurveKey {
    /// Key time in seconds.
    pub time: f32,
    pub value: f32,
    #[serde(default)]
    pub interp: InterpMode,
    /// Slope (value per second) arriving at this key.
    #[serde(default)]
    pub arrive_tangent: f32,
    /// Slope (value per second) leaving this key.
    #[serde(default)]
    pub leave_tangent: f32,
}

impl CurveKey {
    pub fn linear(time: f32, value: f32) -> Self {
        Self {
            time,
            value,
            interp: InterpMode::Linear,
            arrive_tangent: 0.0,
            leave_tangent: 0.0,
        }
    }

    pub fn constant(time: f32, value: f32) -> Self {
        Self {
            interp: InterpMode::Constant,
            ..Self::linear(time, value)
        }
    }

    pub fn cubic(time: f32, value: f32, arrive_tangent: f32, leave_tangent: f32) -> Self {
        Self {
            time,
            value,
            interp: InterpMode::Cubic,
            arrive_tangent,
            leave_tangent,
        }
    }
}

/// Anything that can be evaluated continuously over time.
pub trait CurveEvaluator: Send + Sync {
    /// Curve value at `time` seconds.
    fn evaluate(&self, time: f32) -> f32;
}

/// Continuous curve defined by time-sorted keys.
///
/// Evaluation holds the first value before the first key and the last value after the
/// last key. A curve without keys evaluates to zero everywhere.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<CurveKey>", into = "Vec<CurveKey>")]
pub struct KeyedCurve {
    keys: Vec<CurveKey>,
}

impl From<Vec<CurveKey>> for KeyedCurve {
    fn from(keys: Vec<CurveKey>) -> Self {
        Self::new(keys)
    }
}

impl From<KeyedCurve> for Vec<CurveKey> {
    fn from(curve: KeyedCurve) -> Self {
        curve.keys
    }
}

impl KeyedCurve {
    /// Build a curve, sorting keys by time.
    pub fn new(mut keys: Vec<CurveKey>) -> Self {
        keys.sort_by(|a, b| a.time.total_cmp(&b.time));
        Self { keys }
    }

    /// A curve holding `value` forever.
    pub fn constant(value: f32) -> Self {
        Self::new(vec![CurveKey::constant(0.0, value)])
    }

    pub fn keys(&self) -> &[CurveKey] {
        &self.keys
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl CurveEvaluator for KeyedCurve {
    fn evaluate(&self, time: f32) -> f32 {
        let keys = &self.keys;
        let n = keys.len();
        match n {
            0 => 0.0,
            1 => keys[0].value,
            _ => {
                // NaN holds the first key.
                if !(time > keys[0].time) {
                    return keys[0].value;
                }
                if time >= keys[n - 1].time {
                    return keys[n - 1].value;
                }

                // First key strictly after `time`; the guards above keep it in 1..n.
                let next = keys.partition_point(|k| k.time <= time);
                let k0 = &keys[next - 1];
                let k1 = &keys[next];

                let span = k1.time - k0.time;
                if span <= f32::EPSILON {
                    return k1.value;
                }
                let t = (time - k0.time) / span;

                match k0.interp {
                    InterpMode::Constant => k0.value,
                    InterpMode::Linear => k0.value + (k1.value - k0.value) * t,
                    InterpMode::Cubic => hermite(
                        k0.value,
                        k0.leave_tangent * span,
                        k1.value,
                        k1.arrive_tangent * span,
                        t,
                    ),
                }
            }
        }
    }
}

/// Cubic Hermite basis with tangents already scaled to the segment length.
#[inline]
fn hermite(p0: f32, m0: f32, p1: f32, m1: f32, t: f32) -> f32 {
    let t2 = t * t;
    let t3 = t2 * t;
    let h00 = 2.0 * t3 - 3.0 * t2 + 1.0;
    let h10 = t3 - 2.0 * t2 + t;
    let h01 = -2.0 * t3 + 3.0 * t2;
    let h11 = t3 - t2;
    h00 * p0 + h10 * m0 + h01 * p1 + h11 * m1
}

/// A named curve owned by an animation sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnimationCurve {
    pub name: String,
    /// Morph target driven by this curve. When absent the curve name is used for lookup.
    #[serde(default)]
    pub morph_target: Option<String>,
    pub curve: KeyedCurve,
}

impl AnimationCurve {
    pub fn new(name: impl Into<String>, curve: KeyedCurve) -> Self {
        Self {
            name: name.into(),
            morph_target: None,
            curve,
        }
    }

    /// Associate this curve with a morph target of a different name.
    pub fn with_morph_target(mut self, morph_target: impl Into<String>) -> Self {
        self.morph_target = Some(morph_target.into());
        self
    }

    /// Name used to look up the driven morph target.
    pub fn morph_target_name(&self) -> &str {
        self.morph_target.as_deref().unwrap_or(&self.name)
    }
}

impl CurveEvaluator for AnimationCurve {
    fn evaluate(&self, time: f32) -> f32 {
        self.curve.evaluate(time)
    }
}

/// Persisted mapping from curve name to its slot in the decompressed output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedCurveName {
    pub curve_name: String,
    pub curve_index: u32,
}

impl IndexedCurveName {
    /// Index every curve by its position in `curves`.
    pub fn from_curves(curves: &[AnimationCurve]) -> Vec<Self> {
        curves
            .iter()
            .enumerate()
            .map(|(i, c)| Self {
                curve_name: c.name.clone(),
                curve_index: i as u32,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_curve_is_zero() {
        let curve = KeyedCurve::default();
        assert_eq!(curve.evaluate(-1.0), 0.0);
        assert_eq!(curve.evaluate(3.0), 0.0);
    }

    #[test]
    fn test_linear_interpolation() {
        let curve = KeyedCurve::new(vec![CurveKey::linear(0.0, 0.0), CurveKey::linear(1.0, 2.0)]);
        assert!((curve.evaluate(0.25) - 0.5).abs() < 1e-6);
        assert!((curve.evaluate(0.5) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_clamps_outside_keys() {
        let curve = KeyedCurve::new(vec![CurveKey::linear(0.5, 1.0), CurveKey::linear(1.0, 3.0)]);
        assert_eq!(curve.evaluate(0.0), 1.0);
        assert_eq!(curve.evaluate(-10.0), 1.0);
        assert_eq!(curve.evaluate(5.0), 3.0);
    }

    #[test]
    fn test_constant_holds_left_key() {
        let curve = KeyedCurve::new(vec![
            CurveKey::constant(0.0, 1.0),
            CurveKey::constant(1.0, 5.0),
        ]);
        assert_eq!(curve.evaluate(0.99), 1.0);
        assert_eq!(curve.evaluate(1.0), 5.0);
    }

    #[test]
    fn test_nan_time_holds_first_key() {
        let curve = KeyedCurve::new(vec![CurveKey::linear(0.0, 2.0), CurveKey::linear(1.0, 4.0)]);
        assert_eq!(curve.evaluate(f32::NAN), 2.0);
    }

    #[test]
    fn test_cubic_hits_keys_and_is_smooth() {
        let curve = KeyedCurve::new(vec![
            CurveKey::cubic(0.0, 0.0, 0.0, 0.0),
            CurveKey::cubic(1.0, 1.0, 0.0, 0.0),
        ]);
        // Flat tangents give smoothstep.
        assert!((curve.evaluate(0.5) - 0.5).abs() < 1e-6);
        assert!((curve.evaluate(0.25) - 0.15625).abs() < 1e-6);
    }

    #[test]
    fn test_keys_are_sorted() {
        let curve = KeyedCurve::new(vec![CurveKey::linear(1.0, 1.0), CurveKey::linear(0.0, 0.0)]);
        assert_eq!(curve.keys()[0].time, 0.0);
        assert!((curve.evaluate(0.5) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_morph_target_name_defaults_to_curve_name() {
        let curve = AnimationCurve::new("jaw_open", KeyedCurve::constant(0.0));
        assert_eq!(curve.morph_target_name(), "jaw_open");
        let curve = curve.with_morph_target("mouth_open");
        assert_eq!(curve.morph_target_name(), "mouth_open");
    }

    #[test]
    fn test_curve_json_roundtrip() {
        let json = r#"{
            "name": "blink",
            "curve": [
                { "time": 0.0, "value": 0.0 },
                { "time": 1.0, "value": 1.0, "interp": "constant" }
            ]
        }"#;
        let curve: AnimationCurve = serde_json::from_str(json).unwrap();
        assert_eq!(curve.name, "blink");
        assert_eq!(curve.curve.keys().len(), 2);
        assert_eq!(curve.curve.keys()[1].interp, InterpMode::Constant);
        assert!(curve.morph_target.is_none());
    }
}
