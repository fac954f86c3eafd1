//! Height response curves applied before the height multiplier

use serde::{Deserialize, Serialize};

use crate::error::{TerrainError, TerrainResult};

/// Remaps a normalised height sample before it is scaled by the height multiplier
pub trait HeightCurve: Send + Sync {
    fn evaluate(&self, t: f32) -> f32;
}

impl<F> HeightCurve for F
where
    F: Fn(f32) -> f32 + Send + Sync,
{
    fn evaluate(&self, t: f32) -> f32 {
        self(t)
    }
}

/// Identity curve
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LinearCurve;

impl HeightCurve for LinearCurve {
    fn evaluate(&self, t: f32) -> f32 {
        t
    }
}

/// Piecewise-linear curve through `(t, value)` keys sorted by `t`.
/// Values before the first key or after the last one are held constant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<[f32; 2]>", into = "Vec<[f32; 2]>")]
pub struct KeyframeCurve {
    keys: Vec<[f32; 2]>,
}

impl KeyframeCurve {
    pub fn new(keys: Vec<[f32; 2]>) -> TerrainResult<Self> {
        if keys.is_empty() {
            return Err(TerrainError::invalid_config("height_curve", "needs at least one key"));
        }
        if keys.iter().flatten().any(|v| !v.is_finite()) {
            return Err(TerrainError::invalid_config("height_curve", "keys must be finite"));
        }
        if keys.windows(2).any(|w| w[1][0] <= w[0][0]) {
            return Err(TerrainError::invalid_config(
                "height_curve",
                "key times must be strictly increasing",
            ));
        }
        Ok(Self { keys })
    }

    pub fn keys(&self) -> &[[f32; 2]] {
        &self.keys
    }
}

impl TryFrom<Vec<[f32; 2]>> for KeyframeCurve {
    type Error = TerrainError;

    fn try_from(keys: Vec<[f32; 2]>) -> Result<Self, Self::Error> {
        Self::new(keys)
    }
}

impl From<KeyframeCurve> for Vec<[f32; 2]> {
    fn from(curve: KeyframeCurve) -> Self {
        curve.keys
    }
}

impl HeightCurve for KeyframeCurve {
    fn evaluate(&self, t: f32) -> f32 {
        let first = self.keys[0];
        let last = self.keys[self.keys.len() - 1];
        if t.is_nan() || t <= first[0] {
            return first[1];
        }
        if t >= last[0] {
            return last[1];
        }

        // First key strictly after t; t > first key so i >= 1
        let i = self.keys.partition_point(|k| k[0] <= t);
        let [t0, v0] = self.keys[i - 1];
        let [t1, v1] = self.keys[i];
        let f = (t - t0) / (t1 - t0);
        v0 + (v1 - v0) * f
    }
}
