//! Island falloff mask

use crate::constants::mesh::{FALLOFF_EXPONENT, FALLOFF_SHIFT};

/// Per-cell height bias subtracted from a height grid before meshing
pub trait HeightBias: Send + Sync {
    /// Bias for grid cell `(x, y)`
    fn bias(&self, x: usize, y: usize) -> f32;
}

/// Square island mask: zero in the middle, rising to one at the edges
#[derive(Debug, Clone, PartialEq)]
pub struct FalloffMap {
    size: usize,
    values: Vec<f32>,
}

impl FalloffMap {
    pub fn new(size: usize) -> Self {
        let mut values = Vec::with_capacity(size * size);
        for y in 0..size {
            for x in 0..size {
                let fx = x as f32 / size as f32 * 2.0 - 1.0;
                let fy = y as f32 / size as f32 * 2.0 - 1.0;
                values.push(falloff_curve(fx.abs().max(fy.abs())));
            }
        }
        Self { size, values }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn get(&self, x: usize, y: usize) -> f32 {
        if x >= self.size || y >= self.size {
            return 0.0;
        }
        self.values[y * self.size + x]
    }
}

impl HeightBias for FalloffMap {
    fn bias(&self, x: usize, y: usize) -> f32 {
        self.get(x, y)
    }
}

fn falloff_curve(t: f32) -> f32 {
    let a = t.powf(FALLOFF_EXPONENT);
    let b = (FALLOFF_SHIFT - FALLOFF_SHIFT * t).powf(FALLOFF_EXPONENT);
    a / (a + b)
}
