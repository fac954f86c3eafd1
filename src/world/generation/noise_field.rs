//! Fractal noise field
//!
//! Sums octaves of Perlin noise into a grid of floats. The seed only drives a
//! ChaCha generator that picks one sample offset per octave, so the same inputs
//! always produce the same grid.

use glam::Vec2;
use noise::{NoiseFn, Perlin};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::height_grid::HeightGrid;
use crate::constants::noise::*;

/// How raw octave sums are rescaled into [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NormalizeMode {
    /// Min/max of this grid only. Neighbouring tiles will not line up.
    Local,
    /// Estimated from the octave amplitudes, identical for every tile
    #[default]
    Global,
}

/// Noise parameters for one generation session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseConfig {
    pub scale: f32,
    pub octaves: i32,
    pub persistence: f32,
    pub lacunarity: f32,
    pub seed: i64,
    pub offset: Vec2,
    pub normalize_mode: NormalizeMode,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            scale: DEFAULT_SCALE,
            octaves: DEFAULT_OCTAVES,
            persistence: DEFAULT_PERSISTENCE,
            lacunarity: DEFAULT_LACUNARITY,
            seed: DEFAULT_SEED,
            offset: Vec2::ZERO,
            normalize_mode: NormalizeMode::Global,
        }
    }
}

impl NoiseConfig {
    /// Copy with out-of-range values clamped: scale <= 0 becomes `MIN_SCALE`,
    /// octaves < 0 become 0 and lacunarity < 1 becomes 1.
    pub fn sanitized(&self) -> Self {
        let scale = if self.scale > 0.0 { self.scale } else { MIN_SCALE };
        Self {
            scale,
            octaves: self.octaves.max(0),
            lacunarity: self.lacunarity.max(1.0),
            ..self.clone()
        }
    }

    /// Sum of absolute octave amplitudes
    pub fn max_possible_height(&self) -> f32 {
        let mut amplitude = 1.0f32;
        let mut total = 0.0f32;
        for _ in 0..self.octaves.max(0) {
            total += amplitude.abs();
            amplitude *= self.persistence;
        }
        total
    }
}

/// Generate a `width` x `height` noise grid centred on `sample_origin`.
///
/// Cell `(x, y)` samples world position
/// `(origin.x + (x - (width-1)/2), origin.y - (y - (height-1)/2))`, so two grids
/// whose origins differ by a whole number of cells sample the same field.
pub fn generate_noise_map(
    width: usize,
    height: usize,
    config: &NoiseConfig,
    sample_origin: Vec2,
) -> HeightGrid {
    let config = config.sanitized();
    let mut values = vec![0.0f32; width * height];
    if width == 0 || height == 0 {
        return HeightGrid::from_parts(width, height, values);
    }

    let octave_offsets = octave_offsets(&config);
    let perlin = Perlin::new(config.seed as u32);
    let scale = config.scale as f64;
    let persistence = config.persistence as f64;
    let lacunarity = config.lacunarity as f64;
    let half_width = (width as f64 - 1.0) / 2.0;
    let half_height = (height as f64 - 1.0) / 2.0;
    let origin_x = sample_origin.x as f64;
    let origin_z = sample_origin.y as f64;

    let (min, max) = values
        .par_chunks_mut(width)
        .enumerate()
        .map(|(y, row)| {
            let world_z = origin_z - (y as f64 - half_height);
            let mut row_min = f32::MAX;
            let mut row_max = f32::MIN;

            for (x, cell) in row.iter_mut().enumerate() {
                let world_x = origin_x + (x as f64 - half_width);
                let mut amplitude = 1.0f64;
                let mut frequency = 1.0f64;
                let mut sum = 0.0f64;

                for &[offset_x, offset_z] in &octave_offsets {
                    let sample_x = (world_x + offset_x) / scale * frequency;
                    let sample_z = (world_z + offset_z) / scale * frequency;
                    sum += perlin.get([sample_x, sample_z]) * amplitude;

                    amplitude *= persistence;
                    frequency *= lacunarity;
                }

                let value = sum as f32;
                *cell = value;
                row_min = row_min.min(value);
                row_max = row_max.max(value);
            }

            (row_min, row_max)
        })
        .reduce(|| (f32::MAX, f32::MIN), |a, b| (a.0.min(b.0), a.1.max(b.1)));

    match config.normalize_mode {
        NormalizeMode::Local => {
            let range = max - min;
            values.par_iter_mut().for_each(|v| {
                *v = if range > 0.0 { (*v - min) / range } else { 0.0 };
            });
        }
        NormalizeMode::Global => {
            let estimate = config.max_possible_height() * GLOBAL_AMPLITUDE_FRACTION;
            values.par_iter_mut().for_each(|v| {
                *v = if estimate > 0.0 {
                    ((*v + estimate) / (2.0 * estimate)).clamp(0.0, 1.0)
                } else {
                    0.5
                };
            });
        }
    }

    HeightGrid::from_parts(width, height, values)
}

/// One offset per octave: a seeded random draw plus the configured global offset
fn octave_offsets(config: &NoiseConfig) -> Vec<[f64; 2]> {
    let mut rng = ChaCha8Rng::seed_from_u64(config.seed as u64);
    (0..config.octaves.max(0))
        .map(|_| {
            let x = rng.gen_range(-OCTAVE_OFFSET_RANGE..OCTAVE_OFFSET_RANGE);
            let z = rng.gen_range(-OCTAVE_OFFSET_RANGE..OCTAVE_OFFSET_RANGE);
            [x + config.offset.x as f64, z + config.offset.y as f64]
        })
        .collect()
}
