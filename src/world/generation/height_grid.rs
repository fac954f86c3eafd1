//! Normalised height samples for one tile
//!
//! A tile with interior resolution `N` is stored as an `(N + 2) x (N + 2)`
//! row-major grid. The outer ring holds real noise samples from the
//! neighbouring area so that edge normals see the true slope.

use std::path::Path;

use glam::Vec2;
use image::GrayImage;

use super::falloff::HeightBias;
use super::noise_field::{generate_noise_map, NoiseConfig};
use crate::constants::tile::BORDER;
use crate::error::{TerrainError, TerrainResult};

#[derive(Debug, Clone, PartialEq)]
pub struct HeightGrid {
    width: usize,
    height: usize,
    values: Vec<f32>,
}

impl HeightGrid {
    /// Build a grid from row-major values
    pub fn new(width: usize, height: usize, values: Vec<f32>) -> TerrainResult<Self> {
        if values.len() != width * height {
            return Err(TerrainError::invalid_config(
                "height_grid",
                format!(
                    "expected {} values for {}x{}, got {}",
                    width * height,
                    width,
                    height,
                    values.len()
                ),
            ));
        }
        Ok(Self::from_parts(width, height, values))
    }

    pub(crate) fn from_parts(width: usize, height: usize, values: Vec<f32>) -> Self {
        debug_assert_eq!(values.len(), width * height);
        Self { width, height, values }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn is_square(&self) -> bool {
        self.width == self.height
    }

    /// Interior resolution, i.e. the grid width without its border ring
    pub fn interior_size(&self) -> usize {
        self.width.saturating_sub(2 * BORDER)
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    #[inline]
    pub fn index(&self, x: usize, y: usize) -> usize {
        y * self.width + x
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.values[self.index(x, y)]
    }

    pub fn row(&self, y: usize) -> &[f32] {
        let start = y * self.width;
        &self.values[start..start + self.width]
    }

    /// Subtract a per-cell bias and clamp back into [0, 1]
    pub fn with_bias(mut self, bias: &dyn HeightBias) -> Self {
        for y in 0..self.height {
            for x in 0..self.width {
                let i = self.index(x, y);
                self.values[i] = (self.values[i] - bias.bias(x, y)).clamp(0.0, 1.0);
            }
        }
        self
    }

    /// Greyscale image of the grid, black = 0 and white = 1
    pub fn to_luma_image(&self) -> GrayImage {
        GrayImage::from_fn(self.width as u32, self.height as u32, |x, y| {
            let v = self.get(x as usize, y as usize).clamp(0.0, 1.0);
            image::Luma([(v * 255.0).round() as u8])
        })
    }

    pub fn save_png(&self, path: impl AsRef<Path>) -> TerrainResult<()> {
        self.to_luma_image().save(path.as_ref())?;
        Ok(())
    }
}

/// Generate the bordered height grid for a tile with interior resolution
/// `tile_resolution`, centred on `center` in world space.
pub fn generate_height_grid(
    noise: &NoiseConfig,
    tile_resolution: usize,
    center: Vec2,
    bias: Option<&dyn HeightBias>,
) -> HeightGrid {
    let size = tile_resolution + 2 * BORDER;
    let grid = generate_noise_map(size, size, noise, center);
    match bias {
        Some(bias) => grid.with_bias(bias),
        None => grid,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::generation::falloff::FalloffMap;

    #[test]
    fn test_new_rejects_wrong_length() {
        assert!(HeightGrid::new(3, 3, vec![0.0; 8]).is_err());
        let grid = HeightGrid::new(2, 3, vec![0.0, 0.1, 0.2, 0.3, 0.4, 0.5]).expect("valid grid");
        assert_eq!(grid.get(1, 2), 0.5);
        assert_eq!(grid.row(1), &[0.2, 0.3]);
        assert!(!grid.is_square());
    }

    #[test]
    fn test_height_grid_has_border() {
        let grid = generate_height_grid(&NoiseConfig::default(), 9, Vec2::ZERO, None);
        assert_eq!(grid.width(), 11);
        assert_eq!(grid.height(), 11);
        assert_eq!(grid.interior_size(), 9);
        assert!(grid.values().iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_falloff_bias_lowers_edges() {
        let noise = NoiseConfig::default();
        let plain = generate_height_grid(&noise, 9, Vec2::ZERO, None);
        let falloff = FalloffMap::new(11);
        let biased = generate_height_grid(&noise, 9, Vec2::ZERO, Some(&falloff));
        assert_eq!(biased.get(0, 0), 0.0);
        for (a, b) in plain.values().iter().zip(biased.values()) {
            assert!(b <= a);
        }
    }

    #[test]
    fn test_luma_image_matches_grid() {
        let grid = HeightGrid::new(2, 2, vec![0.0, 1.0, 0.5, 0.25]).expect("valid grid");
        let img = grid.to_luma_image();
        assert_eq!(img.dimensions(), (2, 2));
        assert_eq!(img.get_pixel(0, 0).0, [0]);
        assert_eq!(img.get_pixel(1, 0).0, [255]);
        assert_eq!(img.get_pixel(0, 1).0, [128]);
    }
}
