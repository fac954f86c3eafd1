//! Session configuration
//!
//! `TerrainConfig` mirrors the TOML file. `validate` turns it into the
//! immutable `TerrainSettings` that the streamer and its workers share.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::constants::{streaming, tile};
use crate::error::{TerrainError, TerrainResult};
use crate::renderer::{build_terrain_mesh, check_lod_compatible, HeightCurve, KeyframeCurve, LinearCurve, MeshData};
use crate::thread_pool::WorkerPoolConfig;
use crate::world::generation::{generate_height_grid, FalloffMap, HeightBias, HeightGrid, NoiseConfig};
use crate::world::{LodLevel, LodTable};

/// Complete terrain configuration as read from disk
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainConfig {
    pub noise: NoiseConfig,
    pub mesh: MeshConfig,
    pub streaming: StreamingConfig,
    pub workers: WorkerConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshConfig {
    /// Interior cells per tile edge at full detail
    pub tile_resolution: u32,
    pub height_multiplier: f32,
    /// `[t, value]` keys; identity when absent
    pub height_curve: Option<KeyframeCurve>,
    pub use_falloff: bool,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            tile_resolution: tile::DEFAULT_TILE_RESOLUTION,
            height_multiplier: tile::DEFAULT_HEIGHT_MULTIPLIER,
            height_curve: None,
            use_falloff: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingConfig {
    /// Observer displacement (world units) that triggers a window recompute
    pub move_threshold: f32,
    pub lods: Vec<LodLevel>,
    /// Evict hidden tiles once more than this many exist
    pub max_chunks: Option<usize>,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            move_threshold: streaming::MOVE_THRESHOLD,
            lods: LodTable::default().levels().to_vec(),
            max_chunks: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub threads: Option<usize>,
    pub queue_capacity: Option<usize>,
}

impl TerrainConfig {
    pub fn from_toml_str(source: &str) -> TerrainResult<Self> {
        Ok(toml::from_str(source)?)
    }

    pub fn load(path: impl AsRef<Path>) -> TerrainResult<Self> {
        let source = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_toml_str(&source)?;
        log::info!("[TerrainConfig] Loaded {}", path.as_ref().display());
        Ok(config)
    }

    /// Clamp recoverable values and reject inconsistent ones
    pub fn validate(&self) -> TerrainResult<TerrainSettings> {
        if self.noise.scale.is_infinite() {
            return Err(TerrainError::invalid_config("noise.scale", "must be finite"));
        }
        if !self.noise.lacunarity.is_finite() {
            return Err(TerrainError::invalid_config("noise.lacunarity", "must be finite"));
        }
        if !self.noise.offset.is_finite() {
            return Err(TerrainError::invalid_config("noise.offset", "must be finite"));
        }
        let noise = self.noise.sanitized();
        if noise.scale != self.noise.scale {
            log::warn!("[TerrainConfig] noise.scale {} clamped to {}", self.noise.scale, noise.scale);
        }
        if noise.octaves != self.noise.octaves {
            log::warn!("[TerrainConfig] noise.octaves {} clamped to 0", self.noise.octaves);
        }
        if noise.lacunarity != self.noise.lacunarity {
            log::warn!("[TerrainConfig] noise.lacunarity {} clamped to 1", self.noise.lacunarity);
        }
        if !noise.persistence.is_finite() {
            return Err(TerrainError::invalid_config("noise.persistence", "must be finite"));
        }

        let tile_resolution = self.mesh.tile_resolution as usize;
        if tile_resolution < 2 {
            return Err(TerrainError::invalid_config(
                "mesh.tile_resolution",
                format!("must be at least 2, got {}", tile_resolution),
            ));
        }
        if !self.mesh.height_multiplier.is_finite() {
            return Err(TerrainError::invalid_config("mesh.height_multiplier", "must be finite"));
        }
        if !(self.streaming.move_threshold.is_finite() && self.streaming.move_threshold >= 0.0) {
            return Err(TerrainError::invalid_config(
                "streaming.move_threshold",
                "must be a non-negative number",
            ));
        }
        if self.streaming.max_chunks == Some(0) {
            return Err(TerrainError::invalid_config("streaming.max_chunks", "must be at least 1"));
        }

        let lods = LodTable::new(self.streaming.lods.clone())?;
        for level in lods.levels() {
            check_lod_compatible(tile_resolution, level.lod)?;
        }

        let mut workers = WorkerPoolConfig::default();
        if let Some(threads) = self.workers.threads {
            if threads == 0 {
                return Err(TerrainError::invalid_config("workers.threads", "must be at least 1"));
            }
            workers.worker_threads = threads;
            workers.queue_capacity = threads * streaming::QUEUE_DEPTH_PER_WORKER;
        }
        if let Some(capacity) = self.workers.queue_capacity {
            workers.queue_capacity = capacity.max(1);
        }

        let height_curve: Arc<dyn HeightCurve> = match &self.mesh.height_curve {
            Some(curve) => Arc::new(curve.clone()),
            None => Arc::new(LinearCurve),
        };
        let height_bias: Option<Arc<dyn HeightBias>> = if self.mesh.use_falloff {
            Some(Arc::new(FalloffMap::new(tile_resolution + 2 * tile::BORDER)))
        } else {
            None
        };

        Ok(TerrainSettings {
            noise,
            tile_resolution,
            height_multiplier: self.mesh.height_multiplier,
            height_curve,
            height_bias,
            lods,
            move_threshold: self.streaming.move_threshold,
            max_chunks: self.streaming.max_chunks,
            workers,
        })
    }
}

/// Validated, read-only parameters for one streaming session
#[derive(Clone)]
pub struct TerrainSettings {
    pub noise: NoiseConfig,
    pub tile_resolution: usize,
    pub height_multiplier: f32,
    pub height_curve: Arc<dyn HeightCurve>,
    pub height_bias: Option<Arc<dyn HeightBias>>,
    pub lods: LodTable,
    pub move_threshold: f32,
    pub max_chunks: Option<usize>,
    pub workers: WorkerPoolConfig,
}

impl fmt::Debug for TerrainSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TerrainSettings")
            .field("noise", &self.noise)
            .field("tile_resolution", &self.tile_resolution)
            .field("height_multiplier", &self.height_multiplier)
            .field("height_curve", &"<HeightCurve>")
            .field("height_bias", &self.height_bias.as_ref().map(|_| "<HeightBias>"))
            .field("lods", &self.lods)
            .field("move_threshold", &self.move_threshold)
            .field("max_chunks", &self.max_chunks)
            .field("workers", &self.workers)
            .finish()
    }
}

impl TerrainSettings {
    /// Replace the height curve with any custom remapping
    pub fn with_height_curve(mut self, curve: impl HeightCurve + 'static) -> Self {
        self.height_curve = Arc::new(curve);
        self
    }

    /// Replace the height bias provider (e.g. a custom mask)
    pub fn with_height_bias(mut self, bias: Option<Arc<dyn HeightBias>>) -> Self {
        self.height_bias = bias;
        self
    }

    /// World-space edge length of one tile
    pub fn chunk_size(&self) -> f32 {
        (self.tile_resolution - 1) as f32
    }

    pub fn max_view_distance(&self) -> f32 {
        self.lods.max_view_distance()
    }

    /// Tiles to scan in each direction from the observer's tile
    pub fn chunks_visible_in_distance(&self) -> i32 {
        (self.max_view_distance() / self.chunk_size()).ceil() as i32
    }

    pub fn move_threshold_squared(&self) -> f32 {
        self.move_threshold * self.move_threshold
    }

    /// Height grid for the tile centred on `center`
    pub fn generate_height_grid(&self, center: Vec2) -> HeightGrid {
        generate_height_grid(
            &self.noise,
            self.tile_resolution,
            center,
            self.height_bias.as_deref(),
        )
    }

    pub fn build_mesh(&self, grid: &HeightGrid, lod: u32) -> TerrainResult<MeshData> {
        build_terrain_mesh(grid, self.height_multiplier, self.height_curve.as_ref(), lod)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_validates() {
        let settings = TerrainConfig::default().validate().expect("default config is valid");
        assert_eq!(settings.tile_resolution, 241);
        assert_eq!(settings.chunk_size(), 240.0);
        assert_eq!(settings.move_threshold_squared(), 625.0);
        assert_eq!(settings.chunks_visible_in_distance(), 3);
    }

    #[test]
    fn test_recoverable_values_are_clamped() {
        let mut config = TerrainConfig::default();
        config.noise.scale = 0.0;
        config.noise.octaves = -2;
        config.noise.lacunarity = 0.5;
        let settings = config.validate().expect("clamped config is valid");
        assert!(settings.noise.scale > 0.0);
        assert_eq!(settings.noise.octaves, 0);
        assert_eq!(settings.noise.lacunarity, 1.0);
    }

    #[test]
    fn test_incompatible_lod_rejected() {
        let mut config = TerrainConfig::default();
        config.mesh.tile_resolution = 9;
        config.streaming.lods = vec![LodLevel::new(0, 50.0), LodLevel::new(3, 100.0)];
        assert!(matches!(
            config.validate(),
            Err(TerrainError::IncompatibleLod { lod: 3, step: 6, tile_resolution: 9 })
        ));
    }

    #[test]
    fn test_structural_errors_rejected() {
        let mut config = TerrainConfig::default();
        config.mesh.tile_resolution = 1;
        assert!(config.validate().is_err());

        let mut config = TerrainConfig::default();
        config.streaming.lods.clear();
        assert!(config.validate().is_err());

        let mut config = TerrainConfig::default();
        config.workers.threads = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_non_finite_noise_rejected() {
        let mut config = TerrainConfig::default();
        config.noise.offset = Vec2::new(f32::INFINITY, 0.0);
        assert!(matches!(config.validate(), Err(TerrainError::InvalidConfig { .. })));

        let mut config = TerrainConfig::default();
        config.noise.scale = f32::INFINITY;
        assert!(matches!(config.validate(), Err(TerrainError::InvalidConfig { .. })));

        let mut config = TerrainConfig::default();
        config.noise.lacunarity = f32::INFINITY;
        assert!(matches!(config.validate(), Err(TerrainError::InvalidConfig { .. })));
    }

    #[test]
    fn test_worker_overrides() {
        let mut config = TerrainConfig::default();
        config.workers.threads = Some(3);
        let settings = config.validate().expect("valid");
        assert_eq!(settings.workers.worker_threads, 3);
        assert_eq!(settings.workers.queue_capacity, 3 * streaming::QUEUE_DEPTH_PER_WORKER);

        config.workers.queue_capacity = Some(5);
        assert_eq!(config.validate().expect("valid").workers.queue_capacity, 5);
    }

    #[test]
    fn test_parse_toml() {
        let config = TerrainConfig::from_toml_str(
            r#"
            [noise]
            scale = 30.0
            octaves = 3
            seed = 7
            offset = [1.5, -2.0]
            normalize_mode = "local"

            [mesh]
            tile_resolution = 9
            height_curve = [[0.0, 0.0], [1.0, 2.0]]

            [streaming]
            lods = [{ lod = 0, distance = 50.0 }, { lod = 1, distance = 100.0 }]
            "#,
        )
        .expect("valid toml");

        assert_eq!(config.noise.octaves, 3);
        assert_eq!(config.noise.offset, Vec2::new(1.5, -2.0));
        assert_eq!(config.noise.persistence, 0.5);
        assert_eq!(config.mesh.tile_resolution, 9);
        assert_eq!(config.streaming.lods.len(), 2);

        let settings = config.validate().expect("valid");
        assert_eq!(settings.height_curve.evaluate(0.5), 1.0);
    }

    #[test]
    fn test_bad_curve_in_toml_is_parse_error() {
        let result = TerrainConfig::from_toml_str(
            r#"
            [mesh]
            height_curve = [[1.0, 0.0], [0.0, 1.0]]
            "#,
        );
        assert!(matches!(result, Err(TerrainError::ConfigParse(_))));
    }
}
