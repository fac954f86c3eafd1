//! Terrain error handling
//!
//! Configuration problems are caught when a config is validated. Faults inside
//! background computations travel back to the control loop as `ComputeError`.

use thiserror::Error;

/// Result alias used across the crate
pub type TerrainResult<T> = Result<T, TerrainError>;

#[derive(Debug, Error)]
pub enum TerrainError {
    #[error("Invalid configuration for {field}: {reason}")]
    InvalidConfig { field: String, reason: String },

    #[error("LOD {lod} uses step {step}, which does not divide tile resolution {tile_resolution} - 1")]
    IncompatibleLod {
        lod: u32,
        step: usize,
        tile_resolution: usize,
    },

    #[error("Height grid of size {size} is too small to mesh (need at least 3)")]
    GridTooSmall { size: usize },

    #[error("Failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Computation failed: {0}")]
    Compute(#[from] ComputeError),
}

impl TerrainError {
    pub fn invalid_config(field: &str, reason: impl Into<String>) -> Self {
        TerrainError::InvalidConfig {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

/// Faults raised while running a background computation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ComputeError {
    #[error("task '{task}' panicked: {message}")]
    Panicked { task: &'static str, message: String },

    #[error("worker pool has shut down")]
    PoolShutdown,
}

impl ComputeError {
    /// Build a `Panicked` error from a caught panic payload
    pub fn from_panic(task: &'static str, payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        ComputeError::Panicked { task, message }
    }
}
