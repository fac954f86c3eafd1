//! Tile coordinates and footprints

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Position of a terrain tile on the integer tile grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkCoord {
    pub x: i32,
    pub y: i32,
}

impl ChunkCoord {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Tile containing the given world position. Tiles are centred on their coordinate.
    pub fn from_world_pos(pos: Vec2, chunk_size: f32) -> Self {
        Self {
            x: (pos.x / chunk_size).round() as i32,
            y: (pos.y / chunk_size).round() as i32,
        }
    }

    /// World-space centre of this tile
    pub fn to_world_pos(&self, chunk_size: f32) -> Vec2 {
        Vec2::new(self.x as f32 * chunk_size, self.y as f32 * chunk_size)
    }

    /// Create a new coordinate offset by the given amounts
    pub fn offset(&self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    /// Calculate squared distance to another coordinate, in tiles
    pub fn distance_squared_to(&self, other: ChunkCoord) -> i32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }
}

/// Axis-aligned square footprint of a tile in world space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds2 {
    pub min: Vec2,
    pub max: Vec2,
}

impl Bounds2 {
    pub fn from_center_size(center: Vec2, size: f32) -> Self {
        let half = Vec2::splat(size * 0.5);
        Self {
            min: center - half,
            max: center + half,
        }
    }

    pub fn center(&self) -> Vec2 {
        (self.min + self.max) * 0.5
    }

    /// Squared distance from `point` to the nearest point of the bounds (zero inside)
    pub fn sqr_distance(&self, point: Vec2) -> f32 {
        let closest = point.clamp(self.min, self.max);
        (point - closest).length_squared()
    }

    pub fn distance(&self, point: Vec2) -> f32 {
        self.sqr_distance(point).sqrt()
    }
}
