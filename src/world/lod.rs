//! Level-of-detail table and selection
//!
//! Each entry pairs a mesh LOD with the distance up to which it is used.
//! Thresholds strictly increase; the last one is the maximum view distance.

use serde::{Deserialize, Serialize};

use crate::constants::streaming::DEFAULT_LODS;
use crate::error::{TerrainError, TerrainResult};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LodLevel {
    pub lod: u32,
    /// Used while the observer is at most this far from the tile
    pub distance: f32,
}

impl LodLevel {
    pub fn new(lod: u32, distance: f32) -> Self {
        Self { lod, distance }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LodTable {
    levels: Vec<LodLevel>,
}

impl LodTable {
    pub fn new(levels: Vec<LodLevel>) -> TerrainResult<Self> {
        if levels.is_empty() {
            return Err(TerrainError::invalid_config("lods", "at least one LOD level is required"));
        }
        if let Some(level) = levels.iter().find(|l| !l.distance.is_finite() || l.distance <= 0.0) {
            return Err(TerrainError::invalid_config(
                "lods",
                format!("distance {} must be positive and finite", level.distance),
            ));
        }
        if levels.windows(2).any(|w| w[1].distance <= w[0].distance) {
            return Err(TerrainError::invalid_config(
                "lods",
                "distances must be strictly increasing",
            ));
        }
        Ok(Self { levels })
    }

    pub fn levels(&self) -> &[LodLevel] {
        &self.levels
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&LodLevel> {
        self.levels.get(index)
    }

    /// Distance beyond which tiles are hidden
    pub fn max_view_distance(&self) -> f32 {
        self.levels[self.levels.len() - 1].distance
    }

    /// Index of the first level whose distance is not exceeded, or the last index.
    /// A distance exactly on a threshold picks the finer level.
    pub fn select(&self, distance: f32) -> usize {
        self.levels
            .iter()
            .position(|level| distance <= level.distance)
            .unwrap_or(self.levels.len() - 1)
    }
}

impl Default for LodTable {
    fn default() -> Self {
        Self {
            levels: DEFAULT_LODS
                .iter()
                .map(|&(lod, distance)| LodLevel::new(lod, distance))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_level_table() -> LodTable {
        LodTable::new(vec![LodLevel::new(0, 50.0), LodLevel::new(1, 100.0)]).expect("valid table")
    }

    #[test]
    fn test_select_by_distance() {
        let table = two_level_table();
        assert_eq!(table.select(30.0), 0);
        assert_eq!(table.select(70.0), 1);
        assert_eq!(table.select(150.0), 1);
        assert_eq!(table.max_view_distance(), 100.0);
    }

    #[test]
    fn test_tie_picks_finer_level() {
        let table = two_level_table();
        assert_eq!(table.select(50.0), 0);
        assert_eq!(table.select(100.0), 1);
    }

    #[test]
    fn test_selection_is_monotonic() {
        let table = LodTable::new(vec![
            LodLevel::new(0, 10.0),
            LodLevel::new(1, 20.0),
            LodLevel::new(2, 40.0),
            LodLevel::new(4, 80.0),
        ])
        .expect("valid table");

        let mut previous = 0;
        for step in 0..200 {
            let index = table.select(step as f32 * 0.5);
            assert!(index >= previous);
            previous = index;
        }
        assert_eq!(previous, 3);
    }

    #[test]
    fn test_invalid_tables_rejected() {
        assert!(LodTable::new(vec![]).is_err());
        assert!(LodTable::new(vec![LodLevel::new(0, 50.0), LodLevel::new(1, 50.0)]).is_err());
        assert!(LodTable::new(vec![LodLevel::new(0, -1.0)]).is_err());
        assert!(LodTable::new(vec![LodLevel::new(0, f32::INFINITY)]).is_err());
    }

    #[test]
    fn test_default_table_is_valid() {
        let table = LodTable::default();
        assert!(LodTable::new(table.levels().to_vec()).is_ok());
    }
}
