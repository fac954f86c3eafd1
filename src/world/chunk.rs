//! One terrain tile and its cached computations
//!
//! A chunk is only touched from the control loop. Background results reach it
//! through completion handlers that run during `AsyncComputeQueue::drain`.

use std::sync::Arc;

use glam::Vec2;

use super::position::{Bounds2, ChunkCoord};
use crate::renderer::MeshData;
use crate::world::generation::HeightGrid;

/// Height grid slot
#[derive(Debug, Clone)]
pub enum HeightSlot {
    /// Not requested yet
    Empty,
    Pending,
    Ready(Arc<HeightGrid>),
    /// The computation faulted; it is never retried
    Failed(String),
}

/// Per-LOD mesh slot
#[derive(Debug, Clone, Default)]
pub enum MeshSlot {
    #[default]
    Empty,
    Pending,
    Ready(Arc<MeshData>),
    Failed(String),
}

impl MeshSlot {
    pub fn is_ready(&self) -> bool {
        matches!(self, MeshSlot::Ready(_))
    }
}

/// Lifecycle position of a chunk. LOD values are indices into the LOD table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkState {
    Empty,
    HeightPending,
    HeightReady,
    MeshPending(usize),
    MeshReady(usize),
    Displayed(usize),
    HeightFailed,
}

/// Outcome of asking a chunk to show a LOD
#[derive(Debug, Clone)]
pub enum LodSwitch {
    /// Already showing that LOD
    Unchanged,
    /// Cached mesh is now displayed
    Switched(Arc<MeshData>),
    /// Slot moved to pending; the caller must submit the mesh computation
    Requested,
    /// Mesh already pending or failed; previous LOD stays on screen
    Waiting,
}

#[derive(Debug, Clone)]
pub struct Chunk {
    coord: ChunkCoord,
    epoch: u64,
    center: Vec2,
    bounds: Bounds2,
    height: HeightSlot,
    meshes: Vec<MeshSlot>,
    desired_lod: Option<usize>,
    displayed_lod: Option<usize>,
    visible: bool,
}

impl Chunk {
    pub fn new(coord: ChunkCoord, chunk_size: f32, lod_count: usize) -> Self {
        let center = coord.to_world_pos(chunk_size);
        Self {
            coord,
            epoch: 0,
            center,
            bounds: Bounds2::from_center_size(center, chunk_size),
            height: HeightSlot::Empty,
            meshes: vec![MeshSlot::Empty; lod_count],
            desired_lod: None,
            displayed_lod: None,
            visible: false,
        }
    }

    /// Tag results with the chunk instance they were requested for
    pub(crate) fn with_epoch(mut self, epoch: u64) -> Self {
        self.epoch = epoch;
        self
    }

    pub fn coord(&self) -> ChunkCoord {
        self.coord
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// World-space centre, also the noise sample origin
    pub fn center(&self) -> Vec2 {
        self.center
    }

    pub fn bounds(&self) -> Bounds2 {
        self.bounds
    }

    /// Distance from `observer` to the nearest point of the tile
    pub fn distance_to(&self, observer: Vec2) -> f32 {
        self.bounds.distance(observer)
    }

    pub fn height(&self) -> &HeightSlot {
        &self.height
    }

    pub fn height_grid(&self) -> Option<&Arc<HeightGrid>> {
        match &self.height {
            HeightSlot::Ready(grid) => Some(grid),
            _ => None,
        }
    }

    pub fn mesh(&self, lod_index: usize) -> Option<&MeshSlot> {
        self.meshes.get(lod_index)
    }

    pub fn displayed_lod(&self) -> Option<usize> {
        self.displayed_lod
    }

    pub fn displayed_mesh(&self) -> Option<&Arc<MeshData>> {
        match self.displayed_lod.and_then(|i| self.meshes.get(i)) {
            Some(MeshSlot::Ready(mesh)) => Some(mesh),
            _ => None,
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// A computation for this chunk is still in flight
    pub fn has_pending_work(&self) -> bool {
        matches!(self.height, HeightSlot::Pending)
            || self.meshes.iter().any(|m| matches!(m, MeshSlot::Pending))
    }

    pub fn state(&self) -> ChunkState {
        match &self.height {
            HeightSlot::Empty => ChunkState::Empty,
            HeightSlot::Pending => ChunkState::HeightPending,
            HeightSlot::Failed(_) => ChunkState::HeightFailed,
            HeightSlot::Ready(_) => {
                let shown = self.displayed_lod.map(ChunkState::Displayed);
                match self.desired_lod {
                    Some(lod) if self.displayed_lod == Some(lod) => ChunkState::Displayed(lod),
                    Some(lod) => match self.meshes.get(lod) {
                        Some(MeshSlot::Pending) => ChunkState::MeshPending(lod),
                        Some(MeshSlot::Ready(_)) => ChunkState::MeshReady(lod),
                        _ => shown.unwrap_or(ChunkState::HeightReady),
                    },
                    None => shown.unwrap_or(ChunkState::HeightReady),
                }
            }
        }
    }

    /// Returns false if the height was already requested
    pub(crate) fn request_height(&mut self) -> bool {
        if !matches!(self.height, HeightSlot::Empty) {
            return false;
        }
        self.height = HeightSlot::Pending;
        true
    }

    pub(crate) fn set_height(&mut self, result: Result<HeightGrid, String>) {
        self.height = match result {
            Ok(grid) => HeightSlot::Ready(Arc::new(grid)),
            Err(reason) => HeightSlot::Failed(reason),
        };
    }

    pub(crate) fn set_mesh(&mut self, lod_index: usize, result: Result<MeshData, String>) {
        if let Some(slot) = self.meshes.get_mut(lod_index) {
            *slot = match result {
                Ok(mesh) => MeshSlot::Ready(Arc::new(mesh)),
                Err(reason) => MeshSlot::Failed(reason),
            };
        }
    }

    /// Returns true when visibility changed
    pub(crate) fn set_visible(&mut self, visible: bool) -> bool {
        let changed = self.visible != visible;
        self.visible = visible;
        changed
    }

    /// Make `lod_index` the wanted LOD. Requires a ready height grid.
    pub(crate) fn switch_lod(&mut self, lod_index: usize) -> LodSwitch {
        let Some(slot) = self.meshes.get_mut(lod_index) else {
            return LodSwitch::Waiting;
        };
        self.desired_lod = Some(lod_index);
        if self.displayed_lod == Some(lod_index) {
            return LodSwitch::Unchanged;
        }
        match slot {
            MeshSlot::Ready(mesh) => {
                let mesh = Arc::clone(mesh);
                self.displayed_lod = Some(lod_index);
                LodSwitch::Switched(mesh)
            }
            MeshSlot::Empty => {
                *slot = MeshSlot::Pending;
                LodSwitch::Requested
            }
            MeshSlot::Pending | MeshSlot::Failed(_) => LodSwitch::Waiting,
        }
    }
}
