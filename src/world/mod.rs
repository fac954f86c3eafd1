//! Terrain world: tile coordinates, height generation and chunk streaming
//!
//! - **generation**: noise field, falloff mask and bordered height grids
//! - **lod**: distance thresholds and LOD selection
//! - **chunk**: one tile with its cached height grid and per-LOD meshes
//! - **chunk_streamer**: keeps the tiles around the observer built and visible

pub mod chunk;
pub mod chunk_streamer;
pub mod generation;
pub mod lod;
pub mod position;

pub use chunk::{Chunk, ChunkState, HeightSlot, LodSwitch, MeshSlot};
pub use chunk_streamer::{ChunkStreamer, ObserverState, StreamerStats, StreamingContext, TickReport};
pub use lod::{LodLevel, LodTable};
pub use position::{Bounds2, ChunkCoord};
