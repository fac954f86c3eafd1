//! Endless procedural terrain
//!
//! Generates a deterministic fractal height field, meshes it per tile at a
//! distance-dependent level of detail, and streams tiles around a moving
//! observer. Height and mesh work runs on a bounded worker pool; results are
//! applied on the caller's thread once per `ChunkStreamer::tick`.

pub mod config;
pub mod constants;
pub mod error;
pub mod renderer;
pub mod thread_pool;
pub mod world;

pub use config::{MeshConfig, StreamingConfig, TerrainConfig, TerrainSettings, WorkerConfig};
pub use error::{ComputeError, TerrainError, TerrainResult};
pub use renderer::{
    build_terrain_mesh, HeightCurve, KeyframeCurve, LinearCurve, MeshData, NullSink, RenderSink,
    TerrainVertex, VertexRef,
};
pub use thread_pool::{AsyncComputeQueue, WorkerPool, WorkerPoolConfig};
pub use world::generation::{
    generate_height_grid, generate_noise_map, FalloffMap, HeightBias, HeightGrid, NoiseConfig,
    NormalizeMode,
};
pub use world::{
    Bounds2, Chunk, ChunkCoord, ChunkState, ChunkStreamer, LodLevel, LodTable, ObserverState,
    StreamerStats, TickReport,
};
