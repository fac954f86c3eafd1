//! Mesh construction and the hand-off to rendering back ends

mod height_curve;
mod mesh;
mod mesh_builder;
mod sink;

pub use height_curve::{HeightCurve, KeyframeCurve, LinearCurve};
pub use mesh::{MeshData, TerrainVertex, VertexRef};
pub use mesh_builder::{build_terrain_mesh, check_lod_compatible, lod_step, vertices_per_line};
pub use sink::{NullSink, RenderSink};
