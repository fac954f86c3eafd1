use crate::renderer::mesh::MeshData;
use crate::world::generation::HeightGrid;
use crate::world::ChunkCoord;

/// Receives the artifacts the streamer produces. Rendering back ends implement
/// this to upload meshes and toggle tile visibility; every method defaults to a no-op.
///
/// Called only from the control loop, during `ChunkStreamer::tick`.
pub trait RenderSink: Send {
    /// A tile's height grid has arrived (e.g. to build a colour texture)
    fn height_ready(&mut self, _coord: ChunkCoord, _grid: &HeightGrid) {}

    /// A tile switched to displaying `mesh`
    fn mesh_displayed(&mut self, _coord: ChunkCoord, _mesh: &MeshData) {}

    fn visibility_changed(&mut self, _coord: ChunkCoord, _visible: bool) {}

    /// The tile was dropped from the index; release anything held for it
    fn chunk_evicted(&mut self, _coord: ChunkCoord) {}
}

/// Sink that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl RenderSink for NullSink {}
