//! Mesh buffers and the packed GPU vertex

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};

/// Interleaved vertex layout handed to GPU upload sinks
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct TerrainVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl TerrainVertex {
    pub fn new(position: Vec3, normal: Vec3, uv: Vec2) -> Self {
        Self {
            position: position.to_array(),
            normal: normal.to_array(),
            uv: uv.to_array(),
        }
    }
}

/// Where a lattice vertex lives: the emitted vertex arrays or the border buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexRef {
    Interior(u32),
    Border(u32),
}

impl VertexRef {
    pub fn interior(self) -> Option<u32> {
        match self {
            VertexRef::Interior(i) => Some(i),
            VertexRef::Border(_) => None,
        }
    }
}

/// One tile mesh at one level of detail.
///
/// `positions`, `uvs`, `normals` and `indices` are what gets rendered.
/// `border_positions` and `border_triangles` only exist so edge normals see the
/// neighbouring slope; they are never part of the index buffer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    pub lod: u32,
    pub positions: Vec<Vec3>,
    pub uvs: Vec<Vec2>,
    pub normals: Vec<Vec3>,
    pub indices: Vec<u32>,
    pub border_positions: Vec<Vec3>,
    pub border_triangles: Vec<[VertexRef; 3]>,
}

impl MeshData {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Whether every index is in range and the index count is a multiple of 3
    pub fn is_consistent(&self) -> bool {
        let n = self.positions.len();
        self.indices.len() % 3 == 0
            && self.indices.iter().all(|&i| (i as usize) < n)
            && self.uvs.len() == n
            && self.normals.len() == n
    }

    pub fn position(&self, vertex: VertexRef) -> Vec3 {
        match vertex {
            VertexRef::Interior(i) => self.positions[i as usize],
            VertexRef::Border(i) => self.border_positions[i as usize],
        }
    }

    /// Interleave positions, normals and UVs for upload
    pub fn vertices(&self) -> Vec<TerrainVertex> {
        self.positions
            .iter()
            .zip(&self.normals)
            .zip(&self.uvs)
            .map(|((&p, &n), &uv)| TerrainVertex::new(p, n, uv))
            .collect()
    }

    /// Vertex data as raw bytes, ready for a vertex buffer
    pub fn vertex_bytes(&self) -> Vec<u8> {
        bytemuck::cast_slice(&self.vertices()).to_vec()
    }

    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }
}
