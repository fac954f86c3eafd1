//! Height grid to tile mesh
//!
//! Vertices are taken from a lattice over the grid interior with spacing
//! `lod_step(lod)`. The grid's outer ring becomes a ring of border vertices that
//! take part in normal accumulation only, so edge normals see the neighbouring
//! slope without the two meshes ever meeting.
//!
//! Above LOD 0 the lattice neighbours of an edge vertex are `step` cells away
//! while the border ring is one cell away, so accumulated edge normals would
//! differ from the neighbour's. Edge vertices therefore take the full-detail
//! normal from the cells at ±1, which both tiles hold. Edge normals then match
//! across the seam at every LOD, including between tiles at different LODs.

use glam::{Vec2, Vec3};

use super::height_curve::HeightCurve;
use super::mesh::{MeshData, VertexRef};
use crate::error::{TerrainError, TerrainResult};
use crate::world::generation::HeightGrid;

/// Lattice spacing for a LOD: 1 at full detail, `2 * lod` otherwise
pub fn lod_step(lod: u32) -> usize {
    if lod == 0 {
        1
    } else {
        lod as usize * 2
    }
}

/// Vertices along one tile edge at the given LOD
pub fn vertices_per_line(tile_resolution: usize, lod: u32) -> usize {
    (tile_resolution.saturating_sub(1)) / lod_step(lod) + 1
}

/// Fails when the LOD lattice does not land exactly on the last interior cell
pub fn check_lod_compatible(tile_resolution: usize, lod: u32) -> TerrainResult<()> {
    let step = lod_step(lod);
    if tile_resolution == 0 || (tile_resolution - 1) % step != 0 {
        return Err(TerrainError::IncompatibleLod {
            lod,
            step,
            tile_resolution,
        });
    }
    Ok(())
}

/// Build the mesh for `grid` at `lod`.
///
/// Heights are `curve(sample) * height_multiplier`. The mesh is centred on the
/// tile origin and covers the same footprint at every LOD.
pub fn build_terrain_mesh(
    grid: &HeightGrid,
    height_multiplier: f32,
    curve: &dyn HeightCurve,
    lod: u32,
) -> TerrainResult<MeshData> {
    if !grid.is_square() {
        return Err(TerrainError::invalid_config(
            "height_grid",
            format!("grid must be square, got {}x{}", grid.width(), grid.height()),
        ));
    }
    if grid.width() < 3 {
        return Err(TerrainError::GridTooSmall { size: grid.width() });
    }

    let mesh_size = grid.interior_size();
    check_lod_compatible(mesh_size, lod)?;
    let step = lod_step(lod);

    // Grid indices sampled along one axis: border, interior lattice, border
    let lattice: Vec<usize> = std::iter::once(0)
        .chain((0..vertices_per_line(mesh_size, lod)).map(|k| 1 + k * step))
        .chain(std::iter::once(mesh_size + 1))
        .collect();
    let line = lattice.len();

    let top_left_x = (mesh_size as f32 - 1.0) * -0.5;
    let top_left_z = (mesh_size as f32 - 1.0) * 0.5;
    let size = mesh_size as f32;

    let interior_per_line = line - 2;
    let mut mesh = MeshData {
        lod,
        positions: Vec::with_capacity(interior_per_line * interior_per_line),
        uvs: Vec::with_capacity(interior_per_line * interior_per_line),
        indices: Vec::with_capacity((interior_per_line - 1).pow(2) * 6),
        border_positions: Vec::with_capacity(line * 4),
        ..MeshData::default()
    };

    let mut refs = Vec::with_capacity(line * line);
    for (j, &gy) in lattice.iter().enumerate() {
        for (i, &gx) in lattice.iter().enumerate() {
            let percent = Vec2::new(
                (gx as f32 - 1.0) / size,
                (gy as f32 - 1.0) / size,
            );
            let height = curve.evaluate(grid.get(gx, gy)) * height_multiplier;
            let position = Vec3::new(
                top_left_x + percent.x * size,
                height,
                top_left_z - percent.y * size,
            );

            let is_border = i == 0 || j == 0 || i == line - 1 || j == line - 1;
            if is_border {
                refs.push(VertexRef::Border(mesh.border_positions.len() as u32));
                mesh.border_positions.push(position);
            } else {
                refs.push(VertexRef::Interior(mesh.positions.len() as u32));
                mesh.positions.push(position);
                mesh.uvs.push(percent);
            }
        }
    }

    for j in 0..line - 1 {
        for i in 0..line - 1 {
            let a = refs[j * line + i];
            let b = refs[j * line + i + 1];
            let c = refs[(j + 1) * line + i];
            let d = refs[(j + 1) * line + i + 1];
            add_triangle(&mut mesh, [a, d, c]);
            add_triangle(&mut mesh, [d, a, b]);
        }
    }

    mesh.normals = bake_normals(&mesh);

    if step > 1 {
        let height_at = |gx: usize, gy: usize| curve.evaluate(grid.get(gx, gy)) * height_multiplier;
        let last = line - 2;
        for j in 1..=last {
            for i in 1..=last {
                if i != 1 && j != 1 && i != last && j != last {
                    continue;
                }
                if let VertexRef::Interior(v) = refs[j * line + i] {
                    mesh.normals[v as usize] = full_detail_normal(&height_at, lattice[i], lattice[j]);
                }
            }
        }
    }

    Ok(mesh)
}

fn add_triangle(mesh: &mut MeshData, triangle: [VertexRef; 3]) {
    match triangle.map(VertexRef::interior) {
        [Some(a), Some(b), Some(c)] => mesh.indices.extend_from_slice(&[a, b, c]),
        _ => mesh.border_triangles.push(triangle),
    }
}

/// Area-weighted vertex normals over interior and border triangles
fn bake_normals(mesh: &MeshData) -> Vec<Vec3> {
    let mut normals = vec![Vec3::ZERO; mesh.positions.len()];

    for tri in mesh.indices.chunks_exact(3) {
        let triangle = [
            VertexRef::Interior(tri[0]),
            VertexRef::Interior(tri[1]),
            VertexRef::Interior(tri[2]),
        ];
        let normal = surface_normal(mesh, triangle);
        for &i in tri {
            normals[i as usize] += normal;
        }
    }

    for &triangle in &mesh.border_triangles {
        let normal = surface_normal(mesh, triangle);
        for vertex in triangle {
            if let VertexRef::Interior(i) = vertex {
                normals[i as usize] += normal;
            }
        }
    }

    normals.into_iter().map(Vec3::normalize_or_zero).collect()
}

/// Area-weighted normal of grid cell `(gx, gy)` over the six LOD 0 triangles
/// that touch it. Needs `1 <= gx, gy <= N`.
fn full_detail_normal(height_at: &impl Fn(usize, usize) -> f32, gx: usize, gy: usize) -> Vec3 {
    let point = |(x, y): (usize, usize)| Vec3::new(x as f32, height_at(x, y), -(y as f32));
    let target = (gx, gy);

    let mut normal = Vec3::ZERO;
    for cy in gy - 1..=gy {
        for cx in gx - 1..=gx {
            let a = (cx, cy);
            let b = (cx + 1, cy);
            let c = (cx, cy + 1);
            let d = (cx + 1, cy + 1);
            for triangle in [[a, d, c], [d, a, b]] {
                if triangle.contains(&target) {
                    let [pa, pb, pc] = triangle.map(point);
                    normal += (pb - pa).cross(pc - pa);
                }
            }
        }
    }
    normal.normalize_or_zero()
}

fn surface_normal(mesh: &MeshData, [a, b, c]: [VertexRef; 3]) -> Vec3 {
    let pa = mesh.position(a);
    let pb = mesh.position(b);
    let pc = mesh.position(c);
    (pb - pa).cross(pc - pa)
}
