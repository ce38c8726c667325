//! Naive surface nets over a density snapshot.
//!
//! One vertex per cell that straddles the iso level, placed at the mean of its
//! edge crossings; one quad per grid edge with a sign change. Quads are emitted
//! with their own four vertices so output can be split into pieces at any
//! quad boundary.
//!
//! Only edges with four cells around them inside the snapshot produce quads,
//! so a chunk's surface ends half a cell inside each of its faces. Neighbouring
//! chunks share their boundary samples but not the cells across them: closing
//! the one-cell seam between two chunk meshes needs samples from both and is
//! left to the caller.

use glam::{UVec3, Vec3};

use super::{DensitySnapshot, MeshPiece, MeshVertex, Mesher};
use crate::core::{Error, Result};

/// Corner pairs forming the 12 cell edges, corners indexed by bit (x=1, y=2, z=4)
const CELL_EDGES: [(usize, usize); 12] = [
    (0, 1), (2, 3), (4, 5), (6, 7),
    (0, 2), (1, 3), (4, 6), (5, 7),
    (0, 4), (1, 5), (2, 6), (3, 7),
];

/// Reference mesher used by the tooling and tests
#[derive(Clone, Debug)]
pub struct SurfaceNetsMesher {
    /// Vertex budget per piece (16-bit index friendly by default)
    pub max_vertices_per_piece: usize,
}

impl Default for SurfaceNetsMesher {
    fn default() -> Self {
        Self {
            max_vertices_per_piece: u16::MAX as usize,
        }
    }
}

struct CellVertex {
    position: Vec3,
    normal: Vec3,
}

impl SurfaceNetsMesher {
    pub fn new(max_vertices_per_piece: usize) -> Self {
        Self { max_vertices_per_piece }
    }

    fn cell_vertex(snapshot: &DensitySnapshot, cell: UVec3) -> Option<CellVertex> {
        let mut corners = [0.0f32; 8];
        let mut solid_mask = 0u8;
        for (c, value) in corners.iter_mut().enumerate() {
            let offset = UVec3::new(c as u32 & 1, (c as u32 >> 1) & 1, (c as u32 >> 2) & 1);
            let p = cell + offset;
            *value = snapshot.value(p.x, p.y, p.z);
            if *value < snapshot.iso_level {
                solid_mask |= 1 << c;
            }
        }
        if solid_mask == 0 || solid_mask == 0xFF {
            return None;
        }

        let corner_offset = |c: usize| Vec3::new((c & 1) as f32, ((c >> 1) & 1) as f32, ((c >> 2) & 1) as f32);

        let mut sum = Vec3::ZERO;
        let mut crossings = 0;
        for &(a, b) in &CELL_EDGES {
            let (va, vb) = (corners[a], corners[b]);
            if (va < snapshot.iso_level) == (vb < snapshot.iso_level) {
                continue;
            }
            let t = ((snapshot.iso_level - va) / (vb - va)).clamp(0.0, 1.0);
            sum += corner_offset(a).lerp(corner_offset(b), t);
            crossings += 1;
        }
        let local = sum / crossings as f32;

        // Density grows toward empty space, so the gradient points outward
        let mut gradient = Vec3::ZERO;
        for (c, &value) in corners.iter().enumerate() {
            let sign = corner_offset(c) * 2.0 - Vec3::ONE;
            gradient += sign * value;
        }

        Some(CellVertex {
            position: (cell.as_vec3() + local) * snapshot.cell_size,
            normal: gradient.normalize_or_zero(),
        })
    }
}

impl Mesher for SurfaceNetsMesher {
    fn extract(&self, snapshot: &DensitySnapshot) -> Result<Vec<MeshPiece>> {
        let size = snapshot.size;
        let expected = size.x as usize * size.y as usize * size.z as usize;
        if snapshot.values.len() != expected {
            return Err(Error::Extraction {
                coord: snapshot.coord,
                reason: format!("expected {} samples, got {}", expected, snapshot.values.len()),
            });
        }
        if self.max_vertices_per_piece < 4 {
            return Err(Error::Extraction {
                coord: snapshot.coord,
                reason: "vertex budget per piece must hold at least one quad".to_string(),
            });
        }
        if size.min_element() < 2 {
            return Ok(Vec::new());
        }

        let cells = size - UVec3::ONE;
        let cell_index = |c: UVec3| (c.x + c.y * cells.x + c.z * cells.x * cells.y) as usize;

        let mut cell_vertices: Vec<Option<CellVertex>> = Vec::with_capacity((cells.x * cells.y * cells.z) as usize);
        for k in 0..cells.z {
            for j in 0..cells.y {
                for i in 0..cells.x {
                    cell_vertices.push(Self::cell_vertex(snapshot, UVec3::new(i, j, k)));
                }
            }
        }

        let mut pieces = Vec::new();
        let mut current = MeshPiece::default();
        let axes = [UVec3::X, UVec3::Y, UVec3::Z];

        for k in 0..size.z {
            for j in 0..size.y {
                for i in 0..size.x {
                    let p = UVec3::new(i, j, k);
                    for axis in 0..3 {
                        let (b, c) = ((axis + 1) % 3, (axis + 2) % 3);
                        // Edge must end inside the grid and be shared by four cells
                        if p[axis] + 1 >= size[axis]
                            || p[b] == 0 || p[c] == 0
                            || p[b] + 1 >= size[b] || p[c] + 1 >= size[c]
                        {
                            continue;
                        }
                        let q = p + axes[axis];
                        let start_solid = snapshot.value(p.x, p.y, p.z) < snapshot.iso_level;
                        let end_solid = snapshot.value(q.x, q.y, q.z) < snapshot.iso_level;
                        if start_solid == end_solid {
                            continue;
                        }

                        let quad_cells = [p - axes[b] - axes[c], p - axes[c], p, p - axes[b]];
                        let ordered = if start_solid {
                            quad_cells
                        } else {
                            [quad_cells[0], quad_cells[3], quad_cells[2], quad_cells[1]]
                        };

                        if current.vertices.len() + 4 > self.max_vertices_per_piece {
                            pieces.push(std::mem::take(&mut current));
                        }
                        let base = current.vertices.len() as u32;
                        for cell in ordered {
                            // Every cell around a sign-changing edge straddles the surface
                            let Some(v) = cell_vertices[cell_index(cell)].as_ref() else {
                                return Err(Error::Extraction {
                                    coord: snapshot.coord,
                                    reason: format!("cell {cell} has no surface vertex"),
                                });
                            };
                            current.vertices.push(MeshVertex {
                                position: v.position.to_array(),
                                normal: v.normal.to_array(),
                            });
                        }
                        current.indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
                    }
                }
            }
        }

        if !current.is_empty() {
            pieces.push(current);
        }
        Ok(pieces)
    }
}
