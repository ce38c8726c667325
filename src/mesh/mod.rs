//! Surface extraction interface and mesh data
//!
//! Extraction turns an immutable [`DensitySnapshot`] into zero or more
//! independently ownable [`MeshPiece`]s. Any triangulation can sit behind the
//! [`Mesher`] trait; [`SurfaceNetsMesher`] is the one shipped with the crate.

pub mod store;
pub mod surface_nets;

pub use store::MeshStore;
pub use surface_nets::SurfaceNetsMesher;

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use glam::{UVec3, Vec3};

use crate::core::Result;
use crate::voxel::chunk::ChunkCoord;

/// Read-only copy of a chunk's density field, taken at submission time
#[derive(Clone, Debug)]
pub struct DensitySnapshot {
    pub coord: ChunkCoord,
    /// Chunk revision the copy was taken at
    pub revision: u64,
    /// Sample points per axis
    pub size: UVec3,
    /// World size of one cell
    pub cell_size: Vec3,
    pub iso_level: f32,
    pub values: Arc<[f32]>,
}

impl DensitySnapshot {
    #[inline]
    pub fn value(&self, i: u32, j: u32, k: u32) -> f32 {
        let (sx, sy) = (self.size.x as usize, self.size.y as usize);
        self.values[i as usize + j as usize * sx + k as usize * sx * sy]
    }
}

/// GPU-ready vertex
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct MeshVertex {
    /// Chunk-local position
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

/// One independently uploadable geometry buffer
#[derive(Clone, Debug, Default)]
pub struct MeshPiece {
    pub vertices: Vec<MeshVertex>,
    pub indices: Vec<u32>,
}

impl MeshPiece {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Raw vertex bytes for buffer upload
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }
}

/// The complete extracted geometry of one chunk at one revision
#[derive(Clone, Debug)]
pub struct ChunkMesh {
    pub coord: ChunkCoord,
    pub revision: u64,
    pub pieces: Vec<MeshPiece>,
}

impl ChunkMesh {
    pub fn triangle_count(&self) -> usize {
        self.pieces.iter().map(MeshPiece::triangle_count).sum()
    }
}

/// Converts a density snapshot into renderable pieces.
///
/// Implementations run on background workers and must not panic on any field
/// whose values lie in [-1, 1].
pub trait Mesher: Send + Sync {
    fn extract(&self, snapshot: &DensitySnapshot) -> Result<Vec<MeshPiece>>;
}

impl<M: Mesher + ?Sized> Mesher for Arc<M> {
    fn extract(&self, snapshot: &DensitySnapshot) -> Result<Vec<MeshPiece>> {
        (**self).extract(snapshot)
    }
}
