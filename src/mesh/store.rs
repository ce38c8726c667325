//! Displayed geometry per chunk, swapped whole on every completed extraction.

use std::collections::HashMap;
use std::sync::Arc;

use super::ChunkMesh;
use crate::voxel::chunk::ChunkCoord;

/// Latest completed mesh for every chunk.
///
/// Readers clone the `Arc`, so a reader never observes a half-replaced mesh.
#[derive(Debug, Default)]
pub struct MeshStore {
    meshes: HashMap<ChunkCoord, Arc<ChunkMesh>>,
}

impl MeshStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace a chunk's mesh, returning the previous one
    pub fn replace(&mut self, mesh: ChunkMesh) -> Option<Arc<ChunkMesh>> {
        self.meshes.insert(mesh.coord, Arc::new(mesh))
    }

    pub fn get(&self, coord: ChunkCoord) -> Option<Arc<ChunkMesh>> {
        self.meshes.get(&coord).cloned()
    }

    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }

    pub fn total_triangles(&self) -> usize {
        self.meshes.values().map(|m| m.triangle_count()).sum()
    }

    pub fn clear(&mut self) {
        self.meshes.clear();
    }
}
