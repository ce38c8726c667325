//! Chunked density grid and the world/chunk/voxel coordinate transforms

use std::sync::Arc;

use glam::{UVec3, Vec3};
use serde::{Deserialize, Serialize};

use crate::core::{Error, Result};
use crate::math::Aabb;
use crate::mesh::DensitySnapshot;

/// Lower bound of a density sample
pub const DENSITY_MIN: f32 = -1.0;
/// Upper bound of a density sample
pub const DENSITY_MAX: f32 = 1.0;

/// Integer coordinate identifying a chunk in the level grid
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkCoord {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl ChunkCoord {
    /// Create a new chunk coordinate
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Convert world position to chunk coordinate
    pub fn from_world_pos(pos: Vec3, chunk_size: Vec3) -> Self {
        let c = (pos / chunk_size).floor();
        Self {
            x: c.x as i32,
            y: c.y as i32,
            z: c.z as i32,
        }
    }

    /// Get the world-space origin (minimum corner) of this chunk
    pub fn world_origin(&self, chunk_size: Vec3) -> Vec3 {
        Vec3::new(self.x as f32, self.y as f32, self.z as f32) * chunk_size
    }

    /// Integer position as a float vector (noise-domain offset)
    pub fn as_vec3(&self) -> Vec3 {
        Vec3::new(self.x as f32, self.y as f32, self.z as f32)
    }
}

/// Geometry shared by every chunk of a level.
///
/// Derived once from the level extents and threaded to generation and editing;
/// it never changes while the level lives.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VoxelSpace {
    /// World size of one chunk
    pub chunk_size: Vec3,
    /// World size of one voxel cell
    pub voxel_size: Vec3,
    /// Cells per chunk along each axis
    pub voxel_grid: UVec3,
    /// Iso value separating solid (below) from empty
    pub surface_level: f32,
}

impl VoxelSpace {
    /// Derive chunk and voxel sizes from level extents
    pub fn new(level_size: Vec3, chunk_grid: UVec3, voxel_grid: UVec3, surface_level: f32) -> Self {
        let chunk_size = level_size / chunk_grid.as_vec3();
        let voxel_size = chunk_size / voxel_grid.as_vec3();
        Self {
            chunk_size,
            voxel_size,
            voxel_grid,
            surface_level,
        }
    }

    /// Sample points per chunk axis (cells + 1)
    pub fn samples_per_chunk(&self) -> UVec3 {
        self.voxel_grid + UVec3::ONE
    }
}

/// One chunk's density field: a dense grid of samples in [-1, 1].
///
/// Samples are stored x-fastest: `index = i + j * size.x + k * size.x * size.y`.
/// The grid is allocated once and never resized.
#[derive(Clone, Debug)]
pub struct DensityChunk {
    coord: ChunkCoord,
    origin: Vec3,
    voxel_size: Vec3,
    size: UVec3,
    values: Vec<f32>,
    revision: u64,
}

impl DensityChunk {
    /// Allocate a zero-filled chunk at the given grid coordinate
    pub fn new(coord: ChunkCoord, space: &VoxelSpace) -> Self {
        let size = space.samples_per_chunk();
        let len = size.x as usize * size.y as usize * size.z as usize;
        Self {
            coord,
            origin: coord.world_origin(space.chunk_size),
            voxel_size: space.voxel_size,
            size,
            values: vec![0.0; len],
            revision: 0,
        }
    }

    pub fn coord(&self) -> ChunkCoord {
        self.coord
    }

    /// World-space minimum corner
    pub fn origin(&self) -> Vec3 {
        self.origin
    }

    /// Sample points per axis
    pub fn size(&self) -> UVec3 {
        self.size
    }

    pub fn voxel_size(&self) -> Vec3 {
        self.voxel_size
    }

    /// Incremented by every mutating batch (generation pass, stamp or edit)
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Flatten (i, j, k); `None` when outside the grid
    pub fn index(&self, i: u32, j: u32, k: u32) -> Option<usize> {
        if i < self.size.x && j < self.size.y && k < self.size.z {
            Some(self.flat_index(i, j, k))
        } else {
            None
        }
    }

    #[inline]
    pub(crate) fn flat_index(&self, i: u32, j: u32, k: u32) -> usize {
        debug_assert!(i < self.size.x && j < self.size.y && k < self.size.z);
        let (sx, sy) = (self.size.x as usize, self.size.y as usize);
        i as usize + j as usize * sx + k as usize * sx * sy
    }

    /// Inverse of the flattening
    pub fn coords_of(&self, index: usize) -> UVec3 {
        let (sx, sy) = (self.size.x as usize, self.size.y as usize);
        let layer = sx * sy;
        UVec3::new((index % sx) as u32, ((index % layer) / sx) as u32, (index / layer) as u32)
    }

    pub fn value_at(&self, i: u32, j: u32, k: u32) -> Result<f32> {
        self.index(i, j, k)
            .map(|index| self.values[index])
            .ok_or(Error::OutOfRange { index: UVec3::new(i, j, k), size: self.size })
    }

    /// Write a sample, clamped to [-1, 1]
    pub fn set_value_at(&mut self, i: u32, j: u32, k: u32, value: f32) -> Result<()> {
        let index = self
            .index(i, j, k)
            .ok_or(Error::OutOfRange { index: UVec3::new(i, j, k), size: self.size })?;
        self.set_index(index, value);
        self.revision += 1;
        Ok(())
    }

    #[inline]
    pub(crate) fn get_index(&self, index: usize) -> f32 {
        self.values[index]
    }

    #[inline]
    pub(crate) fn set_index(&mut self, index: usize, value: f32) {
        self.values[index] = value.clamp(DENSITY_MIN, DENSITY_MAX);
    }

    pub(crate) fn bump_revision(&mut self) {
        self.revision += 1;
    }

    /// World space to chunk-local space
    pub fn world_to_local(&self, p: Vec3) -> Vec3 {
        p - self.origin
    }

    /// Chunk-local space to fractional voxel coordinates
    pub fn local_to_voxel_space(&self, p: Vec3) -> Vec3 {
        p / self.voxel_size
    }

    /// Chunk-local position of a sample point
    #[inline]
    pub fn voxel_local_position(&self, i: u32, j: u32, k: u32) -> Vec3 {
        UVec3::new(i, j, k).as_vec3() * self.voxel_size
    }

    pub fn voxel_world_position(&self, i: u32, j: u32, k: u32) -> Vec3 {
        self.origin + self.voxel_local_position(i, j, k)
    }

    /// World bounds spanned by the sample points
    pub fn world_bounds(&self) -> Aabb {
        let extent = (self.size - UVec3::ONE).as_vec3() * self.voxel_size;
        Aabb::new(self.origin, self.origin + extent)
    }

    /// Inclusive index range of samples that may lie inside a local-space box.
    ///
    /// The range is conservative; callers still test each sample exactly.
    pub fn voxel_range(&self, local_min: Vec3, local_max: Vec3) -> Option<(UVec3, UVec3)> {
        let last = (self.size - UVec3::ONE).as_vec3();
        let lo = self.local_to_voxel_space(local_min).floor().max(Vec3::ZERO);
        let hi = self.local_to_voxel_space(local_max).ceil().min(last);
        if lo.x > hi.x || lo.y > hi.y || lo.z > hi.z {
            return None;
        }
        Some((lo.as_uvec3(), hi.as_uvec3()))
    }

    /// Trilinear sample at a fractional voxel coordinate, clamped to the grid
    pub fn sample_voxel_space(&self, v: Vec3) -> f32 {
        let last = (self.size - UVec3::ONE).as_vec3();
        let v = v.clamp(Vec3::ZERO, last);
        let base = v.floor();
        let t = v - base;
        let b = base.as_uvec3();
        let n = (b + UVec3::ONE).min(self.size - UVec3::ONE);

        let at = |i: u32, j: u32, k: u32| self.values[self.flat_index(i, j, k)];
        let x00 = at(b.x, b.y, b.z) + (at(n.x, b.y, b.z) - at(b.x, b.y, b.z)) * t.x;
        let x10 = at(b.x, n.y, b.z) + (at(n.x, n.y, b.z) - at(b.x, n.y, b.z)) * t.x;
        let x01 = at(b.x, b.y, n.z) + (at(n.x, b.y, n.z) - at(b.x, b.y, n.z)) * t.x;
        let x11 = at(b.x, n.y, n.z) + (at(n.x, n.y, n.z) - at(b.x, n.y, n.z)) * t.x;
        let y0 = x00 + (x10 - x00) * t.y;
        let y1 = x01 + (x11 - x01) * t.y;
        y0 + (y1 - y0) * t.z
    }

    /// Lowest and highest sample value
    pub fn min_max(&self) -> (f32, f32) {
        self.values
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)))
    }

    /// Immutable copy of the field for extraction off the main loop
    pub fn snapshot(&self, iso_level: f32) -> DensitySnapshot {
        DensitySnapshot {
            coord: self.coord,
            revision: self.revision,
            size: self.size,
            cell_size: self.voxel_size,
            iso_level,
            values: Arc::from(self.values.as_slice()),
        }
    }
}
