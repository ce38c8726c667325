//! The level: every density chunk on a regular 3D grid

use std::time::Instant;

use glam::{UVec2, UVec3, Vec3};
use rayon::prelude::*;

use super::config::{LevelConfig, StampConfig};
use super::generator::{self, ChunkGenerator};
use super::noise_field::NoiseField;
use crate::core::Result;
use crate::math::Aabb;
use crate::voxel::chunk::{ChunkCoord, DensityChunk, VoxelSpace};
use crate::voxel::edit::queue::RemeshQueue;

/// Owns all chunks of a generated level.
///
/// Chunks are stored x-fastest, then y, then z, the same flattening used for
/// samples inside a chunk. Chunk and voxel sizes are fixed for the lifetime of
/// the level; changing extents means generating a new one.
pub struct LevelGrid {
    config: LevelConfig,
    space: VoxelSpace,
    chunk_grid: UVec3,
    chunks: Vec<DensityChunk>,
}

impl LevelGrid {
    /// Generate every chunk and submit each one for extraction.
    ///
    /// The noise field is reseeded from `config.seed` first, so identical
    /// configs give bit-identical fields. Any work left in `queue` from a
    /// previous level is drained and its meshes discarded.
    pub fn generate<N: NoiseField + ?Sized>(
        config: LevelConfig,
        noise: &mut N,
        queue: &mut RemeshQueue,
    ) -> Result<Self> {
        config.validate()?;

        let start = Instant::now();
        let space = config.space();
        let chunk_grid = config.chunk_grid_size();
        let count = chunk_grid.x as usize * chunk_grid.y as usize * chunk_grid.z as usize;

        noise.reseed(config.seed);
        let noise: &N = noise;
        let generator = ChunkGenerator::new(noise);

        let chunks = (0..count)
            .into_par_iter()
            .map(|index| -> Result<DensityChunk> {
                let coord = coord_from_index(index, chunk_grid);
                let mut chunk = DensityChunk::new(coord, &space);
                generator.generate_base(&mut chunk, config.frequency, config.octaves);
                if let Some(ground) = config.ground_level {
                    generator.apply_ground_level(&mut chunk, ground, config.ground_octaves);
                }
                for stamp in &config.stamps {
                    apply_stamp(&mut chunk, stamp, space.surface_level)?;
                }
                log::debug!("Generated chunk {:?} (revision {})", coord, chunk.revision());
                Ok(chunk)
            })
            .collect::<Result<Vec<_>>>()?;

        queue.clear();
        for chunk in &chunks {
            queue.submit(chunk.snapshot(space.surface_level));
        }

        let samples = chunks.first().map_or(0, DensityChunk::len);
        log::info!(
            "Generated {} chunks ({} samples each, seed {}) in {:.2?}",
            chunks.len(),
            samples,
            config.seed,
            start.elapsed()
        );

        Ok(Self {
            config,
            space,
            chunk_grid,
            chunks,
        })
    }

    /// Generate from explicit extents with the remaining settings at their defaults
    pub fn generate_level<N: NoiseField + ?Sized>(
        level_size: Vec3,
        chunk_grid: UVec3,
        voxel_grid: UVec3,
        surface_level: f32,
        seed: u32,
        noise: &mut N,
        queue: &mut RemeshQueue,
    ) -> Result<Self> {
        let config = LevelConfig {
            level_size: level_size.to_array(),
            chunk_grid: chunk_grid.to_array(),
            voxel_grid: voxel_grid.to_array(),
            surface_level,
            seed,
            ..Default::default()
        };
        Self::generate(config, noise, queue)
    }

    /// A level one chunk tall, tiled over x and z
    pub fn generate_xz<N: NoiseField + ?Sized>(
        level_size: Vec3,
        chunk_grid_xz: UVec2,
        voxel_grid: UVec3,
        surface_level: f32,
        seed: u32,
        noise: &mut N,
        queue: &mut RemeshQueue,
    ) -> Result<Self> {
        let chunk_grid = UVec3::new(chunk_grid_xz.x, 1, chunk_grid_xz.y);
        Self::generate_level(level_size, chunk_grid, voxel_grid, surface_level, seed, noise, queue)
    }

    pub fn config(&self) -> &LevelConfig {
        &self.config
    }

    pub fn space(&self) -> &VoxelSpace {
        &self.space
    }

    pub fn chunk_grid_size(&self) -> UVec3 {
        self.chunk_grid
    }

    pub fn chunk_size(&self) -> Vec3 {
        self.space.chunk_size
    }

    pub fn voxel_size(&self) -> Vec3 {
        self.space.voxel_size
    }

    pub fn surface_level(&self) -> f32 {
        self.space.surface_level
    }

    pub fn chunks(&self) -> &[DensityChunk] {
        &self.chunks
    }

    pub fn chunks_mut(&mut self) -> &mut [DensityChunk] {
        &mut self.chunks
    }

    /// Flattened index of a chunk; `None` outside the grid
    pub fn chunk_index(&self, coord: ChunkCoord) -> Option<usize> {
        let g = self.chunk_grid;
        let x = u32::try_from(coord.x).ok().filter(|&x| x < g.x)? as usize;
        let y = u32::try_from(coord.y).ok().filter(|&y| y < g.y)? as usize;
        let z = u32::try_from(coord.z).ok().filter(|&z| z < g.z)? as usize;
        Some(x + y * g.x as usize + z * g.x as usize * g.y as usize)
    }

    pub fn chunk(&self, coord: ChunkCoord) -> Option<&DensityChunk> {
        self.chunk_index(coord).map(|index| &self.chunks[index])
    }

    pub fn chunk_mut(&mut self, coord: ChunkCoord) -> Option<&mut DensityChunk> {
        self.chunk_index(coord).map(move |index| &mut self.chunks[index])
    }

    pub fn chunk_bounds(&self, coord: ChunkCoord) -> Option<Aabb> {
        self.chunk(coord).map(DensityChunk::world_bounds)
    }

    /// World bounds of the whole level
    pub fn level_bounds(&self) -> Aabb {
        Aabb::new(Vec3::ZERO, self.chunk_grid.as_vec3() * self.space.chunk_size)
    }

    /// Chunk containing a world position. Points on the far faces of the level
    /// belong to the last chunk along that axis.
    pub fn coord_at_world(&self, p: Vec3) -> Option<ChunkCoord> {
        if !self.level_bounds().contains_point(p) {
            return None;
        }
        let last = self.chunk_grid.as_ivec3() - 1;
        let c = ChunkCoord::from_world_pos(p, self.space.chunk_size);
        Some(ChunkCoord::new(c.x.min(last.x), c.y.min(last.y), c.z.min(last.z)))
    }

    /// Chunks whose sample bounds touch a world-space sphere, in storage order
    pub fn chunks_overlapping_sphere(&self, center: Vec3, radius: f32) -> Vec<ChunkCoord> {
        self.chunks
            .iter()
            .filter(|chunk| chunk.world_bounds().intersects_sphere(center, radius))
            .map(DensityChunk::coord)
            .collect()
    }

    /// Trilinear density at a world position; `None` outside the level
    pub fn sample(&self, p: Vec3) -> Option<f32> {
        let chunk = self.chunk(self.coord_at_world(p)?)?;
        Some(chunk.sample_voxel_space(chunk.local_to_voxel_space(chunk.world_to_local(p))))
    }

    /// Stamp a world-space box into every chunk it covers.
    ///
    /// Returns the number of samples written; each stamped chunk is resubmitted.
    pub fn stamp_box(&mut self, queue: &mut RemeshQueue, center: Vec3, extent: Vec3) -> Result<usize> {
        self.stamp(queue, &StampConfig::Box {
            center: center.to_array(),
            extent: extent.to_array(),
        })
    }

    pub fn stamp_sphere(&mut self, queue: &mut RemeshQueue, center: Vec3, radius: f32) -> Result<usize> {
        self.stamp(queue, &StampConfig::Sphere {
            center: center.to_array(),
            radius,
        })
    }

    fn stamp(&mut self, queue: &mut RemeshQueue, stamp: &StampConfig) -> Result<usize> {
        let surface = self.space.surface_level;
        let mut total = 0;
        for chunk in &mut self.chunks {
            let stamped = apply_stamp(chunk, stamp, surface)?;
            if stamped > 0 {
                queue.submit(chunk.snapshot(surface));
                total += stamped;
            }
        }
        log::debug!("Stamped {} samples with {:?}", total, stamp);
        Ok(total)
    }
}

fn apply_stamp(chunk: &mut DensityChunk, stamp: &StampConfig, surface: f32) -> Result<usize> {
    match *stamp {
        StampConfig::Box { center, extent } => {
            generator::stamp_box(chunk, Vec3::from(center), Vec3::from(extent), surface)
        }
        StampConfig::Sphere { center, radius } => {
            generator::stamp_sphere(chunk, Vec3::from(center), radius, surface)
        }
    }
}

fn coord_from_index(index: usize, grid: UVec3) -> ChunkCoord {
    let (gx, layer) = (grid.x as usize, grid.x as usize * grid.y as usize);
    ChunkCoord::new(
        (index % gx) as i32,
        ((index % layer) / gx) as i32,
        (index / layer) as i32,
    )
}

impl std::fmt::Debug for LevelGrid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LevelGrid")
            .field("chunk_grid", &self.chunk_grid)
            .field("space", &self.space)
            .field("chunks", &self.chunks.len())
            .finish()
    }
}
