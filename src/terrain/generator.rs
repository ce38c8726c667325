//! Noise-based procedural density generation

use glam::Vec3;

use super::noise_field::NoiseField;
use crate::core::{Error, Result};
use crate::math::Aabb;
use crate::voxel::chunk::DensityChunk;

/// Offset below the surface level written by primitive stamps
pub const STAMP_EPSILON: f32 = 0.01;

/// Fills density chunks from a noise field.
///
/// Chunks sample the noise at their normalized in-chunk coordinate (0..1 per
/// axis) offset by their integer grid position, so neighbours sample adjacent
/// regions of one continuous noise domain.
pub struct ChunkGenerator<'a, N: NoiseField + ?Sized> {
    noise: &'a N,
}

/// `i / (n - 1)`, or 0 on a single-sample axis
#[inline]
fn normalized(i: u32, n: u32) -> f32 {
    if n > 1 { i as f32 / (n - 1) as f32 } else { 0.0 }
}

impl<'a, N: NoiseField + ?Sized> ChunkGenerator<'a, N> {
    pub fn new(noise: &'a N) -> Self {
        Self { noise }
    }

    /// Overwrite every sample with fractal noise
    pub fn generate_base(&self, chunk: &mut DensityChunk, frequency: f32, octaves: u32) {
        let size = chunk.size();
        let offset = chunk.coord().as_vec3();

        for k in 0..size.z {
            for j in 0..size.y {
                for i in 0..size.x {
                    let p = Vec3::new(
                        normalized(i, size.x),
                        normalized(j, size.y),
                        normalized(k, size.z),
                    ) * frequency + offset;
                    let value = self.noise.fbm3(p.x, p.y, p.z, octaves);
                    let index = chunk.flat_index(i, j, k);
                    chunk.set_index(index, value);
                }
            }
        }
        chunk.bump_revision();
    }

    /// Fade samples above a noisy ground surface toward empty.
    ///
    /// A sample at world height `h` above `ground_level + g(x, z)` gets
    /// `2 * (h - ground_level) / (chunk_height - ground_level)` added, where
    /// `chunk_height` is the vertical extent of the chunk's samples. Samples at
    /// or below the ground are untouched.
    pub fn apply_ground_level(&self, chunk: &mut DensityChunk, ground_level: f32, octaves: u32) {
        let size = chunk.size();
        let offset = chunk.coord().as_vec3();
        let voxel_height = chunk.voxel_size().y;
        let origin_y = chunk.origin().y;
        let extent = (size.y - 1) as f32 * voxel_height - ground_level;

        for k in 0..size.z {
            for i in 0..size.x {
                let ground = self.noise.fbm2(
                    normalized(i, size.x) + offset.x,
                    normalized(k, size.z) + offset.z,
                    octaves,
                );
                for j in 0..size.y {
                    let height = j as f32 * voxel_height + origin_y;
                    if height <= ground_level + ground {
                        continue;
                    }
                    let push = if extent > 0.0 {
                        2.0 * (height - ground_level) / extent
                    } else {
                        2.0
                    };
                    let index = chunk.flat_index(i, j, k);
                    chunk.set_index(index, chunk.get_index(index) + push);
                }
            }
        }
        chunk.bump_revision();
    }
}

/// Force every sample inside a world-space box to just below the surface.
///
/// `extent` is the full box size. Returns the number of samples written.
pub fn stamp_box(chunk: &mut DensityChunk, center: Vec3, extent: Vec3, surface: f32) -> Result<usize> {
    if !center.is_finite() || !extent.is_finite() || extent.min_element() < 0.0 {
        return Err(Error::InvalidConfiguration(format!(
            "box stamp needs a finite center and non-negative extent, got {center} / {extent}"
        )));
    }
    let bounds = Aabb::from_center_half_extent(chunk.world_to_local(center), extent * 0.5);
    Ok(stamp_where(chunk, &bounds, surface, |p| bounds.contains_point(p)))
}

/// Force every sample inside a world-space sphere to just below the surface
pub fn stamp_sphere(chunk: &mut DensityChunk, center: Vec3, radius: f32, surface: f32) -> Result<usize> {
    if !center.is_finite() || !radius.is_finite() || radius < 0.0 {
        return Err(Error::InvalidConfiguration(format!(
            "sphere stamp needs a finite center and non-negative radius, got {center} / {radius}"
        )));
    }
    let local_center = chunk.world_to_local(center);
    let bounds = Aabb::from_sphere(local_center, radius);
    Ok(stamp_where(chunk, &bounds, surface, |p| p.distance(local_center) <= radius))
}

fn stamp_where(chunk: &mut DensityChunk, local_bounds: &Aabb, surface: f32, inside: impl Fn(Vec3) -> bool) -> usize {
    let Some((lo, hi)) = chunk.voxel_range(local_bounds.min, local_bounds.max) else {
        return 0;
    };

    let value = surface - STAMP_EPSILON;
    let mut stamped = 0;
    for k in lo.z..=hi.z {
        for j in lo.y..=hi.y {
            for i in lo.x..=hi.x {
                if !inside(chunk.voxel_local_position(i, j, k)) {
                    continue;
                }
                let index = chunk.flat_index(i, j, k);
                chunk.set_index(index, value);
                stamped += 1;
            }
        }
    }
    if stamped > 0 {
        chunk.bump_revision();
    }
    stamped
}
