//! Applies sculpting edits to the density field

use glam::Vec3;
use rayon::prelude::*;
use serde::Serialize;

use super::queue::RemeshQueue;
use super::request::{validate_brush, BrushConfig, EditMode, EditRequest, Falloff};
use crate::core::{Error, Result};
use crate::math::{Aabb, Ray};
use crate::terrain::LevelGrid;
use crate::voxel::chunk::{ChunkCoord, DensityChunk};
use crate::voxel::interaction::{GridInteraction, InteractionProvider};

/// What one edit touched
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct EditReport {
    /// Chunks that received a request, in storage order
    pub chunks: Vec<ChunkCoord>,
    /// Samples whose value actually changed
    pub voxels_changed: usize,
}

/// Turns interaction points into per-chunk density deltas.
///
/// Edits run on the caller's thread in issue order. Within one edit the
/// affected chunks are mutated in parallel, then each is resubmitted for
/// extraction with a snapshot taken after its last write.
pub struct EditEngine;

impl EditEngine {
    /// Sculpt a sphere of `radius` around a world-space point
    pub fn apply_edit(
        level: &mut LevelGrid,
        queue: &mut RemeshQueue,
        hit_point: Vec3,
        radius: f32,
        subtract: bool,
        gradient: bool,
    ) -> Result<EditReport> {
        let requests = Self::resolve(
            &GridInteraction::new(level),
            hit_point,
            radius,
            EditMode::from_subtract(subtract),
            Falloff::from_gradient(gradient),
        )?;
        Self::apply_requests(level, queue, &requests)
    }

    /// Pick a hit point with a ray and sculpt there with the brush settings.
    ///
    /// Returns `Ok(None)` when the ray hits no surface within reach.
    pub fn apply_brush(
        level: &mut LevelGrid,
        queue: &mut RemeshQueue,
        ray: &Ray,
        brush: &BrushConfig,
        subtract: bool,
    ) -> Result<Option<EditReport>> {
        let Some(hit) = GridInteraction::new(level).raycast(ray, brush.reach) else {
            return Ok(None);
        };
        Self::apply_edit(level, queue, hit, brush.radius, subtract, brush.gradient).map(Some)
    }

    /// Build one request per chunk the sphere overlaps
    pub fn resolve(
        provider: &dyn InteractionProvider,
        hit_point: Vec3,
        radius: f32,
        mode: EditMode,
        falloff: Falloff,
    ) -> Result<Vec<EditRequest>> {
        validate_brush(hit_point, radius)?;

        let mut targets = provider.overlap_sphere(hit_point, radius);
        targets.sort_unstable();
        targets.dedup();

        Ok(targets
            .into_iter()
            .map(|target| EditRequest {
                target,
                hit_point,
                radius,
                mode,
                falloff,
            })
            .collect())
    }

    /// Apply a batch of requests, then resubmit every targeted chunk.
    ///
    /// All requests are validated before the first write.
    pub fn apply_requests(
        level: &mut LevelGrid,
        queue: &mut RemeshQueue,
        requests: &[EditRequest],
    ) -> Result<EditReport> {
        let mut touched = Vec::with_capacity(requests.len());
        for request in requests {
            request.validate()?;
            let index = level.chunk_index(request.target).ok_or_else(|| {
                Error::InvalidConfiguration(format!("edit targets chunk {:?} outside the level", request.target))
            })?;
            touched.push(index);
        }
        touched.sort_unstable();
        touched.dedup();

        let voxels_changed: usize = level
            .chunks_mut()
            .par_iter_mut()
            .enumerate()
            .filter(|(index, _)| touched.binary_search(index).is_ok())
            .map(|(_, chunk)| {
                let coord = chunk.coord();
                requests
                    .iter()
                    .filter(|request| request.target == coord)
                    .map(|request| Self::apply_request(chunk, request))
                    .sum::<usize>()
            })
            .sum();

        let surface = level.surface_level();
        let chunks = level.chunks();
        let mut coords = Vec::with_capacity(touched.len());
        for &index in &touched {
            let chunk = &chunks[index];
            queue.submit(chunk.snapshot(surface));
            coords.push(chunk.coord());
        }

        log::debug!(
            "Edit changed {} samples across {} chunks",
            voxels_changed,
            coords.len()
        );
        Ok(EditReport {
            chunks: coords,
            voxels_changed,
        })
    }

    /// Apply one request to its chunk; returns the number of samples changed.
    ///
    /// Only the sample range bounding the sphere is visited. Samples farther
    /// than the radius from the hit point are left alone.
    pub fn apply_request(chunk: &mut DensityChunk, request: &EditRequest) -> usize {
        let center = chunk.world_to_local(request.hit_point);
        let bounds = Aabb::from_sphere(center, request.radius);
        let Some((lo, hi)) = chunk.voxel_range(bounds.min, bounds.max) else {
            return 0;
        };

        let mut inside = 0;
        let mut changed = 0;
        for k in lo.z..=hi.z {
            for j in lo.y..=hi.y {
                for i in lo.x..=hi.x {
                    let distance = chunk.voxel_local_position(i, j, k).distance(center);
                    if distance > request.radius {
                        continue;
                    }
                    inside += 1;
                    let index = chunk.flat_index(i, j, k);
                    let old = chunk.get_index(index);
                    chunk.set_index(index, old + request.falloff.delta(request.mode, distance, request.radius));
                    if chunk.get_index(index) != old {
                        changed += 1;
                    }
                }
            }
        }
        if inside > 0 {
            chunk.bump_revision();
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::SurfaceNetsMesher;
    use crate::terrain::PerlinNoiseField;
    use glam::UVec3;

    fn level_and_queue(chunk_grid: UVec3, level_size: Vec3) -> (LevelGrid, RemeshQueue) {
        let mut noise = PerlinNoiseField::default();
        let mut queue = RemeshQueue::immediate(SurfaceNetsMesher::default());
        let level = LevelGrid::generate_level(level_size, chunk_grid, UVec3::splat(4), 0.0, 42, &mut noise, &mut queue)
            .unwrap();
        (level, queue)
    }

    #[test]
    fn test_step_subtract_single_voxel() {
        let (mut level, mut queue) = level_and_queue(UVec3::ONE, Vec3::splat(10.0));
        let before = level.chunks()[0].values().to_vec();
        let center = level.chunks()[0].index(2, 2, 2).unwrap();

        let report = EditEngine::apply_edit(&mut level, &mut queue, Vec3::splat(5.0), 1.0, true, false).unwrap();
        assert_eq!(report.chunks, vec![ChunkCoord::new(0, 0, 0)]);

        let after = level.chunks()[0].values();
        for (index, (&old, &new)) in before.iter().zip(after).enumerate() {
            if index == center {
                assert_eq!(new, (old + 1.0).clamp(-1.0, 1.0));
            } else {
                assert_eq!(new, old, "sample {index} changed");
            }
        }

        EditEngine::apply_edit(&mut level, &mut queue, Vec3::splat(5.0), 1.0, true, false).unwrap();
        assert_eq!(level.chunks()[0].values()[center], 1.0);
    }

    #[test]
    fn test_step_add_pushes_toward_solid() {
        let (mut level, mut queue) = level_and_queue(UVec3::ONE, Vec3::splat(10.0));
        for _ in 0..2 {
            EditEngine::apply_edit(&mut level, &mut queue, Vec3::splat(5.0), 1.0, false, false).unwrap();
        }
        assert_eq!(level.chunks()[0].value_at(2, 2, 2).unwrap(), -1.0);
    }

    #[test]
    fn test_edit_locality() {
        let (mut level, mut queue) = level_and_queue(UVec3::ONE, Vec3::splat(10.0));
        let hit = Vec3::new(4.0, 6.0, 5.5);
        let radius = 3.0;
        let before = level.chunks()[0].clone();

        EditEngine::apply_edit(&mut level, &mut queue, hit, radius, true, true).unwrap();

        let after = &level.chunks()[0];
        for index in 0..after.len() {
            let c = after.coords_of(index);
            let distance = after.voxel_world_position(c.x, c.y, c.z).distance(hit);
            if distance > radius {
                assert_eq!(after.values()[index], before.values()[index]);
            }
            assert!((-1.0..=1.0).contains(&after.values()[index]));
        }
    }

    #[test]
    fn test_gradient_monotonic_with_distance() {
        let (mut level, mut queue) = level_and_queue(UVec3::ONE, Vec3::splat(10.0));
        // Start from a uniform field so deltas are directly observable
        for chunk in level.chunks_mut() {
            for index in 0..chunk.len() {
                chunk.set_index(index, -1.0);
            }
        }
        let hit = Vec3::splat(5.0);
        let radius = 5.0;
        EditEngine::apply_edit(&mut level, &mut queue, hit, radius, true, true).unwrap();

        let chunk = &level.chunks()[0];
        let mut samples: Vec<(f32, f32)> = (0..chunk.len())
            .map(|index| {
                let c = chunk.coords_of(index);
                let d = chunk.voxel_world_position(c.x, c.y, c.z).distance(hit);
                (d, chunk.values()[index] + 1.0)
            })
            .collect();
        samples.sort_by(|a, b| a.0.total_cmp(&b.0));
        for pair in samples.windows(2) {
            assert!(pair[1].1 <= pair[0].1 + 1e-6, "delta grew with distance: {:?}", pair);
        }
        // Sample (2, 2, 0) sits exactly on the radius
        assert_eq!(chunk.value_at(2, 2, 0).unwrap(), -1.0);
        assert_eq!(chunk.value_at(2, 2, 2).unwrap(), 0.0);
    }

    #[test]
    fn test_multi_chunk_edit_is_consistent() {
        let (mut level, mut queue) = level_and_queue(UVec3::new(2, 1, 1), Vec3::new(20.0, 10.0, 10.0));
        let submitted = queue.stats().submitted;

        let report = EditEngine::apply_edit(&mut level, &mut queue, Vec3::new(10.0, 5.0, 5.0), 3.0, true, true).unwrap();
        assert_eq!(report.chunks, vec![ChunkCoord::new(0, 0, 0), ChunkCoord::new(1, 0, 0)]);
        assert_eq!(queue.stats().submitted, submitted + 2);

        let left = level.chunk(ChunkCoord::new(0, 0, 0)).unwrap();
        let right = level.chunk(ChunkCoord::new(1, 0, 0)).unwrap();
        for k in 0..5 {
            for j in 0..5 {
                let a = left.value_at(4, j, k).unwrap();
                let b = right.value_at(0, j, k).unwrap();
                assert!((a - b).abs() < 1e-5, "boundary ({j}, {k}): {a} vs {b}");
            }
        }
    }

    #[test]
    fn test_invalid_radius_rejected_before_mutation() {
        let (mut level, mut queue) = level_and_queue(UVec3::ONE, Vec3::splat(10.0));
        let before = level.chunks()[0].values().to_vec();
        let submitted = queue.stats().submitted;

        for radius in [0.0, -1.0, f32::NAN, f32::INFINITY] {
            let result = EditEngine::apply_edit(&mut level, &mut queue, Vec3::splat(5.0), radius, true, false);
            assert!(matches!(result, Err(Error::InvalidConfiguration(_))));
        }
        assert_eq!(level.chunks()[0].values(), before.as_slice());
        assert_eq!(queue.stats().submitted, submitted);
    }

    #[test]
    fn test_requests_outside_level_rejected() {
        let (mut level, mut queue) = level_and_queue(UVec3::ONE, Vec3::splat(10.0));
        let revision = level.chunks()[0].revision();
        let requests = [
            EditRequest {
                target: ChunkCoord::new(0, 0, 0),
                hit_point: Vec3::splat(5.0),
                radius: 2.0,
                mode: EditMode::Subtract,
                falloff: Falloff::Step,
            },
            EditRequest {
                target: ChunkCoord::new(3, 0, 0),
                hit_point: Vec3::splat(5.0),
                radius: 2.0,
                mode: EditMode::Subtract,
                falloff: Falloff::Step,
            },
        ];
        assert!(EditEngine::apply_requests(&mut level, &mut queue, &requests).is_err());
        assert_eq!(level.chunks()[0].revision(), revision);
    }

    #[test]
    fn test_edit_away_from_level_touches_nothing() {
        let (mut level, mut queue) = level_and_queue(UVec3::ONE, Vec3::splat(10.0));
        let report = EditEngine::apply_edit(&mut level, &mut queue, Vec3::splat(40.0), 1.0, true, false).unwrap();
        assert!(report.chunks.is_empty());
        assert_eq!(report.voxels_changed, 0);
    }

    #[test]
    fn test_brush_raycast_edit() {
        let (mut level, mut queue) = level_and_queue(UVec3::ONE, Vec3::splat(10.0));
        for chunk in level.chunks_mut() {
            for index in 0..chunk.len() {
                chunk.set_index(index, -1.0);
            }
        }
        let brush = BrushConfig { radius: 2.0, ..Default::default() };
        let ray = Ray::new(Vec3::new(5.0, 5.0, -2.0), Vec3::Z);

        let report = EditEngine::apply_brush(&mut level, &mut queue, &ray, &brush, true).unwrap().unwrap();
        assert_eq!(report.chunks, vec![ChunkCoord::new(0, 0, 0)]);
        assert!(report.voxels_changed > 0);

        let miss = Ray::new(Vec3::new(5.0, 5.0, -20.0), Vec3::Z);
        assert!(EditEngine::apply_brush(&mut level, &mut queue, &miss, &brush, true).unwrap().is_none());
    }

    #[test]
    fn test_brush_with_unbounded_reach_from_far_away() {
        let mut noise = PerlinNoiseField::default();
        let mut queue = RemeshQueue::immediate(SurfaceNetsMesher::default());
        // Nothing lies below a surface level of -1
        let mut level = LevelGrid::generate_level(Vec3::splat(10.0), UVec3::ONE, UVec3::splat(10), -1.0, 7, &mut noise, &mut queue)
            .unwrap();
        let brush = BrushConfig { reach: f32::INFINITY, ..Default::default() };
        let ray = Ray::new(Vec3::new(-1e9, 5.0, 5.0), Vec3::X);

        assert!(EditEngine::apply_brush(&mut level, &mut queue, &ray, &brush, true).unwrap().is_none());
    }
}
