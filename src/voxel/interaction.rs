//! Picking and overlap queries that drive edits

use glam::Vec3;

use crate::math::Ray;
use crate::terrain::LevelGrid;
use crate::voxel::chunk::ChunkCoord;

/// Resolves user interaction into world positions and chunk sets
pub trait InteractionProvider {
    /// First surface point along a ray within `max_distance`
    fn raycast(&self, ray: &Ray, max_distance: f32) -> Option<Vec3>;

    /// Chunks touched by a world-space sphere
    fn overlap_sphere(&self, center: Vec3, radius: f32) -> Vec<ChunkCoord>;
}

/// Queries answered directly from the density field of a level
pub struct GridInteraction<'a> {
    level: &'a LevelGrid,
}

impl<'a> GridInteraction<'a> {
    pub fn new(level: &'a LevelGrid) -> Self {
        Self { level }
    }
}

impl InteractionProvider for GridInteraction<'_> {
    /// Marches the field at half-voxel steps from where the ray enters the
    /// level until a sample drops below the surface level.
    fn raycast(&self, ray: &Ray, max_distance: f32) -> Option<Vec3> {
        if ray.direction == Vec3::ZERO {
            return None;
        }
        let bounds = self.level.level_bounds();
        let (t_entry, _) = ray.intersects_aabb(&bounds)?;

        // Distances along the march are measured from the entry point so they
        // stay small when the origin is far from the level
        let local = Ray::new(ray.at(t_entry), ray.direction);
        let (t_near, t_far) = local.intersects_aabb(&bounds)?;
        let t_end = t_far.min(max_distance - t_entry);
        if t_end.is_nan() || t_end < t_near {
            return None;
        }
        let step = self.level.voxel_size().min_element() * 0.5;
        let surface = self.level.surface_level();

        let steps = ((t_end - t_near) / step).floor() as u32;
        (0..=steps)
            .map(|n| local.at(t_near + n as f32 * step))
            .find(|&p| self.level.sample(p).is_some_and(|v| v < surface))
    }

    fn overlap_sphere(&self, center: Vec3, radius: f32) -> Vec<ChunkCoord> {
        self.level.chunks_overlapping_sphere(center, radius)
    }
}
