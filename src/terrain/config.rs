//! Level configuration, loadable from JSON.

use std::path::Path;

use glam::{UVec3, Vec3};
use serde::{Deserialize, Serialize};

use crate::core::{Error, Result};
use crate::voxel::chunk::VoxelSpace;

/// A primitive stamped into the field after noise and ground leveling
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum StampConfig {
    /// Axis-aligned box, `extent` is the full size
    Box { center: [f32; 3], extent: [f32; 3] },
    Sphere { center: [f32; 3], radius: f32 },
}

impl StampConfig {
    fn validate(&self) -> Result<()> {
        match self {
            StampConfig::Box { center, extent } => {
                if !Vec3::from(*center).is_finite() || extent.iter().any(|e| !e.is_finite() || *e < 0.0) {
                    return Err(Error::InvalidConfiguration(format!(
                        "box stamp needs a finite center and non-negative extent, got {:?} / {:?}",
                        center, extent
                    )));
                }
            }
            StampConfig::Sphere { center, radius } => {
                if !Vec3::from(*center).is_finite() || !radius.is_finite() || *radius < 0.0 {
                    return Err(Error::InvalidConfiguration(format!(
                        "sphere stamp needs a finite center and non-negative radius, got {:?} / {}",
                        center, radius
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Everything needed to (re)generate a level.
///
/// Passed to `LevelGrid` at construction; there is no process-wide state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelConfig {
    /// World extents of the whole level
    pub level_size: [f32; 3],
    /// Chunks per axis
    pub chunk_grid: [u32; 3],
    /// Cells per chunk per axis (samples = cells + 1)
    pub voxel_grid: [u32; 3],
    /// Iso value in [-1, 1]; density below it is solid
    pub surface_level: f32,
    pub seed: u32,
    /// Noise frequency over the normalized chunk coordinate
    pub frequency: f32,
    pub octaves: u32,
    /// Ground leveling base height; `None` skips the pass
    pub ground_level: Option<f32>,
    pub ground_octaves: u32,
    pub stamps: Vec<StampConfig>,
    /// Background extraction workers
    pub remesh_workers: usize,
}

impl Default for LevelConfig {
    fn default() -> Self {
        Self {
            level_size: [10.0, 10.0, 10.0],
            chunk_grid: [4, 4, 4],
            voxel_grid: [10, 10, 10],
            surface_level: 0.5,
            seed: 0,
            frequency: 1.0,
            octaves: 3,
            ground_level: None,
            ground_octaves: 3,
            stamps: Vec::new(),
            remesh_workers: 2,
        }
    }
}

impl LevelConfig {
    /// Load from a JSON file; missing fields take their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: LevelConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        Ok(())
    }

    /// Reject anything that would produce a degenerate grid
    pub fn validate(&self) -> Result<()> {
        if self.chunk_grid.iter().any(|&n| n == 0) {
            return Err(Error::InvalidConfiguration(format!(
                "chunk grid dimensions must be >= 1, got {:?}", self.chunk_grid
            )));
        }
        if self.voxel_grid.iter().any(|&n| n == 0) {
            return Err(Error::InvalidConfiguration(format!(
                "voxel grid dimensions must be >= 1, got {:?}", self.voxel_grid
            )));
        }
        let samples = self.voxel_grid.map(|n| n.checked_add(1));
        let sample_count = match samples {
            [Some(x), Some(y), Some(z)] => checked_count([x, y, z]).filter(|&n| n <= u32::MAX as usize),
            _ => None,
        };
        if sample_count.is_none() {
            return Err(Error::InvalidConfiguration(format!(
                "voxel grid {:?} holds more samples per chunk than a u32 can index", self.voxel_grid
            )));
        }
        if checked_count(self.chunk_grid).is_none_or(|n| n > i32::MAX as usize) {
            return Err(Error::InvalidConfiguration(format!(
                "chunk grid {:?} holds more chunks than an i32 coordinate can address", self.chunk_grid
            )));
        }
        if self.level_size.iter().any(|s| !s.is_finite() || *s <= 0.0) {
            return Err(Error::InvalidConfiguration(format!(
                "level size must be positive, got {:?}", self.level_size
            )));
        }
        if !(-1.0..=1.0).contains(&self.surface_level) {
            return Err(Error::InvalidConfiguration(format!(
                "surface level must lie in [-1, 1], got {}", self.surface_level
            )));
        }
        if !self.frequency.is_finite() || self.frequency <= 0.0 {
            return Err(Error::InvalidConfiguration(format!(
                "noise frequency must be positive, got {}", self.frequency
            )));
        }
        if self.octaves == 0 || self.ground_octaves == 0 {
            return Err(Error::InvalidConfiguration("octave counts must be >= 1".to_string()));
        }
        if self.ground_level.is_some_and(|g| !g.is_finite()) {
            return Err(Error::InvalidConfiguration("ground level must be finite".to_string()));
        }
        if self.remesh_workers == 0 {
            return Err(Error::InvalidConfiguration("remesh_workers must be >= 1".to_string()));
        }
        for stamp in &self.stamps {
            stamp.validate()?;
        }
        Ok(())
    }

    pub fn chunk_grid_size(&self) -> UVec3 {
        UVec3::from(self.chunk_grid)
    }

    pub fn voxel_grid_size(&self) -> UVec3 {
        UVec3::from(self.voxel_grid)
    }

    pub fn level_extent(&self) -> Vec3 {
        Vec3::from(self.level_size)
    }

    /// Derived chunk/voxel geometry
    pub fn space(&self) -> VoxelSpace {
        VoxelSpace::new(
            self.level_extent(),
            self.chunk_grid_size(),
            self.voxel_grid_size(),
            self.surface_level,
        )
    }
}

/// Product of three grid dimensions; `None` on overflow
fn checked_count(dims: [u32; 3]) -> Option<usize> {
    dims.iter().try_fold(1usize, |acc, &n| acc.checked_mul(n as usize))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_demo_level() {
        let config = LevelConfig::default();
        assert_eq!(config.level_size, [10.0; 3]);
        assert_eq!(config.chunk_grid, [4; 3]);
        assert_eq!(config.voxel_grid, [10; 3]);
        assert_eq!(config.surface_level, 0.5);
        assert_eq!(config.seed, 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_derived_space() {
        let config = LevelConfig {
            level_size: [10.0, 20.0, 10.0],
            chunk_grid: [2, 2, 1],
            voxel_grid: [5, 5, 4],
            ..Default::default()
        };
        let space = config.space();
        assert_eq!(space.chunk_size, Vec3::new(5.0, 10.0, 10.0));
        assert_eq!(space.voxel_size, Vec3::new(1.0, 2.0, 2.5));
    }

    #[test]
    fn test_rejects_oversized_grids() {
        let config = LevelConfig { voxel_grid: [1700; 3], ..Default::default() };
        assert!(matches!(config.validate(), Err(Error::InvalidConfiguration(_))));

        let config = LevelConfig { voxel_grid: [u32::MAX, 1, 1], ..Default::default() };
        assert!(matches!(config.validate(), Err(Error::InvalidConfiguration(_))));

        let config = LevelConfig { chunk_grid: [70000, 70000, 1], ..Default::default() };
        assert!(matches!(config.validate(), Err(Error::InvalidConfiguration(_))));

        let config = LevelConfig { voxel_grid: [1000, 1000, 1000], chunk_grid: [1000, 1000, 2], ..Default::default() };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_dimensions() {
        let config = LevelConfig { chunk_grid: [1, 0, 1], ..Default::default() };
        assert!(matches!(config.validate(), Err(Error::InvalidConfiguration(_))));

        let config = LevelConfig { voxel_grid: [0, 4, 4], ..Default::default() };
        assert!(matches!(config.validate(), Err(Error::InvalidConfiguration(_))));

        let config = LevelConfig { level_size: [10.0, -1.0, 10.0], ..Default::default() };
        assert!(matches!(config.validate(), Err(Error::InvalidConfiguration(_))));
    }

    #[test]
    fn test_rejects_bad_surface_and_stamps() {
        let config = LevelConfig { surface_level: 1.5, ..Default::default() };
        assert!(config.validate().is_err());

        let config = LevelConfig {
            stamps: vec![StampConfig::Sphere { center: [1.0, 1.0, 1.0], radius: -2.0 }],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_json_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("level.json");

        let config = LevelConfig {
            seed: 42,
            ground_level: Some(2.0),
            stamps: vec![
                StampConfig::Box { center: [5.0, 1.0, 5.0], extent: [2.0, 2.0, 2.0] },
                StampConfig::Sphere { center: [2.0, 3.0, 2.0], radius: 1.5 },
            ],
            ..Default::default()
        };
        config.to_json_file(&path).unwrap();

        let loaded = LevelConfig::from_json_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.json");
        std::fs::write(&path, r#"{ "seed": 9, "stamps": [{ "shape": "sphere", "center": [1, 2, 3], "radius": 1 }] }"#).unwrap();

        let loaded = LevelConfig::from_json_file(&path).unwrap();
        assert_eq!(loaded.seed, 9);
        assert_eq!(loaded.chunk_grid, [4; 3]);
        assert_eq!(loaded.stamps.len(), 1);
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, r#"{ "voxel_grid": [0, 1, 1] }"#).unwrap();
        assert!(matches!(LevelConfig::from_json_file(&path), Err(Error::InvalidConfiguration(_))));

        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(LevelConfig::from_json_file(&path), Err(Error::Config(_))));

        assert!(matches!(LevelConfig::from_json_file(dir.path().join("missing.json")), Err(Error::Io(_))));
    }
}
