//! Procedural terrain generation

pub mod config;
pub mod generator;
pub mod level;
pub mod noise_field;

pub use config::{LevelConfig, StampConfig};
pub use generator::{stamp_box, stamp_sphere, ChunkGenerator, STAMP_EPSILON};
pub use level::LevelGrid;
pub use noise_field::{NoiseField, PerlinNoiseField};
