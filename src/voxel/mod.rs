//! Density chunks, interaction queries and editing

pub mod chunk;
pub mod edit;
pub mod interaction;

pub use chunk::{ChunkCoord, DensityChunk, VoxelSpace, DENSITY_MAX, DENSITY_MIN};
pub use edit::{EditEngine, EditReport, RemeshQueue};
pub use interaction::{GridInteraction, InteractionProvider};
