//! Error types for the terrain engine

use glam::UVec3;
use thiserror::Error;

use crate::voxel::chunk::ChunkCoord;

/// Main error type for the engine
#[derive(Debug, Error)]
pub enum Error {
    /// Voxel index outside the chunk's sample grid
    #[error("Voxel index {index} out of range for chunk of size {size}")]
    OutOfRange { index: UVec3, size: UVec3 },

    /// Rejected before any density write happens
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Surface extraction failed; the chunk keeps its previous mesh
    #[error("Extraction failed for chunk {coord:?}: {reason}")]
    Extraction { coord: ChunkCoord, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),
}
