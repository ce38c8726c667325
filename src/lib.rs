//! Voxsculpt - chunked voxel-density terrain with real-time sculpting
//!
//! A level is a regular grid of [`voxel::DensityChunk`]s filled from a seeded
//! [`terrain::NoiseField`]. Edits push density toward empty or solid inside a
//! sphere and hand every touched chunk to a [`voxel::RemeshQueue`], which runs
//! surface extraction in the background and swaps finished meshes in whole.

pub mod core;
pub mod math;
pub mod mesh;
pub mod terrain;
pub mod voxel;
