//! Edit requests and brush settings

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::core::{Error, Result};
use crate::voxel::chunk::ChunkCoord;

/// Direction of a density edit
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditMode {
    /// Carve: push density toward empty (+1)
    Subtract,
    /// Fill: push density toward solid (-1)
    Add,
}

impl EditMode {
    pub fn from_subtract(subtract: bool) -> Self {
        if subtract { EditMode::Subtract } else { EditMode::Add }
    }

    /// Full-strength delta applied at the brush center
    pub fn sign(self) -> f32 {
        match self {
            EditMode::Subtract => 1.0,
            EditMode::Add => -1.0,
        }
    }
}

/// How the delta fades with distance from the hit point
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Falloff {
    /// Full delta everywhere inside the radius
    Step,
    /// Linear fade to zero at the radius
    Gradient,
}

impl Falloff {
    pub fn from_gradient(gradient: bool) -> Self {
        if gradient { Falloff::Gradient } else { Falloff::Step }
    }

    /// Delta for a sample at `distance` from the center of a `radius` brush
    #[inline]
    pub fn delta(self, mode: EditMode, distance: f32, radius: f32) -> f32 {
        let s = mode.sign();
        match self {
            Falloff::Step => s,
            Falloff::Gradient => crate::math::lerp(s, 0.0, distance / radius),
        }
    }
}

/// One chunk's share of an edit; consumed when applied
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EditRequest {
    pub target: ChunkCoord,
    /// World-space brush center
    pub hit_point: Vec3,
    pub radius: f32,
    pub mode: EditMode,
    pub falloff: Falloff,
}

impl EditRequest {
    pub fn validate(&self) -> Result<()> {
        validate_brush(self.hit_point, self.radius)
    }
}

pub(crate) fn validate_brush(hit_point: Vec3, radius: f32) -> Result<()> {
    if !radius.is_finite() || radius <= 0.0 {
        return Err(Error::InvalidConfiguration(format!(
            "edit radius must be positive and finite, got {radius}"
        )));
    }
    if !hit_point.is_finite() {
        return Err(Error::InvalidConfiguration(format!(
            "edit hit point must be finite, got {hit_point}"
        )));
    }
    Ok(())
}

/// Interactive brush settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrushConfig {
    pub radius: f32,
    pub gradient: bool,
    /// Maximum raycast distance for picking the hit point
    pub reach: f32,
}

impl Default for BrushConfig {
    fn default() -> Self {
        Self {
            radius: 1.0,
            gradient: false,
            reach: 5.0,
        }
    }
}
