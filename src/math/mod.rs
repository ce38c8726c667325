//! Mathematical utilities and data structures

pub mod aabb;
pub mod ray;

pub use aabb::Aabb;
pub use ray::Ray;

/// Linear interpolation from `a` to `b` by `t`
#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}
