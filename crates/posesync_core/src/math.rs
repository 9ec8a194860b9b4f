//! # Pose Math
//!
//! Scale is never read from a node directly: composed parent scales can
//! shear a child's frame, so the world scale is factored out of the
//! local-to-world matrix instead.

use glam::{Mat4, Quat, Vec3};

/// Derives the world scale of a node from its world rotation and its
/// local-to-world matrix.
///
/// Computes `diag(inverse(rotation) * local_to_world)`. This matches the
/// lossy scale a scene graph reports, including the case where a rotated
/// child sits under a non-uniformly scaled parent.
#[inline]
#[must_use]
pub fn derive_world_scale(rotation: Quat, local_to_world: Mat4) -> Vec3 {
    let unrotated = Mat4::from_quat(rotation.inverse()) * local_to_world;
    Vec3::new(unrotated.x_axis.x, unrotated.y_axis.y, unrotated.z_axis.z)
}

/// Smallest absolute component of a scale vector.
///
/// Used to detect degenerate (near-zero) scale on a node.
#[inline]
#[must_use]
pub fn min_abs_axis(scale: Vec3) -> f32 {
    scale.abs().min_element()
}
