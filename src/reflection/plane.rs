//! Reflecting plane sampled from the surface's world transform

use glam::{Mat4, Vec3};

use crate::scene::extract_rotation;

/// Reflect `v` across the plane through the origin with unit `normal`.
#[inline]
pub fn reflect(v: Vec3, normal: Vec3) -> Vec3 {
    v - 2.0 * v.dot(normal) * normal
}

/// World-space mirror plane: a point on it and its unit normal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReflectorPlane {
    pub position: Vec3,
    pub normal: Vec3,
}

impl ReflectorPlane {
    /// Sample the plane of a surface whose front is its local +Z axis.
    ///
    /// Only the rotation of `world` orients the normal. The surface origin
    /// is pushed `offset` units along the normal.
    pub fn from_world_matrix(world: &Mat4, offset: f32) -> Self {
        let normal = extract_rotation(world).transform_vector3(Vec3::Z);
        let position = world.w_axis.truncate() + normal * offset;
        Self { position, normal }
    }

    /// True when `eye` sits behind the plane, so the mirror shows its back.
    pub fn faces_away_from(&self, eye: Vec3) -> bool {
        (self.position - eye).dot(self.normal) > 0.0
    }

    /// Mirror image of a point.
    pub fn mirror_point(&self, point: Vec3) -> Vec3 {
        self.position - reflect(self.position - point, self.normal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Quat;
    use std::f32::consts::FRAC_PI_2;

    fn floor(height: f32) -> Mat4 {
        Mat4::from_rotation_translation(
            Quat::from_rotation_x(-FRAC_PI_2),
            Vec3::new(0.0, height, 0.0),
        )
    }

    #[test]
    fn test_floor_normal_is_up() {
        let plane = ReflectorPlane::from_world_matrix(&floor(0.0), 0.0);
        assert!(plane.normal.abs_diff_eq(Vec3::Y, 1e-6));
        assert!(plane.position.abs_diff_eq(Vec3::ZERO, 1e-6));
    }

    #[test]
    fn test_offset_moves_along_normal() {
        let plane = ReflectorPlane::from_world_matrix(&floor(1.0), 0.25);
        assert!(plane.position.abs_diff_eq(Vec3::new(0.0, 1.25, 0.0), 1e-6));
    }

    #[test]
    fn test_scale_does_not_change_normal() {
        let world = floor(0.0) * Mat4::from_scale(Vec3::new(10.0, 4.0, 0.5));
        let plane = ReflectorPlane::from_world_matrix(&world, 0.0);
        assert!(plane.normal.abs_diff_eq(Vec3::Y, 1e-6));
        assert!((plane.normal.length() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_reflect_flips_normal_component() {
        let reflected = reflect(Vec3::new(1.0, -2.0, 3.0), Vec3::Y);
        assert_eq!(reflected, Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_faces_away() {
        let plane = ReflectorPlane::from_world_matrix(&floor(0.0), 0.0);
        assert!(!plane.faces_away_from(Vec3::new(0.0, 2.0, 5.0)));
        assert!(plane.faces_away_from(Vec3::new(0.0, -2.0, 5.0)));
        assert!(plane
            .mirror_point(Vec3::new(3.0, 2.0, 1.0))
            .abs_diff_eq(Vec3::new(3.0, -2.0, 1.0), 1e-5));
    }
}
