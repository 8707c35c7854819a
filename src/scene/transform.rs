//! Transform component

use bevy_ecs::prelude::*;
use glam::{Mat4, Quat, Vec3};

/// Transform component for positioning objects in 3D space
#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    pub fn from_position_rotation(position: Vec3, rotation: Quat) -> Self {
        Self {
            position,
            rotation,
            ..Default::default()
        }
    }

    /// Decompose a world matrix. Shear is lost.
    pub fn from_matrix(matrix: Mat4) -> Self {
        let (scale, rotation, position) = matrix.to_scale_rotation_translation();
        Self {
            position,
            rotation,
            scale,
        }
    }

    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    /// Get the model matrix for this transform
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }

    /// Direction the local +Z axis faces, the front of a reflector surface
    pub fn front(&self) -> Vec3 {
        self.rotation * Vec3::Z
    }
}

/// Rotation part of an affine matrix: each basis column is normalized so
/// scale drops out, and the translation is zeroed.
pub fn extract_rotation(matrix: &Mat4) -> Mat4 {
    let normalize = |column: glam::Vec4| {
        let axis = column.truncate();
        let length = axis.length();
        if length > 0.0 {
            (axis / length).extend(0.0)
        } else {
            glam::Vec4::ZERO
        }
    };

    Mat4::from_cols(
        normalize(matrix.x_axis),
        normalize(matrix.y_axis),
        normalize(matrix.z_axis),
        glam::Vec4::W,
    )
}
