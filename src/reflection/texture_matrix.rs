//! World-to-reflection-texture projection

use glam::{Mat4, Vec4};

/// Maps clip space `[-1, 1]` to texture space `[0, 1]` on every axis.
pub const TEXTURE_BIAS: Mat4 = Mat4::from_cols(
    Vec4::new(0.5, 0.0, 0.0, 0.0),
    Vec4::new(0.0, 0.5, 0.0, 0.0),
    Vec4::new(0.0, 0.0, 0.5, 0.0),
    Vec4::new(0.5, 0.5, 0.5, 1.0),
);

/// `bias * projection * view * model`.
///
/// Applied to a local-space vertex of the reflector, the result divided by
/// its `w` gives the reflection texture coordinate with `v = 0` at the
/// bottom. Backends whose textures start at the top sample `1 - v`.
pub fn texture_matrix(projection: &Mat4, view: &Mat4, model: &Mat4) -> Mat4 {
    TEXTURE_BIAS * *projection * *view * *model
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{look_at_matrix, Projection};
    use glam::{Quat, Vec3};

    fn setup() -> (Mat4, Mat4, Mat4) {
        let projection = Projection::perspective(60.0, 1.0, 0.1, 100.0).matrix();
        let view = look_at_matrix(Vec3::new(1.0, -2.0, 5.0), Vec3::new(0.0, 0.5, 0.0), Vec3::Y)
            .inverse();
        let model = Mat4::from_scale_rotation_translation(
            Vec3::splat(4.0),
            Quat::from_rotation_x(-std::f32::consts::FRAC_PI_2),
            Vec3::new(0.5, 0.0, -1.0),
        );
        (projection, view, model)
    }

    #[test]
    fn test_center_of_view_maps_to_center_of_texture() {
        let (projection, view, _) = setup();
        let camera_world = view.inverse();
        let ahead = camera_world.transform_point3(Vec3::new(0.0, 0.0, -10.0));

        let uv = texture_matrix(&projection, &view, &Mat4::IDENTITY).project_point3(ahead);
        assert!((uv.x - 0.5).abs() < 1e-5);
        assert!((uv.y - 0.5).abs() < 1e-5);
        assert!(uv.z > 0.0 && uv.z < 1.0);
    }

    #[test]
    fn test_composition_order_matters() {
        let (projection, view, model) = setup();
        let expected = texture_matrix(&projection, &view, &model);

        let permutations = [
            TEXTURE_BIAS * projection * model * view,
            TEXTURE_BIAS * view * projection * model,
            projection * TEXTURE_BIAS * view * model,
            model * view * projection * TEXTURE_BIAS,
        ];
        for permuted in permutations {
            assert!(!expected.abs_diff_eq(permuted, 1e-3));
        }
    }
}
