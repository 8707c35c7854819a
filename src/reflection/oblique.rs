//! Oblique near-plane clipping
//!
//! Rewrites the third row of an OpenGL-convention projection so the near
//! clip plane lies on an arbitrary view-space plane. Geometry on the back
//! side of the mirror is then clipped by the hardware.
//! See Lengyel, "Oblique View Frustum Depth Projection and Clipping".

use glam::{Mat3, Mat4, Vec4};

use super::plane::ReflectorPlane;

/// Sign with `sign(0) == 0`. `f32::signum` maps zero to one, which would
/// skew the corner chosen for `q`.
fn sign(value: f32) -> f32 {
    if value > 0.0 {
        1.0
    } else if value < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Express `plane` in the space of `view` as `(n, d)` with a unit normal.
pub fn view_space_clip_plane(plane: &ReflectorPlane, view: &Mat4) -> Vec4 {
    let normal_matrix = Mat3::from_mat4(*view).inverse().transpose();
    let normal = (normal_matrix * plane.normal).normalize();
    let point = view.transform_point3(plane.position);
    normal.extend(-point.dot(normal))
}

/// Move the near plane of `projection` onto `clip_plane` (view space).
///
/// Element indices follow the column-major layout: `m[8]` is column 2
/// row 0, `m[14]` is column 3 row 2, and so on. Both perspective and
/// orthographic projections are handled; the fourth row tells them apart.
/// Returns `false` and leaves the matrix untouched when the plane is
/// degenerate for this projection or the projection has another shape.
pub fn apply_oblique_near_plane(projection: &mut Mat4, clip_plane: Vec4) -> bool {
    let mut m = projection.to_cols_array();
    let row3 = projection.row(3);

    // Far corner of the frustum opposite the clip plane, in view space.
    let q = if row3 == Vec4::new(0.0, 0.0, -1.0, 0.0) {
        Vec4::new(
            (sign(clip_plane.x) + m[8]) / m[0],
            (sign(clip_plane.y) + m[9]) / m[5],
            -1.0,
            (1.0 + m[10]) / m[14],
        )
    } else if row3 == Vec4::W {
        Vec4::new(
            (sign(clip_plane.x) - m[12]) / m[0],
            (sign(clip_plane.y) - m[13]) / m[5],
            (1.0 - m[14]) / m[10],
            1.0,
        )
    } else {
        log::warn!(
            "Oblique clipping needs a perspective or orthographic projection, got fourth row {:?}",
            row3
        );
        return false;
    };

    let denominator = clip_plane.dot(q);
    if !q.is_finite() || !denominator.is_finite() || denominator.abs() < f32::EPSILON {
        log::warn!(
            "Oblique clip plane {:?} is degenerate for this projection, keeping the regular near plane",
            clip_plane
        );
        return false;
    }

    // Third row becomes the scaled plane minus the fourth row.
    let row2 = clip_plane * (2.0 * row3.dot(q) / denominator) - row3;
    m[2] = row2.x;
    m[6] = row2.y;
    m[10] = row2.z;
    m[14] = row2.w;

    *projection = Mat4::from_cols_array(&m);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reflection::MirrorPose;
    use crate::scene::{Projection, ViewerCamera, VirtualCamera};
    use glam::Vec3;
    use rstest::rstest;

    fn mirrored_camera() -> (VirtualCamera, ReflectorPlane) {
        mirrored_camera_with(Projection::perspective(60.0, 16.0 / 9.0, 0.1, 100.0))
    }

    fn mirrored_camera_with(projection: Projection) -> (VirtualCamera, ReflectorPlane) {
        let plane = ReflectorPlane {
            position: Vec3::ZERO,
            normal: Vec3::Y,
        };
        let viewer = ViewerCamera::looking_at(Vec3::new(0.0, 2.0, 5.0), Vec3::ZERO, projection);
        let mut camera = VirtualCamera::default();
        MirrorPose::compute(&viewer, &plane)
            .unwrap()
            .apply(&mut camera, &viewer);
        (camera, plane)
    }

    #[test]
    fn test_sign_of_zero_is_zero() {
        assert_eq!(sign(0.0), 0.0);
        assert_eq!(sign(-0.0), 0.0);
        assert_eq!(sign(3.0), 1.0);
        assert_eq!(sign(-0.5), -1.0);
    }

    #[test]
    fn test_clip_plane_in_view_space() {
        let (camera, plane) = mirrored_camera();
        let clip = view_space_clip_plane(&plane, &camera.view_matrix());

        // The camera sits two units below the floor.
        assert!((clip.w + 2.0).abs() < 1e-4);
        let on_plane = camera.view_matrix().transform_point3(Vec3::new(3.0, 0.0, -1.0));
        assert!((clip.truncate().dot(on_plane) + clip.w).abs() < 1e-4);
    }

    #[rstest]
    #[case::perspective(Projection::perspective(60.0, 16.0 / 9.0, 0.1, 100.0))]
    #[case::orthographic(Projection::orthographic(20.0, 10.0, 0.1, 100.0))]
    fn test_points_on_plane_land_on_near_plane(#[case] viewer_projection: Projection) {
        let (mut camera, plane) = mirrored_camera_with(viewer_projection);
        let view = camera.view_matrix();
        let clip = view_space_clip_plane(&plane, &view);

        let mut projection = camera.projection_matrix();
        assert!(apply_oblique_near_plane(&mut projection, clip));
        camera.set_projection_matrix(projection);

        for point in [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.5, 0.0, -2.0),
            Vec3::new(-3.0, 0.0, 1.0),
        ] {
            let ndc = (projection * view).project_point3(point);
            assert!((ndc.z + 1.0).abs() < 1e-3, "point {point:?} mapped to z {}", ndc.z);
        }
    }

    #[rstest]
    #[case::perspective(Projection::perspective(60.0, 16.0 / 9.0, 0.1, 100.0))]
    #[case::orthographic(Projection::orthographic(20.0, 10.0, 0.1, 100.0))]
    fn test_geometry_behind_mirror_is_clipped(#[case] viewer_projection: Projection) {
        let (camera, plane) = mirrored_camera_with(viewer_projection);
        let view = camera.view_matrix();
        let mut projection = camera.projection_matrix();
        apply_oblique_near_plane(&mut projection, view_space_clip_plane(&plane, &view));

        // Below the floor, between the virtual camera and the mirror.
        let behind = (projection * view).project_point3(Vec3::new(0.0, -0.5, 0.0));
        assert!(behind.z < -1.0);

        // Above the floor, what the mirror should show.
        let visible = (projection * view).project_point3(Vec3::new(0.0, 1.0, 0.0));
        assert!(visible.z > -1.0 && visible.z < 1.0);
    }

    #[rstest]
    #[case::perspective(Projection::perspective(60.0, 16.0 / 9.0, 0.1, 100.0))]
    #[case::orthographic(Projection::orthographic(20.0, 10.0, 0.1, 100.0))]
    fn test_only_third_row_changes(#[case] viewer_projection: Projection) {
        let (camera, plane) = mirrored_camera_with(viewer_projection);
        let before = camera.projection_matrix();
        let mut after = before;
        apply_oblique_near_plane(&mut after, view_space_clip_plane(&plane, &camera.view_matrix()));

        assert_eq!(before.row(0), after.row(0));
        assert_eq!(before.row(1), after.row(1));
        assert_eq!(before.row(3), after.row(3));
        assert_ne!(before.row(2), after.row(2));
    }

    #[test]
    fn test_unknown_projection_shape_is_left_alone() {
        // Fourth row (0, 0, 0, 0.5)
        let mut projection = Mat4::IDENTITY;
        projection.w_axis = Vec4::new(0.0, 0.0, 0.0, 0.5);
        let before = projection;
        assert!(!apply_oblique_near_plane(&mut projection, Vec4::new(0.0, 1.0, 0.0, -2.0)));
        assert_eq!(projection, before);
    }

    #[test]
    fn test_degenerate_projection_is_left_alone() {
        // Perspective fourth row with zero scale terms
        let mut projection = Mat4::ZERO;
        projection.z_axis.w = -1.0;
        let before = projection;
        let clip = Vec4::new(0.0, 1.0, 0.0, -2.0);
        assert!(!apply_oblique_near_plane(&mut projection, clip));
        assert_eq!(projection, before);
    }
}
