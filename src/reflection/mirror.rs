//! Mirrored camera pose

use glam::Vec3;

use super::plane::{reflect, ReflectorPlane};
use crate::scene::{extract_rotation, ViewerCamera, VirtualCamera};

/// Position, look target and up vector of the camera seen in the mirror.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MirrorPose {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
}

impl MirrorPose {
    /// Mirror `viewer` across `plane`. Returns `None` when the plane faces
    /// away from the viewer.
    pub fn compute(viewer: &ViewerCamera, plane: &ReflectorPlane) -> Option<Self> {
        let eye = viewer.position();
        if plane.faces_away_from(eye) {
            return None;
        }

        let position = plane.mirror_point(eye);

        let rotation = extract_rotation(&viewer.world);
        let target = plane.mirror_point(eye + rotation.transform_vector3(Vec3::NEG_Z));

        let up = reflect(rotation.transform_vector3(Vec3::Y), plane.normal);

        Some(Self {
            position,
            target,
            up,
        })
    }

    /// Copy the viewer's intrinsics onto `camera` and orient it on this pose.
    pub fn apply(&self, camera: &mut VirtualCamera, viewer: &ViewerCamera) {
        camera.copy_intrinsics(viewer);
        camera.orient(self.position, self.target, self.up);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::Projection;

    fn floor_plane() -> ReflectorPlane {
        ReflectorPlane {
            position: Vec3::ZERO,
            normal: Vec3::Y,
        }
    }

    fn viewer_at(position: Vec3) -> ViewerCamera {
        ViewerCamera::looking_at(
            position,
            Vec3::ZERO,
            Projection::perspective(60.0, 1.0, 0.1, 100.0),
        )
    }

    #[test]
    fn test_viewer_above_floor_mirrors_below() {
        let pose = MirrorPose::compute(&viewer_at(Vec3::new(0.0, 2.0, 5.0)), &floor_plane())
            .expect("floor faces the viewer");

        assert!(pose.position.abs_diff_eq(Vec3::new(0.0, -2.0, 5.0), 1e-5));
        assert!(pose.up.y < 0.0);
        // The mirrored camera still looks toward the origin's mirror image.
        let forward = (pose.target - pose.position).normalize();
        let expected = (Vec3::ZERO - pose.position).normalize();
        assert!(forward.abs_diff_eq(expected, 1e-5));
    }

    #[test]
    fn test_viewer_below_floor_is_skipped() {
        assert!(MirrorPose::compute(&viewer_at(Vec3::new(0.0, -2.0, 5.0)), &floor_plane()).is_none());
    }

    #[test]
    fn test_viewer_on_plane_still_renders() {
        let pose = MirrorPose::compute(&viewer_at(Vec3::new(0.0, 0.0, 5.0)), &floor_plane());
        assert!(pose.is_some());
    }

    #[test]
    fn test_apply_copies_intrinsics() {
        let viewer = ViewerCamera::looking_at(
            Vec3::new(1.0, 3.0, 4.0),
            Vec3::ZERO,
            Projection::perspective(45.0, 1.5, 0.5, 321.0),
        );
        let pose = MirrorPose::compute(&viewer, &floor_plane()).unwrap();

        let mut camera = VirtualCamera::default();
        pose.apply(&mut camera, &viewer);

        assert_eq!(camera.far(), 321.0);
        assert_eq!(camera.projection_matrix(), viewer.projection);
        assert!(camera
            .world_matrix()
            .w_axis
            .truncate()
            .abs_diff_eq(Vec3::new(1.0, -3.0, 4.0), 1e-5));
    }
}
