//! Camera system
//!
//! Projections use OpenGL clip space (`z` in `[-1, 1]`). The oblique
//! near-plane rewrite in [`crate::reflection::oblique`] is defined for that
//! convention; [`VirtualCamera::zero_to_one_projection`] converts for
//! backends with `[0, 1]` clip depth.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3, Vec4};

/// Remaps clip-space depth from `[-1, 1]` to `[0, 1]`.
pub const DEPTH_ZERO_TO_ONE: Mat4 = Mat4::from_cols(
    Vec4::new(1.0, 0.0, 0.0, 0.0),
    Vec4::new(0.0, 1.0, 0.0, 0.0),
    Vec4::new(0.0, 0.0, 0.5, 0.0),
    Vec4::new(0.0, 0.0, 0.5, 1.0),
);

/// Camera projection type
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    Perspective {
        fov_y: f32,
        aspect: f32,
        near: f32,
        far: f32,
    },
    Orthographic {
        left: f32,
        right: f32,
        bottom: f32,
        top: f32,
        near: f32,
        far: f32,
    },
}

impl Default for Projection {
    fn default() -> Self {
        Projection::Perspective {
            fov_y: std::f32::consts::FRAC_PI_4, // 45 degrees
            aspect: 1.0,
            near: 0.1,
            far: 1000.0,
        }
    }
}

impl Projection {
    pub fn perspective(fov_y_degrees: f32, aspect: f32, near: f32, far: f32) -> Self {
        Projection::Perspective {
            fov_y: fov_y_degrees.to_radians(),
            aspect,
            near,
            far,
        }
    }

    pub fn orthographic(width: f32, height: f32, near: f32, far: f32) -> Self {
        let half_w = width / 2.0;
        let half_h = height / 2.0;
        Projection::Orthographic {
            left: -half_w,
            right: half_w,
            bottom: -half_h,
            top: half_h,
            near,
            far,
        }
    }

    /// OpenGL-convention projection matrix
    pub fn matrix(&self) -> Mat4 {
        match self {
            Projection::Perspective {
                fov_y,
                aspect,
                near,
                far,
            } => Mat4::perspective_rh_gl(*fov_y, *aspect, *near, *far),
            Projection::Orthographic {
                left,
                right,
                bottom,
                top,
                near,
                far,
            } => Mat4::orthographic_rh_gl(*left, *right, *bottom, *top, *near, *far),
        }
    }

    pub fn near(&self) -> f32 {
        match self {
            Projection::Perspective { near, .. } => *near,
            Projection::Orthographic { near, .. } => *near,
        }
    }

    pub fn far(&self) -> f32 {
        match self {
            Projection::Perspective { far, .. } => *far,
            Projection::Orthographic { far, .. } => *far,
        }
    }
}

/// World matrix of an object at `eye` whose -Z axis points at `target`.
///
/// When `up` is parallel to the view direction the direction is nudged
/// slightly so a basis can still be built.
pub fn look_at_matrix(eye: Vec3, target: Vec3, up: Vec3) -> Mat4 {
    let mut z = eye - target;
    if z.length_squared() == 0.0 {
        z.z = 1.0;
    }
    z = z.normalize();

    let mut x = up.cross(z);
    if x.length_squared() == 0.0 {
        if up.z.abs() == 1.0 {
            z.x += 0.0001;
        } else {
            z.z += 0.0001;
        }
        z = z.normalize();
        x = up.cross(z);
    }
    x = x.normalize();
    let y = z.cross(x);

    Mat4::from_cols(x.extend(0.0), y.extend(0.0), z.extend(0.0), eye.extend(1.0))
}

/// The scene camera a reflection is rendered for. Owned by the caller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewerCamera {
    pub world: Mat4,
    pub projection: Mat4,
    pub far: f32,
}

impl ViewerCamera {
    pub fn new(world: Mat4, projection: Projection) -> Self {
        Self {
            world,
            projection: projection.matrix(),
            far: projection.far(),
        }
    }

    pub fn looking_at(position: Vec3, target: Vec3, projection: Projection) -> Self {
        Self::new(look_at_matrix(position, target, Vec3::Y), projection)
    }

    pub fn position(&self) -> Vec3 {
        self.world.w_axis.truncate()
    }

    pub fn view_matrix(&self) -> Mat4 {
        self.world.inverse()
    }
}

/// Mirrored camera owned by a reflector and rewritten every frame.
#[derive(Debug, Clone, PartialEq)]
pub struct VirtualCamera {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    world: Mat4,
    view: Mat4,
    projection: Mat4,
    far: f32,
}

impl Default for VirtualCamera {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            target: Vec3::NEG_Z,
            up: Vec3::Y,
            world: Mat4::IDENTITY,
            view: Mat4::IDENTITY,
            projection: Projection::default().matrix(),
            far: Projection::default().far(),
        }
    }
}

impl VirtualCamera {
    /// Take over the viewer's projection matrix and far plane.
    pub fn copy_intrinsics(&mut self, viewer: &ViewerCamera) {
        self.projection = viewer.projection;
        self.far = viewer.far;
    }

    /// Place the camera and rebuild its world and view matrices.
    pub fn orient(&mut self, position: Vec3, target: Vec3, up: Vec3) {
        self.position = position;
        self.target = target;
        self.up = up;
        self.world = look_at_matrix(position, target, up);
        self.view = self.world.inverse();
    }

    pub fn world_matrix(&self) -> Mat4 {
        self.world
    }

    pub fn view_matrix(&self) -> Mat4 {
        self.view
    }

    /// OpenGL-convention projection, including any oblique near plane
    pub fn projection_matrix(&self) -> Mat4 {
        self.projection
    }

    pub fn set_projection_matrix(&mut self, projection: Mat4) {
        self.projection = projection;
    }

    pub fn far(&self) -> f32 {
        self.far
    }

    /// Projection for clip depth in `[0, 1]`. The near plane, oblique or
    /// not, still maps to depth 0.
    pub fn zero_to_one_projection(&self) -> Mat4 {
        DEPTH_ZERO_TO_ONE * self.projection
    }

    /// Build camera uniform data for shaders on a `[0, 1]` depth backend
    pub fn uniform_data(&self) -> CameraUniformData {
        let proj = self.zero_to_one_projection();
        CameraUniformData {
            view: self.view,
            proj,
            view_proj: proj * self.view,
            position: self.position.extend(self.far),
        }
    }
}

/// Camera uniform data for GPU
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct CameraUniformData {
    pub view: Mat4,
    pub proj: Mat4,
    pub view_proj: Mat4,
    /// xyz = position, w = far plane
    pub position: Vec4,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_look_at_matrix_matches_glam_view() {
        let eye = Vec3::new(0.0, 2.0, 5.0);
        let world = look_at_matrix(eye, Vec3::ZERO, Vec3::Y);
        let view = Mat4::look_at_rh(eye, Vec3::ZERO, Vec3::Y);
        assert!(world.inverse().abs_diff_eq(view, 1e-5));
    }

    #[test]
    fn test_look_at_matrix_degenerate_up() {
        let world = look_at_matrix(Vec3::new(0.0, 5.0, 0.0), Vec3::ZERO, Vec3::Y);
        assert!(world.is_finite());
        let forward = -world.z_axis.truncate();
        assert!(forward.abs_diff_eq(Vec3::NEG_Y, 1e-3));
    }

    #[test]
    fn test_zero_to_one_maps_near_and_far() {
        let mut camera = VirtualCamera::default();
        camera.set_projection_matrix(Projection::perspective(60.0, 1.0, 0.5, 50.0).matrix());
        let proj = camera.zero_to_one_projection();

        let near = proj.project_point3(Vec3::new(0.0, 0.0, -0.5));
        let far = proj.project_point3(Vec3::new(0.0, 0.0, -50.0));
        assert!(near.z.abs() < 1e-5);
        assert!((far.z - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_viewer_position_and_far() {
        let viewer = ViewerCamera::looking_at(
            Vec3::new(1.0, 2.0, 3.0),
            Vec3::ZERO,
            Projection::perspective(50.0, 1.5, 0.1, 200.0),
        );
        assert!(viewer.position().abs_diff_eq(Vec3::new(1.0, 2.0, 3.0), 1e-6));
        assert_eq!(viewer.far, 200.0);
    }

    #[test]
    fn test_orthographic_viewer_keeps_far() {
        let projection = Projection::orthographic(20.0, 10.0, 0.5, 80.0);
        assert_eq!(projection.near(), 0.5);
        assert_eq!(projection.far(), 80.0);

        let viewer = ViewerCamera::new(Mat4::IDENTITY, projection);
        let corner = viewer.projection.project_point3(Vec3::new(10.0, 5.0, -80.0));
        assert!(corner.abs_diff_eq(Vec3::ONE, 1e-5));
        assert_eq!(viewer.far, 80.0);
    }
}
