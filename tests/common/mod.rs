//! Common utilities for reflector integration tests.
//!
//! Provides a scene host that records what the reflector asked of it, and
//! the cameras and surfaces the scenarios share.

#![allow(dead_code)]

use std::collections::HashMap;
use std::f32::consts::FRAC_PI_2;

use glam::{Mat4, Quat, Vec3};
use mesh_reflector::backend::{
    BackendError, BackendResult, GraphicsBackend, RenderTargetBinding, RendererGlobals,
};
use mesh_reflector::scene::begin_scene_pass;
use mesh_reflector::{Projection, SceneHost, ViewerCamera, VirtualCamera};

/// Node id of the reflecting floor in [`RecordingScene::with_floor`]
pub const FLOOR: u32 = 1;

/// What the backend looked like when the scene was asked to draw.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderCall {
    pub camera_position: Vec3,
    pub camera_far: f32,
    pub globals: RendererGlobals,
    pub target: Option<RenderTargetBinding>,
    pub depth_write: bool,
    pub hidden: Vec<u32>,
}

/// Scene host keeping node transforms in a map and logging every request.
#[derive(Debug, Default)]
pub struct RecordingScene {
    pub transforms: HashMap<u32, Mat4>,
    pub visible: HashMap<u32, bool>,
    pub visibility_log: Vec<(u32, bool)>,
    pub renders: Vec<RenderCall>,
    /// Next render fails with this error
    pub fail_with: Option<BackendError>,
}

impl RecordingScene {
    /// Floor at height 0 facing +Y
    pub fn with_floor() -> Self {
        Self::with_surface(FLOOR, floor_matrix(0.0))
    }

    pub fn with_surface(node: u32, world: Mat4) -> Self {
        let mut scene = Self::default();
        scene.transforms.insert(node, world);
        scene.visible.insert(node, true);
        scene
    }

    pub fn is_visible(&self, node: u32) -> bool {
        self.visible.get(&node).copied().unwrap_or(true)
    }
}

impl<B: GraphicsBackend> SceneHost<B> for RecordingScene {
    type Node = u32;

    fn world_matrix(&self, node: u32) -> Option<Mat4> {
        self.transforms.get(&node).copied()
    }

    fn set_visible(&mut self, node: u32, visible: bool) {
        self.visible.insert(node, visible);
        self.visibility_log.push((node, visible));
    }

    fn render(&mut self, backend: &mut B, camera: &VirtualCamera) -> BackendResult<()> {
        let mut hidden: Vec<u32> = self
            .visible
            .iter()
            .filter(|(_, visible)| !**visible)
            .map(|(node, _)| *node)
            .collect();
        hidden.sort_unstable();

        self.renders.push(RenderCall {
            camera_position: camera.position,
            camera_far: camera.far(),
            globals: backend.globals(),
            target: backend.render_target(),
            depth_write: backend.depth_write(),
            hidden,
        });

        if let Some(err) = self.fail_with.take() {
            return Err(err);
        }

        if begin_scene_pass(backend, "Reflection Scene") {
            backend.end_render_pass();
        }
        Ok(())
    }
}

/// Surface whose local +Z is world +Y, raised to `height`
pub fn floor_matrix(height: f32) -> Mat4 {
    Mat4::from_rotation_translation(
        Quat::from_rotation_x(-FRAC_PI_2),
        Vec3::new(0.0, height, 0.0),
    )
}

pub fn viewer_at(position: Vec3) -> ViewerCamera {
    ViewerCamera::looking_at(
        position,
        Vec3::ZERO,
        Projection::perspective(60.0, 16.0 / 9.0, 0.1, 100.0),
    )
}

/// Route `log` output to the test harness.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
