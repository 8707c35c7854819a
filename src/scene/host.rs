//! Scene host seam
//!
//! The reflector never walks a scene graph itself. It asks its host for a
//! node's world matrix, toggles the node's visibility and asks the host to
//! draw everything from a given camera into whatever target is bound.

use glam::Mat4;

use crate::backend::{BackendResult, GraphicsBackend};
use crate::scene::VirtualCamera;

/// Scene graph and renderer the reflection pass runs inside.
pub trait SceneHost<B: GraphicsBackend> {
    /// Identifies a scene node
    type Node: Copy + std::fmt::Debug;

    /// World matrix of `node`, or `None` if the node no longer exists
    fn world_matrix(&self, node: Self::Node) -> Option<Mat4>;

    /// Show or hide `node` and its descendants
    fn set_visible(&mut self, node: Self::Node, visible: bool);

    /// Draw the visible scene from `camera` into the backend's bound target
    fn render(&mut self, backend: &mut B, camera: &VirtualCamera) -> BackendResult<()>;
}

/// Begin a render pass on the bound offscreen target, clearing it when the
/// renderer auto-clears. Returns `false` when no target is bound.
pub fn begin_scene_pass<B: GraphicsBackend>(backend: &mut B, label: &str) -> bool {
    let Some(target) = backend.render_target() else {
        return false;
    };
    let clear = backend.globals().auto_clear;
    backend.begin_render_pass(&target.pass_descriptor(label, clear));
    true
}
