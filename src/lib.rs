//! Mesh Reflector - real-time planar mirror reflections
//!
//! A reflector renders the scene as seen in a flat surface (floor, water,
//! mirror) into an offscreen texture each frame, and hands the surface
//! shader everything it needs to sample it.
//!
//! # Features
//! - Mirrored virtual camera derived from the viewer and the surface plane
//! - Oblique near-plane clipping, so nothing behind the mirror is rendered
//! - Texture projection matrix mapping the surface onto the reflection
//! - Optional depth-aware separable blur for rough reflections
//! - Renderer toggles and surface visibility restored around every pass
//! - Backend agnostic: headless wgpu, or a recording dummy for tests
//! - Scene access through a small trait, with a Bevy ECS adapter
//!
//! # Example
//!
//! ```no_run
//! use mesh_reflector::backend::BackendResult;
//! use mesh_reflector::*;
//! use glam::Vec3;
//!
//! fn draw_scene(_world: &mut World, _backend: &mut DummyBackend, _camera: &VirtualCamera) -> BackendResult<()> {
//!     // draw every visible entity from `camera`
//!     Ok(())
//! }
//!
//! # fn run(backend: &mut DummyBackend, world: &mut World, floor: Entity) -> ReflectorResult<()> {
//! let mut reflector = MeshReflector::new(ReflectorOptions::default().with_blur([300.0, 100.0]))?;
//! let viewer = ViewerCamera::looking_at(
//!     Vec3::new(0.0, 2.0, 5.0),
//!     Vec3::ZERO,
//!     Projection::perspective(60.0, 16.0 / 9.0, 0.1, 100.0),
//! );
//!
//! let mut scene = WorldScene::new(world, draw_scene);
//! match reflector.render(backend, &mut scene, Some(floor), &viewer)? {
//!     ReflectionOutcome::Rendered { .. } => {
//!         // hand the textures and uniforms to the surface material
//!         let _bindings = reflector.bindings();
//!     }
//!     skipped => log::trace!("{:?}", skipped),
//! }
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod error;
pub mod options;
pub mod pipeline;
pub mod reflection;
pub mod reflector;
pub mod resources;
pub mod scene;

// Re-export Bevy ECS prelude for users
pub use bevy_ecs::prelude::*;

pub use backend::{DummyBackend, GraphicsBackend, RendererGlobals};
#[cfg(feature = "wgpu-backend")]
pub use backend::wgpu_backend::WgpuBackend;
pub use error::{ReflectorError, ReflectorResult};
pub use options::{BlurSize, ReflectorOptions};
pub use pipeline::{BlurParameters, ReflectionTargets};
pub use reflection::{MirrorPose, ReflectorPlane};
pub use reflector::{
    MeshReflector, OptionsChange, ReflectionOutcome, ReflectorBindings, ReflectorDefines,
    ReflectorUniforms,
};
pub use resources::{GpuTexture, TextureData};
pub use scene::{
    Projection, SceneHost, Transform, ViewerCamera, VirtualCamera, Visibility, WorldScene,
};
