//! Mesh reflector
//!
//! Owns the virtual camera, the offscreen targets and the blur passes of
//! one reflecting surface, and renders its reflection once per frame:
//!
//! 1. Resolve the surface node, skip if it is gone
//! 2. Hide it and disable renderer toggles that break offscreen passes
//! 3. Mirror the viewer across the plane, skip if the plane faces away
//! 4. Build the texture matrix, then bend the near plane onto the mirror
//! 5. Render the scene into the primary target, blur into the secondary
//! 6. Restore toggles and visibility, unbind the target

mod defines;
mod uniforms;

pub use defines::{MaterialVariantCache, ReflectorDefines};
pub use uniforms::{
    reflection_uv, surface_shader_source, ReflectorBindings, ReflectorUniforms,
    REFLECTOR_SURFACE_SHADER,
};

use glam::Mat4;

use crate::backend::{GraphicsBackend, TextureViewHandle};
use crate::error::ReflectorResult;
use crate::options::ReflectorOptions;
use crate::pipeline::{BlurCompositor, ReflectionTargets, RendererStateSnapshot, TargetCache};
use crate::reflection::{
    apply_oblique_near_plane, texture_matrix, view_space_clip_plane, MirrorPose, ReflectorPlane,
};
use crate::scene::{SceneHost, ViewerCamera, VirtualCamera};

/// What a call to [`MeshReflector::render`] did.
///
/// Every variant but `Rendered` leaves the textures and texture matrix of
/// the last rendered frame in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReflectionOutcome {
    Rendered { blurred: bool },
    /// No render-time parent was given
    SkippedNoParent,
    /// The parent has no world transform (despawned or not ready)
    SkippedSurfaceUnavailable,
    /// The viewer is behind the reflecting plane
    SkippedFacingAway,
}

impl ReflectionOutcome {
    pub fn is_rendered(&self) -> bool {
        matches!(self, ReflectionOutcome::Rendered { .. })
    }
}

/// Effects of an options or distortion map update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OptionsChange {
    /// The shader variant must be rebuilt
    pub defines_changed: bool,
    /// Targets are reallocated on the next render
    pub targets_changed: bool,
}

/// Planar reflection of one surface.
#[derive(Debug)]
pub struct MeshReflector {
    options: ReflectorOptions,
    camera: VirtualCamera,
    texture_matrix: Mat4,
    targets: TargetCache,
    blur: Option<BlurCompositor>,
    distortion_map: Option<TextureViewHandle>,
    defines: ReflectorDefines,
    defines_revision: u64,
    last_outcome: Option<ReflectionOutcome>,
}

impl MeshReflector {
    pub fn new(options: ReflectorOptions) -> ReflectorResult<Self> {
        options.validate()?;
        let defines = ReflectorDefines::from_options(&options, false);
        Ok(Self {
            options,
            camera: VirtualCamera::default(),
            texture_matrix: Mat4::IDENTITY,
            targets: TargetCache::new(),
            blur: None,
            distortion_map: None,
            defines,
            defines_revision: 0,
            last_outcome: None,
        })
    }

    pub fn options(&self) -> &ReflectorOptions {
        &self.options
    }

    /// Replace the options. Targets follow lazily on the next render.
    pub fn set_options(&mut self, options: ReflectorOptions) -> ReflectorResult<OptionsChange> {
        options.validate()?;
        let targets_changed = options.resolution != self.options.resolution
            || options.has_blur() != self.options.has_blur();
        self.options = options;
        let defines_changed = self.refresh_defines();
        Ok(OptionsChange {
            defines_changed,
            targets_changed,
        })
    }

    /// Bind or unbind the distortion map sampled by the surface shader.
    pub fn set_distortion_map(&mut self, view: Option<TextureViewHandle>) -> OptionsChange {
        self.distortion_map = view;
        OptionsChange {
            defines_changed: self.refresh_defines(),
            targets_changed: false,
        }
    }

    fn refresh_defines(&mut self) -> bool {
        let defines = ReflectorDefines::from_options(&self.options, self.distortion_map.is_some());
        if defines == self.defines {
            return false;
        }
        log::debug!(
            "Reflector defines changed: '{}' -> '{}'",
            self.defines.key().trim(),
            defines.key().trim()
        );
        self.defines = defines;
        self.defines_revision += 1;
        true
    }

    pub fn defines(&self) -> ReflectorDefines {
        self.defines
    }

    /// Bumped on every defines change
    pub fn defines_revision(&self) -> u64 {
        self.defines_revision
    }

    /// Allocate or reuse targets for the current options, and the blur
    /// passes when blur is active.
    pub fn prepare<B: GraphicsBackend>(&mut self, backend: &mut B) -> ReflectorResult<ReflectionTargets> {
        let has_blur = self.options.has_blur();
        let targets = self
            .targets
            .ensure(backend, self.options.resolution, has_blur)?;

        if has_blur && self.blur.is_none() {
            self.blur = Some(BlurCompositor::new(backend)?);
        } else if !has_blur {
            if let Some(blur) = self.blur.take() {
                blur.release(backend);
            }
        }
        Ok(targets)
    }

    /// Render this frame's reflection.
    ///
    /// `parent` is the node carrying the reflecting surface; it is hidden
    /// while the scene is drawn from the virtual camera. Renderer globals,
    /// parent visibility and the render target binding are restored on
    /// every path once the pass has started, including scene errors.
    pub fn render<B, S>(
        &mut self,
        backend: &mut B,
        scene: &mut S,
        parent: Option<S::Node>,
        viewer: &ViewerCamera,
    ) -> ReflectorResult<ReflectionOutcome>
    where
        B: GraphicsBackend,
        S: SceneHost<B>,
    {
        let Some(parent) = parent else {
            log::trace!("Reflection skipped: no parent");
            return Ok(self.record(ReflectionOutcome::SkippedNoParent));
        };
        let Some(surface_world) = scene.world_matrix(parent) else {
            log::trace!("Reflection skipped: parent {:?} has no transform", parent);
            return Ok(self.record(ReflectionOutcome::SkippedSurfaceUnavailable));
        };

        let targets = self.prepare(backend)?;

        scene.set_visible(parent, false);
        let snapshot = RendererStateSnapshot::capture_and_disable(backend);

        let result = self.render_pass(backend, scene, viewer, &surface_world, &targets);

        snapshot.restore(backend);
        scene.set_visible(parent, true);
        backend.set_render_target(None);

        let outcome = result?;
        Ok(self.record(outcome))
    }

    fn render_pass<B, S>(
        &mut self,
        backend: &mut B,
        scene: &mut S,
        viewer: &ViewerCamera,
        surface_world: &Mat4,
        targets: &ReflectionTargets,
    ) -> ReflectorResult<ReflectionOutcome>
    where
        B: GraphicsBackend,
        S: SceneHost<B>,
    {
        let plane = ReflectorPlane::from_world_matrix(surface_world, self.options.reflector_offset);
        let Some(pose) = MirrorPose::compute(viewer, &plane) else {
            log::trace!("Reflection skipped: plane faces away from the viewer");
            return Ok(ReflectionOutcome::SkippedFacingAway);
        };
        pose.apply(&mut self.camera, viewer);

        let view = self.camera.view_matrix();
        let mut projection = self.camera.projection_matrix();
        self.texture_matrix = texture_matrix(&projection, &view, surface_world);

        if apply_oblique_near_plane(&mut projection, view_space_clip_plane(&plane, &view)) {
            self.camera.set_projection_matrix(projection);
        }

        backend.set_render_target(Some(targets.primary.binding()));
        backend.set_depth_write(true);
        if !backend.globals().auto_clear {
            backend.clear();
        }

        scene.render(backend, &self.camera)?;

        let blurred = match self.blur.as_mut() {
            Some(blur) => blur.apply(backend, targets, &self.options.blur_parameters())?,
            None => false,
        };

        Ok(ReflectionOutcome::Rendered { blurred })
    }

    fn record(&mut self, outcome: ReflectionOutcome) -> ReflectionOutcome {
        self.last_outcome = Some(outcome);
        outcome
    }

    /// Outcome of the most recent successful `render` call
    pub fn last_outcome(&self) -> Option<ReflectionOutcome> {
        self.last_outcome
    }

    /// Local surface position to reflection texture space, as of the last
    /// rendered frame
    pub fn texture_matrix(&self) -> Mat4 {
        self.texture_matrix
    }

    pub fn virtual_camera(&self) -> &VirtualCamera {
        &self.camera
    }

    pub fn uniforms(&self) -> ReflectorUniforms {
        ReflectorUniforms::new(self.texture_matrix, &self.options)
    }

    /// Everything the surface shader binds, once targets exist.
    pub fn bindings(&self) -> Option<ReflectorBindings> {
        let targets = self.targets.current()?;
        Some(ReflectorBindings {
            t_diffuse: targets.primary.color_view,
            t_depth: targets.primary.depth_view?,
            t_diffuse_blur: targets.secondary.map(|target| target.color_view),
            distortion_map: self.distortion_map,
            defines: self.defines,
            generation: targets.generation,
            uniforms: self.uniforms(),
        })
    }

    /// Destroy every GPU resource the reflector owns.
    pub fn release<B: GraphicsBackend>(&mut self, backend: &mut B) {
        self.targets.release(backend);
        if let Some(blur) = self.blur.take() {
            blur.release(backend);
        }
    }
}
