//! Offscreen reflection render targets
//!
//! A reflector owns one primary target (color + depth) and, while blur is
//! active, a secondary color target receiving the blurred image. The set is
//! rebuilt when the resolution changes; the previous generation is always
//! destroyed before the next one is allocated.

use crate::backend::*;
use crate::error::{ReflectorError, ReflectorResult};

/// Color format of reflection targets (half float, linearly filtered)
pub const REFLECTION_COLOR_FORMAT: TextureFormat = TextureFormat::Rgba16Float;

/// Depth format of the primary target (16-bit unsigned normalized)
pub const REFLECTION_DEPTH_FORMAT: TextureFormat = TextureFormat::Depth16Unorm;

/// A square offscreen target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderTarget {
    pub color_texture: TextureHandle,
    pub color_view: TextureViewHandle,
    pub depth_texture: Option<TextureHandle>,
    pub depth_view: Option<TextureViewHandle>,
    pub size: u32,
}

impl RenderTarget {
    /// Allocate a target. Anything allocated before a failure is destroyed.
    pub fn create<B: GraphicsBackend>(
        backend: &mut B,
        label: &str,
        size: u32,
        with_depth: bool,
    ) -> BackendResult<Self> {
        let color_texture = backend.create_texture(&TextureDescriptor {
            label: Some(format!("{label} Color")),
            width: size,
            height: size,
            format: REFLECTION_COLOR_FORMAT,
            usage: TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING,
        })?;
        let color_view = match backend.create_texture_view(color_texture) {
            Ok(view) => view,
            Err(err) => {
                backend.destroy_texture(color_texture);
                return Err(err);
            }
        };

        let mut target = Self {
            color_texture,
            color_view,
            depth_texture: None,
            depth_view: None,
            size,
        };

        if with_depth {
            if let Err(err) = target.attach_depth(backend, label) {
                target.destroy(backend);
                return Err(err);
            }
        }

        Ok(target)
    }

    fn attach_depth<B: GraphicsBackend>(&mut self, backend: &mut B, label: &str) -> BackendResult<()> {
        let depth_texture = backend.create_texture(&TextureDescriptor {
            label: Some(format!("{label} Depth")),
            width: self.size,
            height: self.size,
            format: REFLECTION_DEPTH_FORMAT,
            usage: TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING,
        })?;
        self.depth_texture = Some(depth_texture);
        self.depth_view = Some(backend.create_texture_view(depth_texture)?);
        Ok(())
    }

    /// Binding for scene renders into this target
    pub fn binding(&self) -> RenderTargetBinding {
        RenderTargetBinding {
            color: self.color_view,
            depth: self.depth_view,
            width: self.size,
            height: self.size,
        }
    }

    pub fn destroy<B: GraphicsBackend>(self, backend: &mut B) {
        if let Some(view) = self.depth_view {
            backend.destroy_texture_view(view);
        }
        if let Some(texture) = self.depth_texture {
            backend.destroy_texture(texture);
        }
        backend.destroy_texture_view(self.color_view);
        backend.destroy_texture(self.color_texture);
    }
}

/// The targets of one generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReflectionTargets {
    /// Scene rendered from the virtual camera (color + depth)
    pub primary: RenderTarget,
    /// Blurred copy of `primary`, present only while blur is active
    pub secondary: Option<RenderTarget>,
    pub resolution: u32,
    /// Bumped every time any handle above changes
    pub generation: u64,
}

/// Lazily (re)built reflection targets.
#[derive(Debug, Default)]
pub struct TargetCache {
    current: Option<ReflectionTargets>,
    generation: u64,
}

impl TargetCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&ReflectionTargets> {
        self.current.as_ref()
    }

    /// Make sure targets exist for `resolution`, with a secondary target iff
    /// `with_blur`. Reuses the current set when nothing changed.
    pub fn ensure<B: GraphicsBackend>(
        &mut self,
        backend: &mut B,
        resolution: u32,
        with_blur: bool,
    ) -> ReflectorResult<ReflectionTargets> {
        let max = backend.max_texture_dimension();
        if resolution == 0 || resolution > max {
            return Err(ReflectorError::InvalidResolution { resolution, max });
        }

        match self.current {
            Some(targets) if targets.resolution == resolution => {
                if targets.secondary.is_some() == with_blur {
                    return Ok(targets);
                }
                self.toggle_secondary(backend, targets, with_blur)
            }
            _ => self.rebuild(backend, resolution, with_blur),
        }
    }

    fn rebuild<B: GraphicsBackend>(
        &mut self,
        backend: &mut B,
        resolution: u32,
        with_blur: bool,
    ) -> ReflectorResult<ReflectionTargets> {
        self.release(backend);

        let primary = RenderTarget::create(backend, "Reflection", resolution, true)?;
        let secondary = if with_blur {
            match RenderTarget::create(backend, "Reflection Blur", resolution, false) {
                Ok(target) => Some(target),
                Err(err) => {
                    primary.destroy(backend);
                    return Err(err.into());
                }
            }
        } else {
            None
        };

        self.generation += 1;
        log::debug!(
            "Allocated reflection targets {}x{} (blur: {}, generation {})",
            resolution,
            resolution,
            with_blur,
            self.generation
        );

        let targets = ReflectionTargets {
            primary,
            secondary,
            resolution,
            generation: self.generation,
        };
        self.current = Some(targets);
        Ok(targets)
    }

    fn toggle_secondary<B: GraphicsBackend>(
        &mut self,
        backend: &mut B,
        mut targets: ReflectionTargets,
        with_blur: bool,
    ) -> ReflectorResult<ReflectionTargets> {
        if let Some(secondary) = targets.secondary.take() {
            secondary.destroy(backend);
        }
        let created = with_blur
            .then(|| RenderTarget::create(backend, "Reflection Blur", targets.resolution, false));

        self.generation += 1;
        targets.generation = self.generation;
        // On failure the primary stays valid without a blur target.
        let result = match created {
            Some(Err(err)) => Err(err.into()),
            Some(Ok(secondary)) => {
                targets.secondary = Some(secondary);
                Ok(targets)
            }
            None => Ok(targets),
        };
        self.current = Some(targets);

        log::debug!(
            "Reflection blur target {} (generation {})",
            if with_blur { "allocated" } else { "released" },
            self.generation
        );
        result
    }

    /// Destroy the current generation, if any.
    pub fn release<B: GraphicsBackend>(&mut self, backend: &mut B) {
        if let Some(targets) = self.current.take() {
            log::debug!(
                "Releasing reflection targets {}x{} (generation {})",
                targets.resolution,
                targets.resolution,
                targets.generation
            );
            targets.primary.destroy(backend);
            if let Some(secondary) = targets.secondary {
                secondary.destroy(backend);
            }
        }
    }
}
