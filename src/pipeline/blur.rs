//! Depth-aware separable blur
//!
//! Blurs the primary reflection into the secondary target with two
//! fullscreen passes: horizontal into an intermediate target owned by the
//! compositor, then vertical into the destination. Both passes read the
//! primary depth so the radius can follow scene depth.

use bytemuck::{Pod, Zeroable};

use super::targets::{ReflectionTargets, RenderTarget, REFLECTION_COLOR_FORMAT};
use crate::backend::*;
use crate::error::ReflectorResult;

/// Blur radii and depth falloff.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlurParameters {
    /// Horizontal radius in texels
    pub width: f32,
    /// Vertical radius in texels
    pub height: f32,
    pub min_depth_threshold: f32,
    pub max_depth_threshold: f32,
    /// Depth modulation strength; zero disables it
    pub depth_scale: f32,
    pub depth_to_blur_ratio_bias: f32,
}

impl Default for BlurParameters {
    fn default() -> Self {
        Self {
            width: 0.0,
            height: 0.0,
            min_depth_threshold: 0.9,
            max_depth_threshold: 1.0,
            depth_scale: 0.0,
            depth_to_blur_ratio_bias: 0.25,
        }
    }
}

impl BlurParameters {
    pub fn is_active(&self) -> bool {
        self.width + self.height > 0.0
    }

    pub fn uses_depth(&self) -> bool {
        self.depth_scale > 0.0
    }

    /// Fraction of the full radius used at normalized `depth`.
    ///
    /// Matches the blur shader: ramps from the bias at `min_depth_threshold`
    /// towards full radius at `max_depth_threshold`. Constant 1 without
    /// depth modulation.
    pub fn radius_scale(&self, depth: f32) -> f32 {
        if !self.uses_depth() {
            return 1.0;
        }

        let ramp = if self.max_depth_threshold > self.min_depth_threshold {
            let t = ((depth - self.min_depth_threshold)
                / (self.max_depth_threshold - self.min_depth_threshold))
                .clamp(0.0, 1.0);
            t * t * (3.0 - 2.0 * t)
        } else if depth >= self.max_depth_threshold {
            1.0
        } else {
            0.0
        };

        (ramp * self.depth_scale + self.depth_to_blur_ratio_bias).clamp(0.0, 1.0)
    }

    /// `(width, height)` radii at `depth`
    pub fn effective_radius(&self, depth: f32) -> (f32, f32) {
        let scale = self.radius_scale(depth);
        (self.width * scale, self.height * scale)
    }

    fn uniform(&self, direction: [f32; 2], resolution: u32) -> BlurUniform {
        let texel = 1.0 / resolution as f32;
        BlurUniform {
            direction,
            texel_size: [texel, texel],
            radius: if direction[0] > 0.0 {
                self.width
            } else {
                self.height
            },
            min_depth_threshold: self.min_depth_threshold,
            max_depth_threshold: self.max_depth_threshold,
            depth_scale: self.depth_scale,
            depth_to_blur_ratio_bias: self.depth_to_blur_ratio_bias,
            use_depth: u32::from(self.uses_depth()),
            _padding: [0.0; 2],
        }
    }
}

/// GPU layout of `BlurParams` in [`BLUR_SHADER`]
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct BlurUniform {
    pub direction: [f32; 2],
    pub texel_size: [f32; 2],
    pub radius: f32,
    pub min_depth_threshold: f32,
    pub max_depth_threshold: f32,
    pub depth_scale: f32,
    pub depth_to_blur_ratio_bias: f32,
    pub use_depth: u32,
    pub _padding: [f32; 2],
}

pub const BLUR_SHADER: &str = r#"
struct BlurParams {
    direction: vec2<f32>,
    texel_size: vec2<f32>,
    radius: f32,
    min_depth_threshold: f32,
    max_depth_threshold: f32,
    depth_scale: f32,
    depth_to_blur_ratio_bias: f32,
    use_depth: u32,
    _padding: vec2<f32>,
}

@group(0) @binding(0) var source_texture: texture_2d<f32>;
@group(0) @binding(1) var depth_texture: texture_depth_2d;
@group(0) @binding(2) var source_sampler: sampler;
@group(0) @binding(3) var<uniform> params: BlurParams;

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
}

@vertex
fn vs_main(@builtin(vertex_index) vertex_index: u32) -> VertexOutput {
    var output: VertexOutput;
    let x = f32((vertex_index << 1u) & 2u);
    let y = f32(vertex_index & 2u);
    output.position = vec4<f32>(x * 2.0 - 1.0, y * 2.0 - 1.0, 0.0, 1.0);
    output.uv = vec2<f32>(x, 1.0 - y);
    return output;
}

fn radius_scale(pixel: vec2<i32>) -> f32 {
    if (params.use_depth == 0u) {
        return 1.0;
    }
    let depth = textureLoad(depth_texture, pixel, 0);
    let smooth_ramp = smoothstep(params.min_depth_threshold, params.max_depth_threshold, depth);
    let hard_ramp = step(params.max_depth_threshold, depth);
    let ramp = select(hard_ramp, smooth_ramp, params.max_depth_threshold > params.min_depth_threshold);
    return clamp(ramp * params.depth_scale + params.depth_to_blur_ratio_bias, 0.0, 1.0);
}

@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    var weights = array<f32, 5>(0.227027, 0.1945946, 0.1216216, 0.054054, 0.016216);

    let scale = radius_scale(vec2<i32>(input.position.xy));
    let step_uv = params.direction * params.texel_size * params.radius * scale * 0.25;

    var color = textureSampleLevel(source_texture, source_sampler, input.uv, 0.0) * weights[0];
    for (var i = 1; i < 5; i = i + 1) {
        let offset = step_uv * f32(i);
        color += textureSampleLevel(source_texture, source_sampler, input.uv + offset, 0.0) * weights[i];
        color += textureSampleLevel(source_texture, source_sampler, input.uv - offset, 0.0) * weights[i];
    }
    return color;
}
"#;

/// Bind groups of one target generation
#[derive(Debug, Clone, Copy)]
struct PassBindGroups {
    generation: u64,
    intermediate: TextureViewHandle,
    horizontal: BindGroupHandle,
    vertical: BindGroupHandle,
}

/// Runs the two blur passes of a reflector.
#[derive(Debug)]
pub struct BlurCompositor {
    layout: BindGroupLayoutHandle,
    pipeline: RenderPipelineHandle,
    sampler: SamplerHandle,
    horizontal_uniform: BufferHandle,
    vertical_uniform: BufferHandle,
    intermediate: Option<RenderTarget>,
    bind_groups: Option<PassBindGroups>,
}

impl BlurCompositor {
    pub fn new<B: GraphicsBackend>(backend: &mut B) -> BackendResult<Self> {
        let layout = backend.create_bind_group_layout(&[
            BindGroupLayoutEntry {
                binding: 0,
                visibility: ShaderStageFlags::FRAGMENT,
                ty: BindingType::Texture {
                    sample_type: TextureSampleType::Float { filterable: true },
                },
            },
            BindGroupLayoutEntry {
                binding: 1,
                visibility: ShaderStageFlags::FRAGMENT,
                ty: BindingType::Texture {
                    sample_type: TextureSampleType::Depth,
                },
            },
            BindGroupLayoutEntry {
                binding: 2,
                visibility: ShaderStageFlags::FRAGMENT,
                ty: BindingType::Sampler { filtering: true },
            },
            BindGroupLayoutEntry {
                binding: 3,
                visibility: ShaderStageFlags::FRAGMENT,
                ty: BindingType::UniformBuffer,
            },
        ])?;

        let pipeline = backend.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some("Reflection Blur Pipeline".into()),
            shader: BLUR_SHADER.to_string(),
            fragment: true,
            vertex_layouts: Vec::new(),
            bind_group_layouts: vec![layout],
            primitive_topology: PrimitiveTopology::TriangleList,
            cull_mode: CullMode::None,
            depth_stencil: None,
            color_targets: vec![REFLECTION_COLOR_FORMAT],
        })?;

        let sampler = backend.create_sampler(&SamplerDescriptor {
            label: Some("Reflection Blur Sampler".into()),
            ..Default::default()
        })?;

        let uniform_desc = |label: &str| BufferDescriptor {
            label: Some(label.into()),
            size: std::mem::size_of::<BlurUniform>() as u64,
            usage: BufferUsage::UNIFORM | BufferUsage::COPY_DST,
        };
        let horizontal_uniform = backend.create_buffer(&uniform_desc("Blur Horizontal Params"))?;
        let vertical_uniform = backend.create_buffer(&uniform_desc("Blur Vertical Params"))?;

        log::info!("Reflection blur pipeline created");

        Ok(Self {
            layout,
            pipeline,
            sampler,
            horizontal_uniform,
            vertical_uniform,
            intermediate: None,
            bind_groups: None,
        })
    }

    /// Blur `targets.primary` into `targets.secondary`.
    ///
    /// Returns `false` without recording anything when blur is inactive or
    /// the targets carry no secondary.
    pub fn apply<B: GraphicsBackend>(
        &mut self,
        backend: &mut B,
        targets: &ReflectionTargets,
        params: &BlurParameters,
    ) -> ReflectorResult<bool> {
        if !params.is_active() {
            return Ok(false);
        }
        let (Some(destination), Some(depth_view)) = (targets.secondary, targets.primary.depth_view)
        else {
            log::trace!("Blur skipped, targets have no secondary or no depth");
            return Ok(false);
        };

        let bind_groups = self.prepare(backend, targets, depth_view)?;

        backend.write_buffer(
            self.horizontal_uniform,
            0,
            bytemuck::bytes_of(&params.uniform([1.0, 0.0], targets.resolution)),
        );
        backend.write_buffer(
            self.vertical_uniform,
            0,
            bytemuck::bytes_of(&params.uniform([0.0, 1.0], targets.resolution)),
        );

        self.draw_pass(
            backend,
            "Reflection Blur Horizontal",
            bind_groups.intermediate,
            bind_groups.horizontal,
        );
        self.draw_pass(
            backend,
            "Reflection Blur Vertical",
            destination.color_view,
            bind_groups.vertical,
        );

        Ok(true)
    }

    fn draw_pass<B: GraphicsBackend>(
        &self,
        backend: &mut B,
        label: &str,
        destination: TextureViewHandle,
        bind_group: BindGroupHandle,
    ) {
        backend.begin_render_pass(&RenderPassDescriptor {
            label: Some(label.into()),
            color_attachments: vec![ColorAttachment {
                view: destination,
                load_op: LoadOp::Clear([0.0, 0.0, 0.0, 0.0]),
                store_op: StoreOp::Store,
            }],
            depth_stencil_attachment: None,
        });
        backend.set_render_pipeline(self.pipeline);
        backend.set_bind_group(0, bind_group);
        backend.draw(0..3, 0..1);
        backend.end_render_pass();
    }

    /// Intermediate target and bind groups for the current generation.
    fn prepare<B: GraphicsBackend>(
        &mut self,
        backend: &mut B,
        targets: &ReflectionTargets,
        depth_view: TextureViewHandle,
    ) -> ReflectorResult<PassBindGroups> {
        if let Some(groups) = self.bind_groups {
            if groups.generation == targets.generation {
                return Ok(groups);
            }
        }
        self.release_bind_groups(backend);

        let intermediate = match self.intermediate.take() {
            Some(target) if target.size == targets.resolution => target,
            stale => {
                if let Some(old) = stale {
                    old.destroy(backend);
                }
                RenderTarget::create(
                    backend,
                    "Reflection Blur Intermediate",
                    targets.resolution,
                    false,
                )?
            }
        };
        self.intermediate = Some(intermediate);

        let horizontal = self.create_bind_group(
            backend,
            targets.primary.color_view,
            depth_view,
            self.horizontal_uniform,
        )?;
        let vertical = match self.create_bind_group(
            backend,
            intermediate.color_view,
            depth_view,
            self.vertical_uniform,
        ) {
            Ok(group) => group,
            Err(err) => {
                backend.destroy_bind_group(horizontal);
                return Err(err.into());
            }
        };

        let groups = PassBindGroups {
            generation: targets.generation,
            intermediate: intermediate.color_view,
            horizontal,
            vertical,
        };
        self.bind_groups = Some(groups);
        log::debug!("Blur bind groups rebuilt for generation {}", targets.generation);
        Ok(groups)
    }

    fn create_bind_group<B: GraphicsBackend>(
        &self,
        backend: &mut B,
        source: TextureViewHandle,
        depth: TextureViewHandle,
        uniform: BufferHandle,
    ) -> BackendResult<BindGroupHandle> {
        backend.create_bind_group(
            self.layout,
            &[
                (0, BindGroupEntry::Texture(source)),
                (1, BindGroupEntry::Texture(depth)),
                (2, BindGroupEntry::Sampler(self.sampler)),
                (
                    3,
                    BindGroupEntry::Buffer {
                        buffer: uniform,
                        offset: 0,
                        size: None,
                    },
                ),
            ],
        )
    }

    fn release_bind_groups<B: GraphicsBackend>(&mut self, backend: &mut B) {
        if let Some(groups) = self.bind_groups.take() {
            backend.destroy_bind_group(groups.horizontal);
            backend.destroy_bind_group(groups.vertical);
        }
    }

    /// Destroy the intermediate target and uniform buffers.
    pub fn release<B: GraphicsBackend>(mut self, backend: &mut B) {
        self.release_bind_groups(backend);
        if let Some(intermediate) = self.intermediate.take() {
            intermediate.destroy(backend);
        }
        backend.destroy_buffer(self.horizontal_uniform);
        backend.destroy_buffer(self.vertical_uniform);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::TargetCache;

    fn blurred(width: f32, height: f32) -> BlurParameters {
        BlurParameters {
            width,
            height,
            ..Default::default()
        }
    }

    #[test]
    fn test_blur_active_iff_radius_positive() {
        assert!(!blurred(0.0, 0.0).is_active());
        assert!(blurred(0.0, 2.0).is_active());
        assert!(blurred(3.0, 0.0).is_active());
    }

    #[test]
    fn test_radius_constant_without_depth_scale() {
        let params = blurred(10.0, 4.0);
        for depth in [0.0, 0.5, 0.9, 0.95, 1.0] {
            assert_eq!(params.effective_radius(depth), (10.0, 4.0));
        }
    }

    #[test]
    fn test_radius_ramps_with_depth() {
        let params = BlurParameters {
            depth_scale: 1.0,
            ..blurred(8.0, 8.0)
        };
        assert_eq!(params.radius_scale(0.5), 0.25);
        assert_eq!(params.radius_scale(1.0), 1.0);
        let mid = params.radius_scale(0.95);
        assert!(mid > 0.25 && mid < 1.0);
    }

    #[test]
    fn test_equal_thresholds_step() {
        let params = BlurParameters {
            depth_scale: 0.5,
            min_depth_threshold: 0.8,
            max_depth_threshold: 0.8,
            depth_to_blur_ratio_bias: 0.0,
            ..blurred(1.0, 1.0)
        };
        assert_eq!(params.radius_scale(0.79), 0.0);
        assert_eq!(params.radius_scale(0.8), 0.5);
    }

    #[test]
    fn test_uniform_layout() {
        assert_eq!(std::mem::size_of::<BlurUniform>(), 48);
        let uniform = blurred(6.0, 2.0).uniform([0.0, 1.0], 256);
        assert_eq!(uniform.radius, 2.0);
        assert_eq!(uniform.texel_size, [1.0 / 256.0; 2]);
        assert_eq!(uniform.use_depth, 0);
    }

    #[test]
    fn test_pipeline_is_fullscreen_without_depth() {
        let mut backend = DummyBackend::new();
        let blur = BlurCompositor::new(&mut backend).unwrap();
        let desc = backend.pipeline_descriptor(blur.pipeline).unwrap();
        assert!(desc.vertex_layouts.is_empty());
        assert!(desc.depth_stencil.is_none());
        assert_eq!(desc.color_targets, vec![REFLECTION_COLOR_FORMAT]);
        assert_eq!(desc.bind_group_layouts, vec![blur.layout]);
    }

    #[test]
    fn test_two_passes_into_intermediate_then_secondary() {
        let mut backend = DummyBackend::new();
        let mut cache = TargetCache::new();
        let targets = cache.ensure(&mut backend, 64, true).unwrap();
        let mut blur = BlurCompositor::new(&mut backend).unwrap();
        backend.clear_commands();

        assert!(blur.apply(&mut backend, &targets, &blurred(4.0, 4.0)).unwrap());

        let passes: Vec<_> = backend
            .commands()
            .iter()
            .filter_map(|command| match command {
                DummyCommand::BeginRenderPass { color, .. } => Some(color[0]),
                _ => None,
            })
            .collect();
        let intermediate = blur.intermediate.unwrap();
        assert_eq!(
            passes,
            vec![intermediate.color_view, targets.secondary.unwrap().color_view]
        );
        assert_eq!(
            backend
                .commands()
                .iter()
                .filter(|c| matches!(c, DummyCommand::Draw { .. }))
                .count(),
            2
        );
    }

    #[test]
    fn test_bind_groups_follow_generation() {
        let mut backend = DummyBackend::new();
        let mut cache = TargetCache::new();
        let mut blur = BlurCompositor::new(&mut backend).unwrap();
        let params = blurred(2.0, 2.0);

        let first = cache.ensure(&mut backend, 64, true).unwrap();
        blur.apply(&mut backend, &first, &params).unwrap();
        let groups = blur.bind_groups.unwrap();
        blur.apply(&mut backend, &first, &params).unwrap();
        assert_eq!(blur.bind_groups.unwrap().horizontal, groups.horizontal);

        let resized = cache.ensure(&mut backend, 128, true).unwrap();
        blur.apply(&mut backend, &resized, &params).unwrap();
        assert!(!backend.is_bind_group_live(groups.horizontal));
        assert!(!backend.is_bind_group_live(groups.vertical));
        assert_eq!(blur.intermediate.unwrap().size, 128);
    }

    #[test]
    fn test_inactive_blur_records_nothing() {
        let mut backend = DummyBackend::new();
        let mut cache = TargetCache::new();
        let targets = cache.ensure(&mut backend, 32, false).unwrap();
        let mut blur = BlurCompositor::new(&mut backend).unwrap();
        backend.clear_commands();

        assert!(!blur.apply(&mut backend, &targets, &blurred(0.0, 0.0)).unwrap());
        assert!(!blur.apply(&mut backend, &targets, &blurred(2.0, 0.0)).unwrap());
        assert!(backend.commands().is_empty());
    }
}
