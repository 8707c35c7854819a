//! Data handed to the surface shader

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec2, Vec3};

use super::defines::ReflectorDefines;
use crate::backend::TextureViewHandle;
use crate::options::ReflectorOptions;

/// GPU layout of `ReflectorParams` in [`REFLECTOR_SURFACE_SHADER`]
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ReflectorUniforms {
    /// Local surface position to reflection texture space
    pub texture_matrix: Mat4,
    pub mirror: f32,
    pub mix_blur: f32,
    pub mix_strength: f32,
    pub mix_contrast: f32,
    pub distortion: f32,
    pub min_depth_threshold: f32,
    pub max_depth_threshold: f32,
    pub depth_scale: f32,
    pub depth_to_blur_ratio_bias: f32,
    pub has_blur: u32,
    pub _padding: [f32; 2],
}

impl ReflectorUniforms {
    pub fn new(texture_matrix: Mat4, options: &ReflectorOptions) -> Self {
        Self {
            texture_matrix,
            mirror: options.mirror,
            mix_blur: options.mix_blur,
            mix_strength: options.mix_strength,
            mix_contrast: options.mix_contrast,
            distortion: options.distortion,
            min_depth_threshold: options.min_depth_threshold,
            max_depth_threshold: options.max_depth_threshold,
            depth_scale: options.depth_scale,
            depth_to_blur_ratio_bias: options.depth_to_blur_ratio_bias,
            has_blur: u32::from(options.has_blur()),
            _padding: [0.0; 2],
        }
    }
}

/// Textures and parameters of the current reflection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReflectorBindings {
    /// Primary reflection color
    pub t_diffuse: TextureViewHandle,
    /// Primary reflection depth
    pub t_depth: TextureViewHandle,
    /// Blurred reflection, present iff blur is active
    pub t_diffuse_blur: Option<TextureViewHandle>,
    pub distortion_map: Option<TextureViewHandle>,
    pub defines: ReflectorDefines,
    /// Target generation the views belong to
    pub generation: u64,
    pub uniforms: ReflectorUniforms,
}

impl ReflectorBindings {
    pub fn has_blur(&self) -> bool {
        self.t_diffuse_blur.is_some()
    }

    /// View for the blur slot. Without blur the primary is bound there so
    /// every shader variant sees a complete bind group.
    pub fn blur_or_diffuse(&self) -> TextureViewHandle {
        self.t_diffuse_blur.unwrap_or(self.t_diffuse)
    }
}

/// Reflection texture coordinate of a local surface point, origin at the
/// top left as wgpu samples it. `None` behind the virtual camera.
pub fn reflection_uv(texture_matrix: &Mat4, local: Vec3) -> Option<Vec2> {
    let projected = *texture_matrix * local.extend(1.0);
    if projected.w <= 0.0 {
        return None;
    }
    Some(Vec2::new(
        projected.x / projected.w,
        1.0 - projected.y / projected.w,
    ))
}

/// Reference surface shader. Prefix with
/// [`ReflectorDefines::wgsl_constants`] (see [`surface_shader_source`]).
///
/// Vertex input is [`crate::backend::ColorVertex`]; the vertex color stands
/// in for the surface's own diffuse color.
pub const REFLECTOR_SURFACE_SHADER: &str = r#"
struct SurfaceTransforms {
    view_proj: mat4x4<f32>,
    model: mat4x4<f32>,
}

struct ReflectorParams {
    texture_matrix: mat4x4<f32>,
    mirror: f32,
    mix_blur: f32,
    mix_strength: f32,
    mix_contrast: f32,
    distortion: f32,
    min_depth_threshold: f32,
    max_depth_threshold: f32,
    depth_scale: f32,
    depth_to_blur_ratio_bias: f32,
    has_blur: u32,
    _padding: vec2<f32>,
}

@group(0) @binding(0) var<uniform> transforms: SurfaceTransforms;
@group(0) @binding(1) var<uniform> reflector: ReflectorParams;
@group(0) @binding(2) var t_diffuse: texture_2d<f32>;
@group(0) @binding(3) var t_depth: texture_depth_2d;
@group(0) @binding(4) var t_diffuse_blur: texture_2d<f32>;
@group(0) @binding(5) var distortion_map: texture_2d<f32>;
@group(0) @binding(6) var linear_sampler: sampler;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) color: vec3<f32>,
}

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) color: vec3<f32>,
    @location(1) projected: vec4<f32>,
    @location(2) surface_uv: vec2<f32>,
}

@vertex
fn vs_main(input: VertexInput) -> VertexOutput {
    var output: VertexOutput;
    let local = vec4<f32>(input.position, 1.0);
    output.clip_position = transforms.view_proj * transforms.model * local;
    output.color = input.color;
    output.projected = reflector.texture_matrix * local;
    output.surface_uv = input.position.xy * 0.5 + vec2<f32>(0.5);
    return output;
}

@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    var projected_uv = input.projected.xy / input.projected.w;
    if (USE_DISTORTION) {
        let distortion_factor = textureSample(distortion_map, linear_sampler, input.surface_uv).r * reflector.distortion;
        projected_uv = projected_uv + vec2<f32>(distortion_factor);
    }
    // Render targets have their origin at the top left.
    let uv = vec2<f32>(projected_uv.x, 1.0 - projected_uv.y);

    var merge = textureSample(t_diffuse, linear_sampler, uv);
    var blur = textureSample(t_diffuse_blur, linear_sampler, uv);

    if (USE_DEPTH) {
        let size = vec2<f32>(textureDimensions(t_depth));
        let texel = vec2<i32>(clamp(uv, vec2<f32>(0.0), vec2<f32>(1.0)) * (size - vec2<f32>(1.0)));
        let depth = textureLoad(t_depth, texel, 0);
        var depth_factor = smoothstep(reflector.min_depth_threshold, reflector.max_depth_threshold, 1.0 - depth);
        depth_factor = clamp(depth_factor * reflector.depth_scale, 0.0001, 1.0);
        if (USE_BLUR) {
            blur = blur * min(1.0, depth_factor + reflector.depth_to_blur_ratio_bias);
            merge = merge * min(1.0, depth_factor + 0.5);
        } else {
            merge = merge * depth_factor;
        }
    }

    if (USE_BLUR) {
        merge = mix(merge, blur, min(1.0, reflector.mix_blur));
    }

    let contrasted = (merge.rgb - vec3<f32>(0.5)) * reflector.mix_contrast + vec3<f32>(0.5);
    let color = input.color * ((1.0 - min(1.0, reflector.mirror)) + contrasted * reflector.mix_strength);
    return vec4<f32>(color, 1.0);
}
"#;

/// Full surface shader for one variant
pub fn surface_shader_source(defines: ReflectorDefines) -> String {
    format!("{}{}", defines.wgsl_constants(), REFLECTOR_SURFACE_SHADER)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_layout() {
        // mat4 + 10 scalars, padded to a 16 byte multiple
        assert_eq!(std::mem::size_of::<ReflectorUniforms>(), 112);
    }

    #[test]
    fn test_uniforms_pass_options_through() {
        let options = ReflectorOptions::default()
            .with_mix(0.7, 2.0, 1.5)
            .with_mirror(0.25)
            .with_blur(3.0);
        let uniforms = ReflectorUniforms::new(Mat4::IDENTITY, &options);
        assert_eq!(uniforms.mix_blur, 0.7);
        assert_eq!(uniforms.mix_strength, 2.0);
        assert_eq!(uniforms.mix_contrast, 1.5);
        assert_eq!(uniforms.mirror, 0.25);
        assert_eq!(uniforms.has_blur, 1);
    }

    #[test]
    fn test_reflection_uv_flips_v() {
        let uv = reflection_uv(&crate::reflection::TEXTURE_BIAS, Vec3::new(0.5, 0.5, 0.0)).unwrap();
        assert!(uv.abs_diff_eq(Vec2::new(0.75, 0.25), 1e-6));
    }

    #[test]
    fn test_surface_source_declares_every_define() {
        let source = surface_shader_source(ReflectorDefines::USE_BLUR);
        assert!(source.starts_with("const USE_BLUR: bool = true;"));
        assert!(source.contains("const USE_DISTORTION: bool = false;"));
    }
}
