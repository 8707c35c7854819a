//! Headless reflector demo.
//!
//! Orbits a viewer around a reflective floor with a colored backdrop
//! standing behind it, on a headless wgpu device. Each frame renders the
//! reflection, then draws the backdrop and the floor (with the reflector
//! surface shader) into an offscreen screen target, and logs what the
//! reflector did. Frames where the viewer dips below the floor are skipped
//! as facing away.
//!
//! ```bash
//! cargo run --example headless -- --frames 16 --blur 300,100
//! RUST_LOG=debug cargo run --example headless -- --config reflector.toml
//! ```

use std::path::PathBuf;

use clap::Parser;
use glam::{Mat4, Quat, Vec3};
use mesh_reflector::backend::{
    BackendResult, BindGroupEntry, BindGroupHandle, BindGroupLayoutEntry, BindGroupLayoutHandle,
    BindingType, BufferDescriptor, BufferHandle, BufferUsage, ColorVertex, CompareFunction,
    CullMode, DepthStencilState, GraphicsBackend, IndexFormat, PrimitiveTopology,
    RenderPipelineDescriptor, RenderPipelineHandle, SamplerDescriptor, SamplerHandle,
    ShaderStageFlags, TextureSampleType,
};
use mesh_reflector::pipeline::{RenderTarget, REFLECTION_COLOR_FORMAT, REFLECTION_DEPTH_FORMAT};
use mesh_reflector::reflector::{surface_shader_source, MaterialVariantCache};
use mesh_reflector::scene::{begin_scene_pass, CameraUniformData, DEPTH_ZERO_TO_ONE};
use mesh_reflector::{
    GpuTexture, MeshReflector, Projection, ReflectionOutcome, ReflectorDefines, ReflectorOptions,
    ReflectorResult, SceneHost, TextureData, ViewerCamera, VirtualCamera, WgpuBackend,
};

#[derive(Parser, Debug)]
#[command(
    name = "headless",
    about = "Render planar reflections on a headless GPU device"
)]
struct Args {
    /// Reflector options file (TOML). Flags below override it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Reflection texture size in pixels.
    #[arg(long)]
    resolution: Option<u32>,

    /// Blur radius, either `r` or `width,height`.
    #[arg(long, value_delimiter = ',', num_args = 1..=2)]
    blur: Option<Vec<f32>>,

    /// Depth-driven blur strength.
    #[arg(long)]
    depth_scale: Option<f32>,

    /// Distortion map image.
    #[arg(long)]
    distortion_map: Option<PathBuf>,

    /// Number of frames to render.
    #[arg(long, default_value = "8")]
    frames: u32,

    /// Orbit radius of the viewer.
    #[arg(long, default_value = "5.0")]
    orbit: f32,

    /// Size of the square screen target in pixels.
    #[arg(long, default_value = "512")]
    screen_size: u32,
}

const SCENE_SHADER: &str = r#"
struct Camera {
    view: mat4x4<f32>,
    proj: mat4x4<f32>,
    view_proj: mat4x4<f32>,
    position: vec4<f32>,
}

@group(0) @binding(0) var<uniform> camera: Camera;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) color: vec3<f32>,
}

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) color: vec3<f32>,
}

@vertex
fn vs_main(input: VertexInput) -> VertexOutput {
    var output: VertexOutput;
    output.clip_position = camera.view_proj * vec4<f32>(input.position, 1.0);
    output.color = input.color;
    return output;
}

@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    return vec4<f32>(input.color, 1.0);
}
"#;

const QUAD_INDICES: [u32; 6] = [0, 1, 2, 0, 2, 3];

/// Vertex and index buffers of one quad
struct Quad {
    vertices: BufferHandle,
    indices: BufferHandle,
}

impl Quad {
    fn new(backend: &mut WgpuBackend, label: &str, corners: &[ColorVertex; 4]) -> BackendResult<Self> {
        let vertices = backend.create_buffer_init(
            &BufferDescriptor {
                label: Some(format!("{label} Vertices")),
                size: std::mem::size_of_val(corners) as u64,
                usage: BufferUsage::VERTEX,
            },
            bytemuck::cast_slice(corners),
        )?;
        let indices = backend.create_buffer_init(
            &BufferDescriptor {
                label: Some(format!("{label} Indices")),
                size: std::mem::size_of_val(&QUAD_INDICES) as u64,
                usage: BufferUsage::INDEX,
            },
            bytemuck::cast_slice(&QUAD_INDICES),
        )?;
        Ok(Self { vertices, indices })
    }

    fn draw(&self, backend: &mut WgpuBackend) {
        backend.set_vertex_buffer(0, self.vertices, 0);
        backend.set_index_buffer(self.indices, 0, IndexFormat::Uint32);
        backend.draw_indexed(0..QUAD_INDICES.len() as u32, 0, 0..1);
    }

    fn release(self, backend: &mut WgpuBackend) {
        backend.destroy_buffer(self.vertices);
        backend.destroy_buffer(self.indices);
    }
}

fn opaque_depth(depth_write: bool) -> Option<DepthStencilState> {
    Some(DepthStencilState {
        format: REFLECTION_DEPTH_FORMAT,
        depth_write_enabled: depth_write,
        depth_compare: CompareFunction::Less,
    })
}

/// Camera uniform with its bind group
struct CameraBinding {
    buffer: BufferHandle,
    bind_group: BindGroupHandle,
}

impl CameraBinding {
    fn new(backend: &mut WgpuBackend, layout: BindGroupLayoutHandle, label: &str) -> BackendResult<Self> {
        let buffer = backend.create_buffer(&BufferDescriptor {
            label: Some(label.into()),
            size: std::mem::size_of::<CameraUniformData>() as u64,
            usage: BufferUsage::UNIFORM | BufferUsage::COPY_DST,
        })?;
        let bind_group = backend.create_bind_group(
            layout,
            &[(
                0,
                BindGroupEntry::Buffer {
                    buffer,
                    offset: 0,
                    size: None,
                },
            )],
        )?;
        Ok(Self { buffer, bind_group })
    }
}

/// The reflected scene: a backdrop quad behind the floor.
///
/// The mirror and the viewer each get their own camera buffer, since both
/// passes are submitted together and queue writes land before either runs.
struct DemoScene {
    floor: Mat4,
    floor_visible: bool,
    /// Backdrop pipelines indexed by the backend's depth-write toggle
    pipelines: Vec<RenderPipelineHandle>,
    mirror_camera: CameraBinding,
    viewer_camera: CameraBinding,
    backdrop: Quad,
}

impl DemoScene {
    fn new(backend: &mut WgpuBackend, floor: Mat4) -> BackendResult<Self> {
        let layout = backend.create_bind_group_layout(&[BindGroupLayoutEntry {
            binding: 0,
            visibility: ShaderStageFlags::VERTEX,
            ty: BindingType::UniformBuffer,
        }])?;
        let mut pipelines = Vec::with_capacity(2);
        for depth_write in [false, true] {
            pipelines.push(backend.create_render_pipeline(&RenderPipelineDescriptor {
                label: Some("Backdrop Pipeline".into()),
                shader: SCENE_SHADER.to_string(),
                fragment: true,
                vertex_layouts: vec![ColorVertex::layout()],
                bind_group_layouts: vec![layout],
                primitive_topology: PrimitiveTopology::TriangleList,
                cull_mode: CullMode::None,
                depth_stencil: opaque_depth(depth_write),
                color_targets: vec![REFLECTION_COLOR_FORMAT],
            })?);
        }

        let warm = [1.0, 0.55, 0.2];
        let cool = [0.2, 0.45, 1.0];
        let backdrop = Quad::new(
            backend,
            "Backdrop",
            &[
                ColorVertex { position: [-3.0, 0.0, -2.0], color: warm },
                ColorVertex { position: [3.0, 0.0, -2.0], color: warm },
                ColorVertex { position: [3.0, 3.0, -2.0], color: cool },
                ColorVertex { position: [-3.0, 3.0, -2.0], color: cool },
            ],
        )?;

        Ok(Self {
            floor,
            floor_visible: true,
            pipelines,
            mirror_camera: CameraBinding::new(backend, layout, "Mirror Camera")?,
            viewer_camera: CameraBinding::new(backend, layout, "Viewer Camera")?,
            backdrop,
        })
    }

    fn draw_backdrop(&self, backend: &mut WgpuBackend, camera: &CameraBinding) {
        backend.set_render_pipeline(self.pipelines[backend.depth_write() as usize]);
        backend.set_bind_group(0, camera.bind_group);
        self.backdrop.draw(backend);
    }

    fn release(self, backend: &mut WgpuBackend) {
        for camera in [self.mirror_camera, self.viewer_camera] {
            backend.destroy_bind_group(camera.bind_group);
            backend.destroy_buffer(camera.buffer);
        }
        self.backdrop.release(backend);
    }
}

impl SceneHost<WgpuBackend> for DemoScene {
    type Node = ();

    fn world_matrix(&self, _node: ()) -> Option<Mat4> {
        Some(self.floor)
    }

    fn set_visible(&mut self, _node: (), visible: bool) {
        self.floor_visible = visible;
    }

    fn render(&mut self, backend: &mut WgpuBackend, camera: &VirtualCamera) -> BackendResult<()> {
        log::debug!(
            "Drawing scene from {:?} (floor visible: {})",
            camera.position,
            self.floor_visible
        );
        backend.write_buffer(
            self.mirror_camera.buffer,
            0,
            bytemuck::bytes_of(&camera.uniform_data()),
        );
        if begin_scene_pass(backend, "Reflected Scene") {
            self.draw_backdrop(backend, &self.mirror_camera);
            backend.end_render_pass();
        }
        Ok(())
    }
}

/// One surface shader variant
struct SurfaceMaterial {
    pipeline: RenderPipelineHandle,
}

/// The floor, drawn with the reflector surface shader.
struct FloorSurface {
    layout: BindGroupLayoutHandle,
    transforms: BufferHandle,
    params: BufferHandle,
    sampler: SamplerHandle,
    quad: Quad,
    materials: MaterialVariantCache<SurfaceMaterial>,
    bind_group: Option<BindGroupHandle>,
}

impl FloorSurface {
    fn new(backend: &mut WgpuBackend) -> BackendResult<Self> {
        let uniform = |binding| BindGroupLayoutEntry {
            binding,
            visibility: ShaderStageFlags::VERTEX_FRAGMENT,
            ty: BindingType::UniformBuffer,
        };
        let texture = |binding, sample_type| BindGroupLayoutEntry {
            binding,
            visibility: ShaderStageFlags::FRAGMENT,
            ty: BindingType::Texture { sample_type },
        };
        let color = TextureSampleType::Float { filterable: true };
        let layout = backend.create_bind_group_layout(&[
            uniform(0),
            uniform(1),
            texture(2, color),
            texture(3, TextureSampleType::Depth),
            texture(4, color),
            texture(5, color),
            BindGroupLayoutEntry {
                binding: 6,
                visibility: ShaderStageFlags::FRAGMENT,
                ty: BindingType::Sampler { filtering: true },
            },
        ])?;

        let transforms = backend.create_buffer(&BufferDescriptor {
            label: Some("Floor Transforms".into()),
            size: std::mem::size_of::<[Mat4; 2]>() as u64,
            usage: BufferUsage::UNIFORM | BufferUsage::COPY_DST,
        })?;
        let params = backend.create_buffer(&BufferDescriptor {
            label: Some("Floor Reflector Params".into()),
            size: std::mem::size_of::<mesh_reflector::ReflectorUniforms>() as u64,
            usage: BufferUsage::UNIFORM | BufferUsage::COPY_DST,
        })?;
        let sampler = backend.create_sampler(&SamplerDescriptor {
            label: Some("Floor Sampler".into()),
            ..Default::default()
        })?;

        let tint = [0.8, 0.8, 0.85];
        let quad = Quad::new(
            backend,
            "Floor",
            &[
                ColorVertex { position: [-4.0, -4.0, 0.0], color: tint },
                ColorVertex { position: [4.0, -4.0, 0.0], color: tint },
                ColorVertex { position: [4.0, 4.0, 0.0], color: tint },
                ColorVertex { position: [-4.0, 4.0, 0.0], color: tint },
            ],
        )?;

        Ok(Self {
            layout,
            transforms,
            params,
            sampler,
            quad,
            materials: MaterialVariantCache::new(),
            bind_group: None,
        })
    }

    /// Draw the floor into the open pass. Does nothing before the
    /// reflector has targets.
    fn draw(
        &mut self,
        backend: &mut WgpuBackend,
        reflector: &MeshReflector,
        view_proj: Mat4,
        model: Mat4,
    ) -> BackendResult<()> {
        let Some(bindings) = reflector.bindings() else {
            return Ok(());
        };

        backend.write_buffer(self.transforms, 0, bytemuck::cast_slice(&[view_proj, model]));
        backend.write_buffer(self.params, 0, bytemuck::bytes_of(&bindings.uniforms));

        let layout = self.layout;
        let pipeline = self
            .materials
            .get_or_build(bindings.defines, |defines: ReflectorDefines| {
                backend
                    .create_render_pipeline(&RenderPipelineDescriptor {
                        label: Some(format!("Floor Surface{}", defines.key())),
                        shader: surface_shader_source(defines),
                        fragment: true,
                        vertex_layouts: vec![ColorVertex::layout()],
                        bind_group_layouts: vec![layout],
                        primitive_topology: PrimitiveTopology::TriangleList,
                        cull_mode: CullMode::None,
                        depth_stencil: opaque_depth(true),
                        color_targets: vec![REFLECTION_COLOR_FORMAT],
                    })
                    .map(|pipeline| SurfaceMaterial { pipeline })
            })?
            .pipeline;

        // Views may have been regenerated since the last frame
        if let Some(old) = self.bind_group.take() {
            backend.destroy_bind_group(old);
        }
        let bind_group = backend.create_bind_group(
            self.layout,
            &[
                (0, BindGroupEntry::Buffer { buffer: self.transforms, offset: 0, size: None }),
                (1, BindGroupEntry::Buffer { buffer: self.params, offset: 0, size: None }),
                (2, BindGroupEntry::Texture(bindings.t_diffuse)),
                (3, BindGroupEntry::Texture(bindings.t_depth)),
                (4, BindGroupEntry::Texture(bindings.blur_or_diffuse())),
                (5, BindGroupEntry::Texture(bindings.distortion_map.unwrap_or(bindings.t_diffuse))),
                (6, BindGroupEntry::Sampler(self.sampler)),
            ],
        )?;
        self.bind_group = Some(bind_group);

        backend.set_render_pipeline(pipeline);
        backend.set_bind_group(0, bind_group);
        self.quad.draw(backend);
        Ok(())
    }

    fn release(self, backend: &mut WgpuBackend) {
        if let Some(bind_group) = self.bind_group {
            backend.destroy_bind_group(bind_group);
        }
        backend.destroy_buffer(self.transforms);
        backend.destroy_buffer(self.params);
        self.quad.release(backend);
    }
}

fn viewer_uniform(viewer: &ViewerCamera) -> CameraUniformData {
    let view = viewer.view_matrix();
    let proj = DEPTH_ZERO_TO_ONE * viewer.projection;
    CameraUniformData {
        view,
        proj,
        view_proj: proj * view,
        position: viewer.position().extend(viewer.far),
    }
}

fn options_from(args: &Args) -> ReflectorResult<ReflectorOptions> {
    let mut options = match &args.config {
        Some(path) => ReflectorOptions::load(path)?,
        None => ReflectorOptions::default(),
    };
    if let Some(resolution) = args.resolution {
        options = options.with_resolution(resolution);
    }
    match args.blur.as_deref() {
        Some([radius]) => options = options.with_blur(*radius),
        Some([width, height]) => options = options.with_blur([*width, *height]),
        _ => {}
    }
    if let Some(depth_scale) = args.depth_scale {
        options = options.with_depth_scale(depth_scale);
    }
    options.validate()?;
    Ok(options)
}

fn run(args: Args) -> ReflectorResult<()> {
    let mut backend = WgpuBackend::new_headless()?;
    log::info!("Using adapter: {}", backend.adapter_info().name);

    let mut reflector = MeshReflector::new(options_from(&args)?)?;

    let distortion = match &args.distortion_map {
        Some(path) => {
            let texture = GpuTexture::create(&mut backend, &TextureData::from_file(path)?)?;
            reflector.set_distortion_map(Some(texture.view));
            Some(texture)
        }
        None => None,
    };
    log::info!("Reflector defines: '{}'", reflector.defines().key().trim());

    let floor = Mat4::from_rotation_translation(
        Quat::from_rotation_x(-std::f32::consts::FRAC_PI_2),
        Vec3::ZERO,
    );
    let mut scene = DemoScene::new(&mut backend, floor)?;
    let mut surface = FloorSurface::new(&mut backend)?;
    let screen = RenderTarget::create(&mut backend, "Screen", args.screen_size, true)?;
    let projection = Projection::perspective(60.0, 1.0, 0.1, 100.0);

    let mut rendered = 0;
    for frame in 0..args.frames {
        // One turn around Y, dipping below the floor for the middle half
        let angle = frame as f32 / args.frames.max(1) as f32 * std::f32::consts::TAU;
        let eye = Vec3::new(
            args.orbit * angle.sin(),
            2.0 * angle.cos(),
            args.orbit * angle.cos(),
        );
        let viewer = ViewerCamera::looking_at(eye, Vec3::new(0.0, 1.0, 0.0), projection);

        backend.begin_frame()?;
        let outcome = reflector.render(&mut backend, &mut scene, Some(()), &viewer)?;

        let uniform = viewer_uniform(&viewer);
        backend.write_buffer(scene.viewer_camera.buffer, 0, bytemuck::bytes_of(&uniform));
        backend.set_render_target(Some(screen.binding()));
        if begin_scene_pass(&mut backend, "Screen") {
            scene.draw_backdrop(&mut backend, &scene.viewer_camera);
            surface.draw(&mut backend, &reflector, uniform.view_proj, floor)?;
            backend.end_render_pass();
        }
        backend.set_render_target(None);
        backend.end_frame()?;

        match outcome {
            ReflectionOutcome::Rendered { blurred } => {
                rendered += 1;
                log::info!(
                    "Frame {}: viewer {:?}, mirror camera {:?}, blurred: {}",
                    frame,
                    eye,
                    reflector.virtual_camera().position,
                    blurred
                );
            }
            skipped => log::info!("Frame {}: viewer {:?}, {:?}", frame, eye, skipped),
        }
    }
    backend.wait_idle();
    log::info!(
        "Rendered {} of {} frames, {} surface variant(s) built",
        rendered,
        args.frames,
        surface.materials.builds()
    );

    surface.release(&mut backend);
    scene.release(&mut backend);
    screen.destroy(&mut backend);
    reflector.release(&mut backend);
    if let Some(texture) = distortion {
        texture.destroy(&mut backend);
    }
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(err) = run(Args::parse()) {
        log::error!("{}", err);
        std::process::exit(1);
    }
}
