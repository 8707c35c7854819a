//! Dummy GPU backend for testing and development.
//!
//! This backend doesn't perform actual GPU operations. It hands out valid
//! handles, keeps track of which resources are alive and records every
//! call so tests can assert on the exact command stream the reflection
//! pipeline produced.

use std::collections::{HashMap, HashSet};

use crate::backend::traits::*;
use crate::backend::types::*;

/// Default texture size limit, matching wgpu's downlevel defaults.
const DEFAULT_MAX_TEXTURE_DIMENSION: u32 = 8192;

/// A recorded backend call.
#[derive(Debug, Clone, PartialEq)]
pub enum DummyCommand {
    BeginFrame,
    EndFrame,
    SetGlobals(RendererGlobals),
    SetRenderTarget(Option<RenderTargetBinding>),
    SetDepthWrite(bool),
    Clear,
    CreateTexture {
        handle: TextureHandle,
        width: u32,
        height: u32,
        format: TextureFormat,
    },
    DestroyTexture(TextureHandle),
    DestroyTextureView(TextureViewHandle),
    DestroyBindGroup(BindGroupHandle),
    WriteBuffer {
        buffer: BufferHandle,
        offset: u64,
        len: usize,
    },
    BeginRenderPass {
        label: Option<String>,
        color: Vec<TextureViewHandle>,
        depth: Option<TextureViewHandle>,
    },
    EndRenderPass,
    SetPipeline(RenderPipelineHandle),
    SetBindGroup {
        index: u32,
        bind_group: BindGroupHandle,
    },
    SetVertexBuffer {
        slot: u32,
        buffer: BufferHandle,
    },
    SetIndexBuffer {
        buffer: BufferHandle,
        format: IndexFormat,
    },
    Draw {
        vertices: std::ops::Range<u32>,
        instances: std::ops::Range<u32>,
    },
    DrawIndexed {
        indices: std::ops::Range<u32>,
        instances: std::ops::Range<u32>,
    },
}

/// Dummy GPU backend.
#[derive(Debug)]
pub struct DummyBackend {
    next_id: u64,
    max_texture_dimension: u32,
    /// Texture allocations left before `create_texture` starts failing
    texture_budget: Option<usize>,

    globals: RendererGlobals,
    render_target: Option<RenderTargetBinding>,
    depth_write: bool,
    in_pass: bool,

    textures: HashMap<u64, TextureDescriptor>,
    views: HashMap<u64, TextureHandle>,
    buffers: HashMap<u64, Vec<u8>>,
    bind_groups: HashSet<u64>,
    pipelines: HashMap<u64, RenderPipelineDescriptor>,

    commands: Vec<DummyCommand>,
}

impl Default for DummyBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DummyBackend {
    /// Create a new dummy backend.
    pub fn new() -> Self {
        Self {
            next_id: 1,
            max_texture_dimension: DEFAULT_MAX_TEXTURE_DIMENSION,
            texture_budget: None,
            globals: RendererGlobals::default(),
            render_target: None,
            depth_write: false,
            in_pass: false,
            textures: HashMap::new(),
            views: HashMap::new(),
            buffers: HashMap::new(),
            bind_groups: HashSet::new(),
            pipelines: HashMap::new(),
            commands: Vec::new(),
        }
    }

    /// Get the backend name.
    pub fn name(&self) -> &'static str {
        "Dummy Backend"
    }

    /// Start with the given renderer globals instead of the defaults.
    pub fn with_globals(mut self, globals: RendererGlobals) -> Self {
        self.globals = globals;
        self
    }

    /// Limit texture dimensions.
    pub fn with_max_texture_dimension(mut self, max: u32) -> Self {
        self.max_texture_dimension = max;
        self
    }

    /// Let `count` more textures succeed, then fail every allocation with
    /// [`BackendError::OutOfMemory`]. `None` removes the limit.
    pub fn set_texture_budget(&mut self, count: Option<usize>) {
        self.texture_budget = count;
    }

    /// Every call recorded so far.
    pub fn commands(&self) -> &[DummyCommand] {
        &self.commands
    }

    /// Forget the recorded calls. Live resources are kept.
    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    /// Number of textures not yet destroyed.
    pub fn live_texture_count(&self) -> usize {
        self.textures.len()
    }

    pub fn is_texture_live(&self, texture: TextureHandle) -> bool {
        self.textures.contains_key(&texture.0)
    }

    pub fn is_view_live(&self, view: TextureViewHandle) -> bool {
        self.views.contains_key(&view.0)
    }

    pub fn is_bind_group_live(&self, bind_group: BindGroupHandle) -> bool {
        self.bind_groups.contains(&bind_group.0)
    }

    /// Descriptor a live texture was created with.
    pub fn texture_descriptor(&self, texture: TextureHandle) -> Option<&TextureDescriptor> {
        self.textures.get(&texture.0)
    }

    /// Descriptor of the texture behind a live view.
    pub fn view_descriptor(&self, view: TextureViewHandle) -> Option<&TextureDescriptor> {
        self.views
            .get(&view.0)
            .and_then(|texture| self.textures.get(&texture.0))
    }

    /// Current bytes of a live buffer.
    pub fn buffer_contents(&self, buffer: BufferHandle) -> Option<&[u8]> {
        self.buffers.get(&buffer.0).map(Vec::as_slice)
    }

    /// Descriptor a pipeline was created with.
    pub fn pipeline_descriptor(
        &self,
        pipeline: RenderPipelineHandle,
    ) -> Option<&RenderPipelineDescriptor> {
        self.pipelines.get(&pipeline.0)
    }

    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn record(&mut self, command: DummyCommand) {
        log::trace!("DummyBackend: {:?}", command);
        self.commands.push(command);
    }

    fn record_in_pass(&mut self, command: DummyCommand) {
        if self.in_pass {
            self.record(command);
        } else {
            log::warn!("DummyBackend: {:?} recorded outside a render pass", command);
        }
    }
}

impl GraphicsBackend for DummyBackend {
    fn begin_frame(&mut self) -> BackendResult<()> {
        self.record(DummyCommand::BeginFrame);
        Ok(())
    }

    fn end_frame(&mut self) -> BackendResult<()> {
        self.record(DummyCommand::EndFrame);
        Ok(())
    }

    fn max_texture_dimension(&self) -> u32 {
        self.max_texture_dimension
    }

    fn globals(&self) -> RendererGlobals {
        self.globals
    }

    fn set_globals(&mut self, globals: RendererGlobals) {
        self.globals = globals;
        self.record(DummyCommand::SetGlobals(globals));
    }

    fn set_render_target(&mut self, target: Option<RenderTargetBinding>) {
        self.render_target = target;
        self.record(DummyCommand::SetRenderTarget(target));
    }

    fn render_target(&self) -> Option<RenderTargetBinding> {
        self.render_target
    }

    fn set_depth_write(&mut self, enabled: bool) {
        self.depth_write = enabled;
        self.record(DummyCommand::SetDepthWrite(enabled));
    }

    fn depth_write(&self) -> bool {
        self.depth_write
    }

    fn clear(&mut self) {
        self.record(DummyCommand::Clear);
    }

    fn create_buffer(&mut self, desc: &BufferDescriptor) -> BackendResult<BufferHandle> {
        log::trace!(
            "DummyBackend: creating buffer {:?} (size: {})",
            desc.label,
            desc.size
        );
        let id = self.allocate_id();
        self.buffers.insert(id, vec![0; desc.size as usize]);
        Ok(BufferHandle(id))
    }

    fn create_buffer_init(
        &mut self,
        desc: &BufferDescriptor,
        data: &[u8],
    ) -> BackendResult<BufferHandle> {
        let handle = self.create_buffer(desc)?;
        self.buffers.insert(handle.0, data.to_vec());
        Ok(handle)
    }

    fn write_buffer(&mut self, buffer: BufferHandle, offset: u64, data: &[u8]) {
        if let Some(contents) = self.buffers.get_mut(&buffer.0) {
            let start = offset as usize;
            let end = start + data.len();
            if contents.len() < end {
                contents.resize(end, 0);
            }
            contents[start..end].copy_from_slice(data);
        }
        self.record(DummyCommand::WriteBuffer {
            buffer,
            offset,
            len: data.len(),
        });
    }

    fn create_texture(&mut self, desc: &TextureDescriptor) -> BackendResult<TextureHandle> {
        if desc.width == 0
            || desc.height == 0
            || desc.width > self.max_texture_dimension
            || desc.height > self.max_texture_dimension
        {
            return Err(BackendError::TextureCreationFailed(format!(
                "{}x{} exceeds the {} texel limit",
                desc.width, desc.height, self.max_texture_dimension
            )));
        }

        if let Some(budget) = self.texture_budget.as_mut() {
            if *budget == 0 {
                return Err(BackendError::OutOfMemory);
            }
            *budget -= 1;
        }

        let id = self.allocate_id();
        self.textures.insert(id, desc.clone());
        let handle = TextureHandle(id);
        self.record(DummyCommand::CreateTexture {
            handle,
            width: desc.width,
            height: desc.height,
            format: desc.format,
        });
        Ok(handle)
    }

    fn create_texture_view(&mut self, texture: TextureHandle) -> BackendResult<TextureViewHandle> {
        if !self.textures.contains_key(&texture.0) {
            return Err(BackendError::TextureCreationFailed(
                "Texture not found".into(),
            ));
        }
        let id = self.allocate_id();
        self.views.insert(id, texture);
        Ok(TextureViewHandle(id))
    }

    fn write_texture(&mut self, texture: TextureHandle, data: &[u8], width: u32, height: u32) {
        log::trace!(
            "DummyBackend: writing {} bytes to texture {:?} ({}x{})",
            data.len(),
            texture,
            width,
            height
        );
    }

    fn create_sampler(&mut self, desc: &SamplerDescriptor) -> BackendResult<SamplerHandle> {
        log::trace!("DummyBackend: creating sampler {:?}", desc.label);
        Ok(SamplerHandle(self.allocate_id()))
    }

    fn create_bind_group_layout(
        &mut self,
        entries: &[BindGroupLayoutEntry],
    ) -> BackendResult<BindGroupLayoutHandle> {
        log::trace!(
            "DummyBackend: creating bind group layout with {} entries",
            entries.len()
        );
        Ok(BindGroupLayoutHandle(self.allocate_id()))
    }

    fn create_bind_group(
        &mut self,
        _layout: BindGroupLayoutHandle,
        entries: &[(u32, BindGroupEntry)],
    ) -> BackendResult<BindGroupHandle> {
        for (binding, entry) in entries {
            if let BindGroupEntry::Texture(view) = entry {
                if !self.views.contains_key(&view.0) {
                    return Err(BackendError::BindGroupCreationFailed(format!(
                        "binding {} references a destroyed view",
                        binding
                    )));
                }
            }
        }
        let id = self.allocate_id();
        self.bind_groups.insert(id);
        Ok(BindGroupHandle(id))
    }

    fn create_render_pipeline(
        &mut self,
        desc: &RenderPipelineDescriptor,
    ) -> BackendResult<RenderPipelineHandle> {
        log::trace!("DummyBackend: creating pipeline {:?}", desc.label);
        let id = self.allocate_id();
        self.pipelines.insert(id, desc.clone());
        Ok(RenderPipelineHandle(id))
    }

    fn begin_render_pass(&mut self, desc: &RenderPassDescriptor) {
        self.in_pass = true;
        self.record(DummyCommand::BeginRenderPass {
            label: desc.label.clone(),
            color: desc.color_attachments.iter().map(|a| a.view).collect(),
            depth: desc.depth_stencil_attachment.as_ref().map(|a| a.view),
        });
    }

    fn end_render_pass(&mut self) {
        self.in_pass = false;
        self.record(DummyCommand::EndRenderPass);
    }

    fn set_render_pipeline(&mut self, pipeline: RenderPipelineHandle) {
        self.record_in_pass(DummyCommand::SetPipeline(pipeline));
    }

    fn set_bind_group(&mut self, index: u32, bind_group: BindGroupHandle) {
        self.record_in_pass(DummyCommand::SetBindGroup { index, bind_group });
    }

    fn set_vertex_buffer(&mut self, slot: u32, buffer: BufferHandle, _offset: u64) {
        self.record_in_pass(DummyCommand::SetVertexBuffer { slot, buffer });
    }

    fn set_index_buffer(&mut self, buffer: BufferHandle, _offset: u64, format: IndexFormat) {
        self.record_in_pass(DummyCommand::SetIndexBuffer { buffer, format });
    }

    fn draw(&mut self, vertices: std::ops::Range<u32>, instances: std::ops::Range<u32>) {
        self.record_in_pass(DummyCommand::Draw {
            vertices,
            instances,
        });
    }

    fn draw_indexed(
        &mut self,
        indices: std::ops::Range<u32>,
        _base_vertex: i32,
        instances: std::ops::Range<u32>,
    ) {
        self.record_in_pass(DummyCommand::DrawIndexed { indices, instances });
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        self.buffers.remove(&buffer.0);
    }

    fn destroy_texture(&mut self, texture: TextureHandle) {
        self.textures.remove(&texture.0);
        self.views.retain(|_, owner| *owner != texture);
        self.record(DummyCommand::DestroyTexture(texture));
    }

    fn destroy_texture_view(&mut self, view: TextureViewHandle) {
        self.views.remove(&view.0);
        self.record(DummyCommand::DestroyTextureView(view));
    }

    fn destroy_bind_group(&mut self, bind_group: BindGroupHandle) {
        self.bind_groups.remove(&bind_group.0);
        self.record(DummyCommand::DestroyBindGroup(bind_group));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn color_target(size: u32) -> TextureDescriptor {
        TextureDescriptor {
            label: Some("target".into()),
            width: size,
            height: size,
            format: TextureFormat::Rgba16Float,
            usage: TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING,
        }
    }

    #[test]
    fn test_texture_lifecycle() {
        let mut backend = DummyBackend::new();
        let texture = backend.create_texture(&color_target(16)).unwrap();
        let view = backend.create_texture_view(texture).unwrap();
        assert!(backend.is_texture_live(texture));
        assert_eq!(backend.view_descriptor(view).unwrap().width, 16);

        backend.destroy_texture(texture);
        assert!(!backend.is_texture_live(texture));
        assert!(!backend.is_view_live(view));
        assert_eq!(backend.live_texture_count(), 0);
    }

    #[test]
    fn test_texture_budget_fails_allocation() {
        let mut backend = DummyBackend::new();
        backend.set_texture_budget(Some(1));
        assert!(backend.create_texture(&color_target(8)).is_ok());
        assert!(matches!(
            backend.create_texture(&color_target(8)),
            Err(BackendError::OutOfMemory)
        ));
    }

    #[test]
    fn test_texture_dimension_limit() {
        let mut backend = DummyBackend::new().with_max_texture_dimension(64);
        assert!(matches!(
            backend.create_texture(&color_target(128)),
            Err(BackendError::TextureCreationFailed(_))
        ));
    }

    #[test]
    fn test_write_buffer_stores_bytes() {
        let mut backend = DummyBackend::new();
        let buffer = backend
            .create_buffer(&BufferDescriptor {
                label: None,
                size: 8,
                usage: BufferUsage::UNIFORM | BufferUsage::COPY_DST,
            })
            .unwrap();
        backend.write_buffer(buffer, 4, &[1, 2, 3, 4]);
        assert_eq!(backend.buffer_contents(buffer).unwrap(), &[0, 0, 0, 0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_draw_outside_pass_is_not_recorded() {
        let mut backend = DummyBackend::new();
        backend.draw(0..3, 0..1);
        assert!(backend.commands().is_empty());
    }
}
