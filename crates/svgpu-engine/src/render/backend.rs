use std::borrow::Cow;
use std::rc::Rc;

use crate::backend::{
    AaMode, BackendError, CompositeKind, CompositeState, Handle, PrimitiveMode, RenderBackend,
    ShapeKind, StencilConfig, Technique, TextureDesc, TextureFormat, TextureRegion, UNIFORM_BYTES,
    Vertex,
};
use crate::device::{self, RenderTarget};
use crate::error::LoadError;

use super::config::BackendConfig;
use super::frame::{self, DrawOp, Frame, PassResources, StencilTarget, UniformArena};
use super::pipeline::{self, Layouts, PipelineKey};
use super::resources::{self, ResourceTable};
use super::state_cache::{self, BlendDesc, BlendKey, CacheStats, StateCache, StencilKey};
use super::technique::{self, TechniqueTable};

/// Device objects that live from `create_context` to `delete_context`.
struct DeviceContext {
    techniques: TechniqueTable,
    layouts: Layouts,
    resources: ResourceTable,
    blends: StateCache<BlendKey, BlendDesc>,
    stencils: StateCache<StencilKey, wgpu::DepthStencilState>,
    stencil_off: Rc<wgpu::DepthStencilState>,
    pipelines: StateCache<PipelineKey, wgpu::RenderPipeline>,
    uniforms: UniformArena,
    /// Bound at group 1 when no texture is selected.
    blank: wgpu::BindGroup,
    stencil_target: Option<StencilTarget>,
}

/// Values mutated by the toggle/update calls and consumed by `apply_state`.
#[derive(Debug)]
struct PendingState {
    technique: Technique,
    texture: Option<Handle>,
    blend: CompositeState,
    color_write: bool,
    stencil_enabled: bool,
    stencil: StencilConfig,
    cull: bool,
    frag: [u8; UNIFORM_BYTES],
}

impl Default for PendingState {
    fn default() -> Self {
        Self {
            technique: Technique::new(
                AaMode::NoAa,
                ShapeKind::StencilFill,
                CompositeKind::Premultiplied,
            ),
            texture: None,
            blend: CompositeState::opaque(),
            color_write: true,
            stencil_enabled: false,
            stencil: StencilConfig::default(),
            cull: true,
            frag: [0; UNIFORM_BYTES],
        }
    }
}

/// State realized by the latest `apply_state`. The pipeline itself is
/// resolved per draw, once the primitive topology is known.
struct Applied {
    key: PipelineKey,
    blend: Rc<BlendDesc>,
    depth_stencil: Rc<wgpu::DepthStencilState>,
    textures: wgpu::BindGroup,
    frag: [u8; UNIFORM_BYTES],
    /// Offset within the current pass, `None` until first drawn.
    frag_offset: Option<u32>,
}

/// wgpu implementation of the device callback surface.
///
/// Owns every resource it hands out a handle for. Frames render into a
/// [`RenderTarget`] whose format matches [`BackendConfig::color_format`].
pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    color_format: wgpu::TextureFormat,
    shader_text: Cow<'static, str>,
    ctx: Option<DeviceContext>,
    pending: PendingState,
    applied: Option<Applied>,
    frame: Option<Frame>,
    inv_view_size: [f32; 2],
}

impl WgpuBackend {
    /// Reads and checks the shader bundle. No device objects are created
    /// until `create_context`.
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        config: BackendConfig,
    ) -> Result<Self, LoadError> {
        let shader_text = technique::load_source(&config.shader)?;
        Ok(Self {
            device: device.clone(),
            queue: queue.clone(),
            color_format: config.color_format,
            shader_text,
            ctx: None,
            pending: PendingState::default(),
            applied: None,
            frame: None,
            inv_view_size: [0.0, 0.0],
        })
    }

    pub fn color_format(&self) -> wgpu::TextureFormat {
        self.color_format
    }

    pub fn blend_cache_stats(&self) -> CacheStats {
        self.ctx.as_ref().map(|c| c.blends.stats()).unwrap_or_default()
    }

    pub fn stencil_cache_stats(&self) -> CacheStats {
        self.ctx.as_ref().map(|c| c.stencils.stats()).unwrap_or_default()
    }

    pub fn pipeline_cache_stats(&self) -> CacheStats {
        self.ctx.as_ref().map(|c| c.pipelines.stats()).unwrap_or_default()
    }

    pub fn texture_count(&self) -> usize {
        self.ctx.as_ref().map_or(0, |c| c.resources.texture_count())
    }

    /// Copies a texture back to the CPU, tightly packed at its bytes per pixel.
    pub fn read_texture(&self, handle: Handle) -> Result<Vec<u8>, BackendError> {
        let ctx = self.ctx()?;
        let rec = ctx.resources.texture(handle)?;
        Ok(device::read_texture(&self.device, &self.queue, &rec.texture)?)
    }

    fn ctx(&self) -> Result<&DeviceContext, BackendError> {
        self.ctx.as_ref().ok_or(BackendError::NoContext)
    }

    fn ctx_mut(&mut self) -> Result<&mut DeviceContext, BackendError> {
        self.ctx.as_mut().ok_or(BackendError::NoContext)
    }

    /// Encodes recorded draws so resources they read can be rewritten.
    fn submit_recorded(&mut self) {
        let (Some(ctx), Some(frame)) = (self.ctx.as_mut(), self.frame.as_mut()) else {
            return;
        };
        let Some(stencil) = ctx.stencil_target.as_ref() else {
            return;
        };
        frame::submit_pass(
            frame,
            PassResources {
                device: &self.device,
                queue: &self.queue,
                uniforms_layout: &ctx.layouts.uniforms,
                uniforms: &mut ctx.uniforms,
                stencil,
                vertices: ctx.resources.vertex_slot().map(|s| &s.buffer),
                inv_view_size: self.inv_view_size,
            },
        );
        if let Some(applied) = self.applied.as_mut() {
            applied.frag_offset = None;
        }
    }

    fn has_recorded_draws(&self) -> bool {
        self.frame.as_ref().is_some_and(|f| !f.ops.is_empty())
    }
}

fn cached_blend(
    ctx: &mut DeviceContext,
    state: CompositeState,
    color_write: bool,
) -> Rc<BlendDesc> {
    ctx.blends
        .get_or_create(BlendKey::pack(state, color_write), || {
            log::trace!("blend state miss {state:?} color_write={color_write}");
            BlendDesc::new(state, color_write)
        })
}

fn blank_bind_group(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    layout: &wgpu::BindGroupLayout,
) -> wgpu::BindGroup {
    let desc = TextureDesc::new(TextureFormat::Rgba, 1, 1);
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("svgpu blank texture"),
        size: wgpu::Extent3d {
            width: 1,
            height: 1,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: resources::texture_format(desc.format),
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        &[255; 4],
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(4),
            rows_per_image: Some(1),
        },
        wgpu::Extent3d {
            width: 1,
            height: 1,
            depth_or_array_layers: 1,
        },
    );
    resources::texture_bind_group(device, layout, &texture, &desc, "svgpu blank bind group")
}

impl RenderBackend for WgpuBackend {
    type Target = RenderTarget;

    fn create_context(&mut self) -> Result<(), BackendError> {
        if self.ctx.is_some() {
            return Err(BackendError::ContextAlive);
        }
        let techniques = TechniqueTable::new(&self.device, self.shader_text.clone());
        let layouts = Layouts::new(&self.device);
        let alignment = self.device.limits().min_uniform_buffer_offset_alignment;
        let uniforms = UniformArena::new(&self.device, &layouts.uniforms, alignment);
        let blank = blank_bind_group(&self.device, &self.queue, &layouts.texture);

        self.ctx = Some(DeviceContext {
            techniques,
            layouts,
            resources: ResourceTable::default(),
            blends: StateCache::default(),
            stencils: StateCache::default(),
            stencil_off: Rc::new(state_cache::stencil_disabled()),
            pipelines: StateCache::default(),
            uniforms,
            blank,
            stencil_target: None,
        });
        self.pending = PendingState::default();
        log::debug!("device context created ({:?})", self.color_format);
        Ok(())
    }

    fn delete_context(&mut self) {
        self.frame = None;
        self.applied = None;
        if let Some(mut ctx) = self.ctx.take() {
            let p = ctx.pipelines.stats();
            log::debug!(
                "device context deleted ({} textures live, {} pipelines, {} hits / {} misses)",
                ctx.resources.texture_count(),
                p.entries,
                p.hits,
                p.misses,
            );
            ctx.resources.clear();
        }
    }

    fn begin_frame(&mut self, target: &RenderTarget) -> Result<(), BackendError> {
        if self.frame.is_some() {
            return Err(BackendError::FrameInProgress);
        }
        if target.format() != self.color_format {
            return Err(BackendError::TargetFormatMismatch {
                expected: self.color_format,
                found: target.format(),
            });
        }
        let alignment = self.device.limits().min_uniform_buffer_offset_alignment;
        let device = self.device.clone();
        let ctx = self.ctx_mut()?;

        let size = target.size();
        if ctx.stencil_target.as_ref().map(StencilTarget::size) != Some(size) {
            ctx.stencil_target = Some(StencilTarget::new(&device, size));
        }
        self.applied = None;
        self.frame = Some(Frame::new(target.view().clone(), target.clear, alignment));
        Ok(())
    }

    fn end_frame(&mut self) -> Result<(), BackendError> {
        if self.frame.is_none() {
            return Err(BackendError::OutsideFrame);
        }
        self.submit_recorded();
        self.frame = None;
        self.applied = None;
        Ok(())
    }

    fn abort_frame(&mut self) -> Result<(), BackendError> {
        let frame = self.frame.take().ok_or(BackendError::OutsideFrame)?;
        self.applied = None;
        log::debug!("frame aborted ({} draws dropped)", frame.ops.len());
        Ok(())
    }

    fn create_vertex_buffer(&mut self, size_bytes: usize) -> Result<Handle, BackendError> {
        let device = self.device.clone();
        self.ctx_mut()?.resources.create_vertex_buffer(&device, size_bytes)
    }

    fn delete_vertex_buffer(&mut self, buffer: Handle) -> Result<(), BackendError> {
        self.ctx()?;
        if self.has_recorded_draws() {
            self.submit_recorded();
        }
        self.applied = None;
        self.ctx_mut()?.resources.delete_vertex_buffer(buffer)
    }

    fn update_vertex_buffer(
        &mut self,
        buffer: Handle,
        vertices: &[Vertex],
    ) -> Result<(), BackendError> {
        self.ctx()?;
        if self.has_recorded_draws() {
            self.submit_recorded();
        }
        let queue = self.queue.clone();
        self.ctx_mut()?.resources.update_vertex_buffer(&queue, buffer, vertices)
    }

    fn create_texture(&mut self, desc: &TextureDesc) -> Result<Handle, BackendError> {
        let device = self.device.clone();
        let ctx = self.ctx_mut()?;
        ctx.resources.create_texture(&device, &ctx.layouts.texture, desc)
    }

    fn delete_texture(&mut self, texture: Handle) -> Result<(), BackendError> {
        self.ctx()?.resources.texture(texture)?;
        if self.has_recorded_draws() {
            self.submit_recorded();
        }
        if self.pending.texture == Some(texture) {
            self.pending.texture = None;
        }
        self.ctx_mut()?.resources.delete_texture(texture)
    }

    fn update_texture(
        &mut self,
        texture: Handle,
        region: TextureRegion,
        data: &[u8],
    ) -> Result<(), BackendError> {
        self.ctx()?.resources.texture(texture)?;
        if self.has_recorded_draws() {
            self.submit_recorded();
        }
        self.ctx()?.resources.update_texture(&self.queue, texture, region, data)
    }

    fn update_uniforms(&mut self, uniforms: &[u8]) -> Result<(), BackendError> {
        if uniforms.len() > UNIFORM_BYTES {
            return Err(BackendError::UniformsTooLarge {
                len: uniforms.len(),
                max: UNIFORM_BYTES,
            });
        }
        self.pending.frag = [0; UNIFORM_BYTES];
        self.pending.frag[..uniforms.len()].copy_from_slice(uniforms);
        Ok(())
    }

    fn update_shader(&mut self, technique: Technique) -> Result<(), BackendError> {
        self.pending.technique = technique;
        self.pending.texture = None;
        Ok(())
    }

    fn update_sampler(&mut self, texture: Handle) -> Result<(), BackendError> {
        self.ctx()?.resources.texture(texture)?;
        self.pending.texture = Some(texture);
        Ok(())
    }

    fn set_viewport(&mut self, width: f32, height: f32) {
        let inv = |v: f32| if v > 0.0 { 1.0 / v } else { 0.0 };
        self.inv_view_size = [inv(width), inv(height)];
    }

    fn reset_state(&mut self) {
        let frag = self.pending.frag;
        self.pending = PendingState {
            frag,
            ..PendingState::default()
        };
    }

    fn toggle_color_write(&mut self, enabled: bool) {
        self.pending.color_write = enabled;
    }

    fn update_blend(&mut self, state: CompositeState) {
        self.pending.blend = state;
    }

    fn toggle_stencil(&mut self, enabled: bool) {
        self.pending.stencil_enabled = enabled;
    }

    fn update_stencil(&mut self, config: StencilConfig) {
        self.pending.stencil = config;
    }

    fn toggle_cull(&mut self, enabled: bool) {
        self.pending.cull = enabled;
    }

    fn apply_state(&mut self, buffer: Handle) -> Result<(), BackendError> {
        if self.frame.is_none() {
            return Err(BackendError::OutsideFrame);
        }
        if buffer != Handle::VERTEX_BUFFER {
            return Err(BackendError::NotVertexBuffer(buffer));
        }
        let Self {
            ctx,
            pending,
            applied,
            ..
        } = self;
        let ctx = ctx.as_mut().ok_or(BackendError::NoContext)?;
        if ctx.resources.vertex_slot().is_none() {
            return Err(BackendError::NoVertexBuffer);
        }

        let blend = cached_blend(ctx, pending.blend, pending.color_write);
        let (stencil_key, depth_stencil) = if pending.stencil_enabled {
            let config = pending.stencil;
            let key = StencilKey::pack(config);
            let state = ctx.stencils.get_or_create(key, || {
                log::trace!("stencil state miss {config:?}");
                state_cache::stencil_state(config)
            });
            (Some(key), state)
        } else {
            (None, Rc::clone(&ctx.stencil_off))
        };
        let textures = match pending.texture {
            Some(h) => ctx.resources.texture(h)?.bind_group.clone(),
            None => ctx.blank.clone(),
        };

        let key = PipelineKey {
            technique: pending.technique,
            blend: BlendKey::pack(pending.blend, pending.color_write),
            stencil: stencil_key,
            mode: PrimitiveMode::TriangleList,
            cull: pending.cull,
        };
        // Same uniforms as the previous apply keep their slot in the pass.
        let frag_offset = applied
            .as_ref()
            .filter(|a| a.frag == pending.frag)
            .and_then(|a| a.frag_offset);
        *applied = Some(Applied {
            key,
            blend,
            depth_stencil,
            textures,
            frag: pending.frag,
            frag_offset,
        });
        Ok(())
    }

    fn draw_primitives(
        &mut self,
        mode: PrimitiveMode,
        first_vertex: u32,
        vertex_count: u32,
    ) -> Result<(), BackendError> {
        let Self {
            device,
            color_format,
            ctx,
            applied,
            frame,
            ..
        } = self;
        let frame = frame.as_mut().ok_or(BackendError::OutsideFrame)?;
        let applied = applied.as_mut().ok_or(BackendError::StateNotApplied)?;
        let ctx = ctx.as_mut().ok_or(BackendError::NoContext)?;
        if vertex_count == 0 {
            return Ok(());
        }

        let len = ctx.resources.vertex_slot().map_or(0, |s| s.len);
        let in_range = first_vertex
            .checked_add(vertex_count)
            .is_some_and(|end| end <= len);
        if !in_range {
            return Err(BackendError::DrawOutOfRange {
                first: first_vertex,
                count: vertex_count,
                len,
            });
        }

        let key = PipelineKey {
            mode,
            ..applied.key
        };
        let DeviceContext {
            pipelines,
            layouts,
            techniques,
            ..
        } = ctx;
        let pipeline = pipelines.get_or_create(key, || {
            pipeline::create_pipeline(
                device,
                layouts,
                techniques,
                *color_format,
                &key,
                &applied.blend,
                &applied.depth_stencil,
            )
        });

        let frag_offset = match applied.frag_offset {
            Some(offset) => offset,
            None => {
                let offset = frame.push_frag(&applied.frag);
                applied.frag_offset = Some(offset);
                offset
            }
        };

        log::trace!(
            "draw {:?} {}..{} ({} triangles)",
            mode,
            first_vertex,
            first_vertex + vertex_count,
            mode.primitive_count(vertex_count)
        );
        frame.ops.push(DrawOp {
            pipeline,
            textures: applied.textures.clone(),
            frag_offset,
            first: first_vertex,
            count: vertex_count,
        });
        Ok(())
    }
}
