//! A backend that records every bridge call instead of touching a device.
//!
//! It enforces the same handle and sequencing rules as the wgpu adapter, so
//! protocol tests and tooling can run without a GPU.

use std::collections::HashMap;

use super::{
    BackendError, CompositeState, Handle, HandleAllocator, PrimitiveMode, RenderBackend,
    StencilConfig, Technique, TextureDesc, TextureRegion, Vertex, UNIFORM_BYTES,
};

/// One recorded bridge call.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    CreateContext,
    DeleteContext,
    BeginFrame,
    EndFrame,
    AbortFrame,
    CreateVertexBuffer { size_bytes: usize },
    DeleteVertexBuffer,
    UpdateVertexBuffer { vertex_count: usize },
    CreateTexture { handle: Handle, desc: TextureDesc },
    DeleteTexture { handle: Handle },
    UpdateTexture { handle: Handle, region: TextureRegion },
    UpdateUniforms { bytes: Vec<u8> },
    UpdateShader(Technique),
    UpdateSampler(Handle),
    SetViewport { width: f32, height: f32 },
    ResetState,
    ToggleColorWrite(bool),
    UpdateBlend(CompositeState),
    ToggleStencil(bool),
    UpdateStencil(StencilConfig),
    ToggleCull(bool),
    ApplyState,
    DrawPrimitives {
        mode: PrimitiveMode,
        first: u32,
        vertex_count: u32,
        primitives: u32,
    },
}

/// Recording implementation of [`RenderBackend`].
#[derive(Debug, Default)]
pub struct RecordingBackend {
    calls: Vec<Call>,
    context: bool,
    in_frame: bool,
    handles: HandleAllocator,
    textures: HashMap<Handle, TextureDesc>,
    vertex_capacity: Option<usize>,
    vertices: Vec<Vertex>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> &[Call] {
        &self.calls
    }

    pub fn take_calls(&mut self) -> Vec<Call> {
        std::mem::take(&mut self.calls)
    }

    /// Number of recorded calls matching `pred`.
    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.iter().filter(|c| pred(c)).count()
    }

    /// Vertices from the latest `update_vertex_buffer`.
    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    pub fn has_vertex_buffer(&self) -> bool {
        self.vertex_capacity.is_some()
    }

    pub fn has_context(&self) -> bool {
        self.context
    }

    fn require_context(&self) -> Result<(), BackendError> {
        if self.context { Ok(()) } else { Err(BackendError::NoContext) }
    }

    fn require_frame(&self) -> Result<(), BackendError> {
        if self.in_frame { Ok(()) } else { Err(BackendError::OutsideFrame) }
    }

    fn texture(&self, handle: Handle) -> Result<&TextureDesc, BackendError> {
        self.textures
            .get(&handle)
            .ok_or(BackendError::UnknownTexture(handle))
    }
}

fn expect_vertex_buffer(handle: Handle) -> Result<(), BackendError> {
    if handle == Handle::VERTEX_BUFFER {
        Ok(())
    } else {
        Err(BackendError::NotVertexBuffer(handle))
    }
}

impl RenderBackend for RecordingBackend {
    type Target = ();

    fn create_context(&mut self) -> Result<(), BackendError> {
        if self.context {
            return Err(BackendError::ContextAlive);
        }
        self.context = true;
        self.calls.push(Call::CreateContext);
        Ok(())
    }

    fn delete_context(&mut self) {
        self.context = false;
        self.in_frame = false;
        self.vertex_capacity = None;
        self.textures.clear();
        self.calls.push(Call::DeleteContext);
    }

    fn begin_frame(&mut self, _target: &()) -> Result<(), BackendError> {
        self.require_context()?;
        if self.in_frame {
            return Err(BackendError::FrameInProgress);
        }
        self.in_frame = true;
        self.calls.push(Call::BeginFrame);
        Ok(())
    }

    fn end_frame(&mut self) -> Result<(), BackendError> {
        self.require_frame()?;
        self.in_frame = false;
        self.calls.push(Call::EndFrame);
        Ok(())
    }

    fn abort_frame(&mut self) -> Result<(), BackendError> {
        self.require_frame()?;
        self.in_frame = false;
        self.calls.push(Call::AbortFrame);
        Ok(())
    }

    fn create_vertex_buffer(&mut self, size_bytes: usize) -> Result<Handle, BackendError> {
        self.require_context()?;
        if self.vertex_capacity.is_some() {
            return Err(BackendError::VertexBufferAlive);
        }
        self.vertex_capacity = Some(size_bytes);
        self.calls.push(Call::CreateVertexBuffer { size_bytes });
        Ok(Handle::VERTEX_BUFFER)
    }

    fn delete_vertex_buffer(&mut self, buffer: Handle) -> Result<(), BackendError> {
        expect_vertex_buffer(buffer)?;
        if self.vertex_capacity.take().is_none() {
            return Err(BackendError::NoVertexBuffer);
        }
        self.calls.push(Call::DeleteVertexBuffer);
        Ok(())
    }

    fn update_vertex_buffer(&mut self, buffer: Handle, vertices: &[Vertex]) -> Result<(), BackendError> {
        expect_vertex_buffer(buffer)?;
        let capacity = self.vertex_capacity.ok_or(BackendError::NoVertexBuffer)?;
        let needed = vertices.len() * Vertex::STRIDE;
        if needed > capacity {
            return Err(BackendError::VertexBufferOverflow { needed, capacity });
        }
        self.vertices = vertices.to_vec();
        self.calls.push(Call::UpdateVertexBuffer {
            vertex_count: vertices.len(),
        });
        Ok(())
    }

    fn create_texture(&mut self, desc: &TextureDesc) -> Result<Handle, BackendError> {
        self.require_context()?;
        if desc.width == 0 || desc.height == 0 {
            return Err(BackendError::TextureCreation {
                width: desc.width,
                height: desc.height,
                reason: "zero-sized texture",
            });
        }
        let handle = self.handles.alloc();
        self.textures.insert(handle, *desc);
        self.calls.push(Call::CreateTexture { handle, desc: *desc });
        Ok(handle)
    }

    fn delete_texture(&mut self, texture: Handle) -> Result<(), BackendError> {
        self.textures
            .remove(&texture)
            .ok_or(BackendError::UnknownTexture(texture))?;
        self.calls.push(Call::DeleteTexture { handle: texture });
        Ok(())
    }

    fn update_texture(
        &mut self,
        texture: Handle,
        region: TextureRegion,
        data: &[u8],
    ) -> Result<(), BackendError> {
        let desc = self.texture(texture)?;
        if !region.fits_within(desc.width, desc.height) {
            return Err(BackendError::RegionOutOfBounds {
                region,
                width: desc.width,
                height: desc.height,
            });
        }
        let expected = region.byte_len(desc.format.bytes_per_pixel());
        if data.len() != expected {
            return Err(BackendError::UploadSize {
                expected,
                actual: data.len(),
            });
        }
        self.calls.push(Call::UpdateTexture {
            handle: texture,
            region,
        });
        Ok(())
    }

    fn update_uniforms(&mut self, uniforms: &[u8]) -> Result<(), BackendError> {
        if uniforms.len() > UNIFORM_BYTES {
            return Err(BackendError::UniformsTooLarge {
                len: uniforms.len(),
                max: UNIFORM_BYTES,
            });
        }
        self.calls.push(Call::UpdateUniforms {
            bytes: uniforms.to_vec(),
        });
        Ok(())
    }

    fn update_shader(&mut self, technique: Technique) -> Result<(), BackendError> {
        self.require_context()?;
        self.calls.push(Call::UpdateShader(technique));
        Ok(())
    }

    fn update_sampler(&mut self, texture: Handle) -> Result<(), BackendError> {
        self.texture(texture)?;
        self.calls.push(Call::UpdateSampler(texture));
        Ok(())
    }

    fn set_viewport(&mut self, width: f32, height: f32) {
        self.calls.push(Call::SetViewport { width, height });
    }

    fn reset_state(&mut self) {
        self.calls.push(Call::ResetState);
    }

    fn toggle_color_write(&mut self, enabled: bool) {
        self.calls.push(Call::ToggleColorWrite(enabled));
    }

    fn update_blend(&mut self, state: CompositeState) {
        self.calls.push(Call::UpdateBlend(state));
    }

    fn toggle_stencil(&mut self, enabled: bool) {
        self.calls.push(Call::ToggleStencil(enabled));
    }

    fn update_stencil(&mut self, config: StencilConfig) {
        self.calls.push(Call::UpdateStencil(config));
    }

    fn toggle_cull(&mut self, enabled: bool) {
        self.calls.push(Call::ToggleCull(enabled));
    }

    fn apply_state(&mut self, buffer: Handle) -> Result<(), BackendError> {
        expect_vertex_buffer(buffer)?;
        self.require_frame()?;
        if self.vertex_capacity.is_none() {
            return Err(BackendError::NoVertexBuffer);
        }
        self.calls.push(Call::ApplyState);
        Ok(())
    }

    fn draw_primitives(
        &mut self,
        mode: PrimitiveMode,
        first: u32,
        vertex_count: u32,
    ) -> Result<(), BackendError> {
        self.require_frame()?;
        let len = self.vertices.len() as u32;
        if first.checked_add(vertex_count).is_none_or(|end| end > len) {
            return Err(BackendError::DrawOutOfRange {
                first,
                count: vertex_count,
                len,
            });
        }
        self.calls.push(Call::DrawPrimitives {
            mode,
            first,
            vertex_count,
            primitives: mode.primitive_count(vertex_count),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::TextureFormat;

    fn ready() -> RecordingBackend {
        let mut b = RecordingBackend::new();
        b.create_context().unwrap();
        b
    }

    #[test]
    fn texture_handles_are_distinct() {
        let mut b = ready();
        let desc = TextureDesc::new(TextureFormat::Rgba, 2, 2);
        let h1 = b.create_texture(&desc).unwrap();
        let h2 = b.create_texture(&desc).unwrap();
        b.delete_texture(h1).unwrap();
        let h3 = b.create_texture(&desc).unwrap();
        assert_ne!(h1, h2);
        assert_ne!(h1, h3);
        assert_ne!(h2, h3);
    }

    #[test]
    fn unknown_texture_is_rejected() {
        let mut b = ready();
        let bogus = Handle::new(42).unwrap();
        assert!(matches!(b.delete_texture(bogus), Err(BackendError::UnknownTexture(h)) if h == bogus));
        assert!(matches!(b.update_sampler(bogus), Err(BackendError::UnknownTexture(_))));
        assert!(matches!(
            b.update_texture(bogus, TextureRegion::new(0, 0, 1, 1), &[0; 4]),
            Err(BackendError::UnknownTexture(_))
        ));
    }

    #[test]
    fn second_vertex_buffer_is_a_violation() {
        let mut b = ready();
        assert_eq!(b.create_vertex_buffer(64).unwrap(), Handle::VERTEX_BUFFER);
        assert!(matches!(b.create_vertex_buffer(64), Err(BackendError::VertexBufferAlive)));
        b.delete_vertex_buffer(Handle::VERTEX_BUFFER).unwrap();
        assert_eq!(b.create_vertex_buffer(64).unwrap(), Handle::VERTEX_BUFFER);
    }

    #[test]
    fn vertex_buffer_handle_must_be_one() {
        let mut b = ready();
        b.create_vertex_buffer(64).unwrap();
        let other = Handle::new(2).unwrap();
        assert!(matches!(b.update_vertex_buffer(other, &[]), Err(BackendError::NotVertexBuffer(_))));
        assert!(matches!(b.apply_state(other), Err(BackendError::NotVertexBuffer(_))));
    }

    #[test]
    fn upload_size_must_match_region() {
        let mut b = ready();
        let h = b
            .create_texture(&TextureDesc::new(TextureFormat::Alpha, 4, 4))
            .unwrap();
        assert!(b.update_texture(h, TextureRegion::new(1, 1, 2, 2), &[0; 4]).is_ok());
        assert!(matches!(
            b.update_texture(h, TextureRegion::new(1, 1, 2, 2), &[0; 5]),
            Err(BackendError::UploadSize { expected: 4, actual: 5 })
        ));
        assert!(matches!(
            b.update_texture(h, TextureRegion::new(3, 3, 2, 2), &[0; 4]),
            Err(BackendError::RegionOutOfBounds { .. })
        ));
    }

    #[test]
    fn oversized_uniforms_are_rejected() {
        let mut b = ready();
        assert!(b.update_uniforms(&[0; UNIFORM_BYTES]).is_ok());
        assert!(matches!(
            b.update_uniforms(&[0; UNIFORM_BYTES + 1]),
            Err(BackendError::UniformsTooLarge { .. })
        ));
    }

    #[test]
    fn draw_records_primitive_count() {
        let mut b = ready();
        b.begin_frame(&()).unwrap();
        b.create_vertex_buffer(10 * Vertex::STRIDE).unwrap();
        b.update_vertex_buffer(Handle::VERTEX_BUFFER, &[Vertex::default(); 10])
            .unwrap();
        b.apply_state(Handle::VERTEX_BUFFER).unwrap();
        b.draw_primitives(PrimitiveMode::TriangleStrip, 0, 10).unwrap();
        b.draw_primitives(PrimitiveMode::TriangleList, 1, 9).unwrap();
        assert!(matches!(
            b.draw_primitives(PrimitiveMode::TriangleList, 2, 9),
            Err(BackendError::DrawOutOfRange { .. })
        ));

        let prims: Vec<u32> = b
            .calls()
            .iter()
            .filter_map(|c| match c {
                Call::DrawPrimitives { primitives, .. } => Some(*primitives),
                _ => None,
            })
            .collect();
        assert_eq!(prims, vec![8, 3]);
    }

    #[test]
    fn draws_require_a_frame() {
        let mut b = ready();
        b.create_vertex_buffer(64).unwrap();
        assert!(matches!(
            b.apply_state(Handle::VERTEX_BUFFER),
            Err(BackendError::OutsideFrame)
        ));
        b.begin_frame(&()).unwrap();
        assert!(matches!(b.begin_frame(&()), Err(BackendError::FrameInProgress)));
    }

    #[test]
    fn aborted_frame_closes_without_ending() {
        let mut b = ready();
        assert!(matches!(b.abort_frame(), Err(BackendError::OutsideFrame)));
        b.begin_frame(&()).unwrap();
        b.abort_frame().unwrap();
        assert!(matches!(b.end_frame(), Err(BackendError::OutsideFrame)));
        assert_eq!(b.count(|c| *c == Call::EndFrame), 0);
        b.begin_frame(&()).unwrap();
    }
}
