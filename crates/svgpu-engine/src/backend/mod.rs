//! Device-abstraction contract between the draw stream and a graphics device.
//!
//! The draw stream drives a [`RenderBackend`] through a fixed protocol for
//! every primitive:
//!
//! ```text
//! set_viewport
//! for each draw call:
//!     update_uniforms -> update_shader -> [update_sampler]
//!     update_blend -> [toggle_stencil / update_stencil] -> [toggle_cull]
//!     apply_state -> draw_primitives*
//! ```
//!
//! Toggle and update calls only mutate pending state. `apply_state` realizes
//! it; draws observe the state as of the latest `apply_state`.
//!
//! All calls happen on the thread that owns the device. Implementations hold
//! their resources exclusively and need no locking.

mod error;
pub mod recording;
mod types;

pub use error::BackendError;
pub use types::{
    AaMode, BlendFactor, CompositeKind, CompositeState, Handle, HandleAllocator, PrimitiveMode,
    ShapeKind, StencilConfig, StencilFaceOps, StencilFunc, StencilOp, Technique, TextureDesc,
    TextureFormat, TextureRegion, UNIFORM_BYTES, Vertex,
};

/// Callback surface of the graphics device, one method per bridge call.
///
/// Resource handles are aliases issued by the implementation. Every handle
/// passed back must be live; an unknown handle is a protocol violation and is
/// reported as [`BackendError`] rather than ignored.
pub trait RenderBackend {
    /// Where a frame is rendered to.
    type Target;

    // ── lifetime ──────────────────────────────────────────────────────────

    /// Creates device-side state: shader techniques, caches, uniform storage.
    fn create_context(&mut self) -> Result<(), BackendError>;

    /// Releases everything created since `create_context`.
    fn delete_context(&mut self);

    fn begin_frame(&mut self, target: &Self::Target) -> Result<(), BackendError>;

    /// Submits all draws recorded since `begin_frame`.
    fn end_frame(&mut self) -> Result<(), BackendError>;

    /// Closes the frame, dropping draws not yet submitted. The target is
    /// left untouched by them.
    fn abort_frame(&mut self) -> Result<(), BackendError>;

    // ── resources ─────────────────────────────────────────────────────────

    /// Allocates the single dynamic vertex buffer. Always returns
    /// [`Handle::VERTEX_BUFFER`].
    fn create_vertex_buffer(&mut self, size_bytes: usize) -> Result<Handle, BackendError>;

    fn delete_vertex_buffer(&mut self, buffer: Handle) -> Result<(), BackendError>;

    /// Replaces the buffer contents (write-discard).
    fn update_vertex_buffer(&mut self, buffer: Handle, vertices: &[Vertex])
        -> Result<(), BackendError>;

    fn create_texture(&mut self, desc: &TextureDesc) -> Result<Handle, BackendError>;

    fn delete_texture(&mut self, texture: Handle) -> Result<(), BackendError>;

    /// Uploads `region.width * region.height * bpp` tightly packed bytes.
    fn update_texture(
        &mut self,
        texture: Handle,
        region: TextureRegion,
        data: &[u8],
    ) -> Result<(), BackendError>;

    // ── per-draw state ────────────────────────────────────────────────────

    /// Copies the fragment uniform blob verbatim (at most [`UNIFORM_BYTES`]).
    fn update_uniforms(&mut self, uniforms: &[u8]) -> Result<(), BackendError>;

    fn update_shader(&mut self, technique: Technique) -> Result<(), BackendError>;

    /// Binds `texture` and its sampler to texture unit 0.
    fn update_sampler(&mut self, texture: Handle) -> Result<(), BackendError>;

    fn set_viewport(&mut self, width: f32, height: f32);

    /// Opaque blend, stencil off, culling on, color writes on.
    fn reset_state(&mut self);

    fn toggle_color_write(&mut self, enabled: bool);

    fn update_blend(&mut self, state: CompositeState);

    fn toggle_stencil(&mut self, enabled: bool);

    fn update_stencil(&mut self, config: StencilConfig);

    fn toggle_cull(&mut self, enabled: bool);

    /// Realizes pending state and binds `buffer` for the following draws.
    fn apply_state(&mut self, buffer: Handle) -> Result<(), BackendError>;

    fn draw_primitives(
        &mut self,
        mode: PrimitiveMode,
        first_vertex: u32,
        vertex_count: u32,
    ) -> Result<(), BackendError>;
}
