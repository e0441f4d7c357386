use thiserror::Error;

use super::{Handle, TextureRegion};

/// Failures raised through the bridge.
///
/// Apart from `TextureCreation` and `Readback`, every variant is a protocol
/// violation by the caller. None of them is retried; the frame in flight is
/// discarded.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("no device context; call create_context first")]
    NoContext,

    #[error("device context already created")]
    ContextAlive,

    #[error("unknown texture handle {0}")]
    UnknownTexture(Handle),

    #[error("handle {0} is not the vertex buffer")]
    NotVertexBuffer(Handle),

    #[error("a vertex buffer is already live; delete it before creating another")]
    VertexBufferAlive,

    #[error("no vertex buffer is live")]
    NoVertexBuffer,

    #[error("vertex upload of {needed} bytes exceeds buffer capacity of {capacity} bytes")]
    VertexBufferOverflow { needed: usize, capacity: usize },

    #[error("texture creation failed for {width}x{height}: {reason}")]
    TextureCreation {
        width: u32,
        height: u32,
        reason: &'static str,
    },

    #[error("region {region:?} lies outside a {width}x{height} texture")]
    RegionOutOfBounds {
        region: TextureRegion,
        width: u32,
        height: u32,
    },

    #[error("upload expects {expected} bytes, got {actual}")]
    UploadSize { expected: usize, actual: usize },

    #[error("uniform blob of {len} bytes exceeds the {max}-byte constant buffer")]
    UniformsTooLarge { len: usize, max: usize },

    #[error("draw of {count} vertices at {first} exceeds the {len} uploaded vertices")]
    DrawOutOfRange { first: u32, count: u32, len: u32 },

    #[error("no frame in progress")]
    OutsideFrame,

    #[error("a frame is already in progress")]
    FrameInProgress,

    #[error("render target format {found:?} does not match the configured {expected:?}")]
    TargetFormatMismatch {
        expected: wgpu::TextureFormat,
        found: wgpu::TextureFormat,
    },

    #[error("state must be applied before drawing")]
    StateNotApplied,

    #[error("GPU readback failed")]
    Readback(#[from] crate::device::ReadbackError),
}
