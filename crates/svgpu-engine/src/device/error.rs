use thiserror::Error;

/// Failure while copying a texture back to the CPU.
#[derive(Debug, Error)]
pub enum ReadbackError {
    #[error("texture format {0:?} cannot be read back")]
    UnsupportedFormat(wgpu::TextureFormat),

    #[error("device poll failed")]
    Poll(#[from] wgpu::PollError),

    #[error("staging buffer could not be mapped")]
    Map(#[from] wgpu::BufferAsyncError),

    #[error("map callback was dropped before completion")]
    Disconnected,
}
