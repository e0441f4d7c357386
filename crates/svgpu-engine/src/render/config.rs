use std::path::PathBuf;

/// Where the technique bundle comes from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ShaderSource {
    /// The WGSL bundle compiled into the crate.
    #[default]
    Builtin,
    /// A WGSL bundle read from disk at context creation.
    File(PathBuf),
}

/// Construction parameters of [`WgpuBackend`](super::WgpuBackend).
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Format of every color target passed to `begin_frame`.
    pub color_format: wgpu::TextureFormat,
    pub shader: ShaderSource,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            color_format: wgpu::TextureFormat::Rgba8Unorm,
            shader: ShaderSource::Builtin,
        }
    }
}

impl BackendConfig {
    pub fn new(color_format: wgpu::TextureFormat) -> Self {
        Self {
            color_format,
            ..Self::default()
        }
    }
}
