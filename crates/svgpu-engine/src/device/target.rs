use crate::backend::BackendError;

use super::read_texture;

/// Offscreen color attachment a frame is rendered into.
///
/// When `clear` is set the first pass of every frame clears the target to that
/// color; otherwise existing contents are loaded and drawn over.
#[derive(Debug)]
pub struct RenderTarget {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    pub clear: Option<wgpu::Color>,
}

impl RenderTarget {
    pub fn new(device: &wgpu::Device, width: u32, height: u32, format: wgpu::TextureFormat) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("svgpu render target"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            texture,
            view,
            clear: Some(wgpu::Color::TRANSPARENT),
        }
    }

    pub fn with_clear(mut self, clear: Option<wgpu::Color>) -> Self {
        self.clear = clear;
        self
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.texture.format()
    }

    /// Size in physical pixels.
    pub fn size(&self) -> (u32, u32) {
        (self.texture.width(), self.texture.height())
    }

    /// Reads the color contents back as tightly packed rows.
    pub fn read_rgba(&self, device: &wgpu::Device, queue: &wgpu::Queue) -> Result<Vec<u8>, BackendError> {
        Ok(read_texture(device, queue, &self.texture)?)
    }
}
