use std::path::Path;

use crate::device::{Gpu, RenderTarget};
use crate::error::Result;
use crate::render::{BackendConfig, WgpuBackend};
use crate::stream::StreamFlags;
use crate::svg::{LoadOptions, SvgImage};

use super::SvgRenderer;

/// One SVG file bound to a wgpu renderer.
pub struct SvgView {
    image: SvgImage,
    renderer: SvgRenderer<WgpuBackend>,
}

impl SvgView {
    /// Loads `path` and creates a renderer for targets of `color_format`.
    ///
    /// The file is parsed before any device object is created, so a missing
    /// or malformed file fails with [`LoadError`](crate::error::LoadError)
    /// without touching the GPU.
    pub fn new(
        gpu: &Gpu,
        color_format: wgpu::TextureFormat,
        path: impl AsRef<Path>,
        options: LoadOptions,
    ) -> Result<Self> {
        Self::with_config(
            gpu,
            BackendConfig::new(color_format),
            StreamFlags::default(),
            path,
            options,
        )
    }

    pub fn with_config(
        gpu: &Gpu,
        config: BackendConfig,
        flags: StreamFlags,
        path: impl AsRef<Path>,
        options: LoadOptions,
    ) -> Result<Self> {
        let image = SvgImage::from_file(path, options)?;
        let backend = WgpuBackend::new(gpu.device(), gpu.queue(), config)?;
        let renderer = SvgRenderer::new(backend, flags)?;
        Ok(Self { image, renderer })
    }

    pub fn image(&self) -> &SvgImage {
        &self.image
    }

    /// Intrinsic width in the load units.
    pub fn width(&self) -> f32 {
        self.image.width()
    }

    /// Intrinsic height in the load units.
    pub fn height(&self) -> f32 {
        self.image.height()
    }

    pub fn renderer(&self) -> &SvgRenderer<WgpuBackend> {
        &self.renderer
    }

    /// Draws the image at its intrinsic size into `target`, one batch
    /// spanning the whole target. `fb_scale` only affects tessellation
    /// quality and fringe width.
    pub fn draw(&mut self, target: &RenderTarget, fb_scale: f32) -> Result<()> {
        let (w, h) = target.size();
        self.renderer.begin_batch(target, w as f32, h as f32, fb_scale)?;
        self.renderer.draw(&self.image, None)?;
        self.renderer.end_batch()
    }

    pub fn dispose(&mut self) -> Result<()> {
        self.renderer.dispose()
    }
}
