use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use svgpu_engine::device::{Gpu, GpuInit, RenderTarget};
use svgpu_engine::logging::{LoggingConfig, init_logging};
use svgpu_engine::render::{BackendConfig, WgpuBackend};
use svgpu_engine::stream::StreamFlags;
use svgpu_engine::{LoadOptions, SvgImage, SvgRenderer, Units};

const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Render an SVG file to PNG on the GPU.
#[derive(Debug, Parser)]
#[command(name = "svgpu-studio", version)]
struct Args {
    input: PathBuf,
    output: PathBuf,

    /// Output pixels per SVG pixel.
    #[arg(long, default_value_t = 1.0)]
    scale: f32,

    /// Units reported for the document size.
    #[arg(long, default_value_t = Units::Px)]
    units: Units,

    #[arg(long, default_value_t = 96.0)]
    dpi: f32,

    /// Disable anti-aliasing fringes.
    #[arg(long)]
    no_aa: bool,

    /// Paint onto white instead of transparent.
    #[arg(long)]
    opaque: bool,

    /// Use the software adapter.
    #[arg(long)]
    software: bool,
}

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());
    let args = Args::parse();
    anyhow::ensure!(
        args.scale.is_finite() && args.scale > 0.0,
        "scale must be positive, got {}",
        args.scale
    );

    let image = SvgImage::from_file(&args.input, LoadOptions::new(args.units, args.dpi))?;
    let (w, h) = image.size_px();
    let width = (w * args.scale).ceil().max(1.0) as u32;
    let height = (h * args.scale).ceil().max(1.0) as u32;
    log::info!(
        "{}: {} x {} {} -> {width}x{height} px",
        args.input.display(),
        image.width(),
        image.height(),
        args.units,
    );

    let init = if args.software {
        GpuInit::fallback()
    } else {
        GpuInit::default()
    };
    let gpu = Gpu::new_blocking(init)?;
    log::info!("adapter: {}", gpu.adapter_info().name);

    let backend = WgpuBackend::new(gpu.device(), gpu.queue(), BackendConfig::new(FORMAT))?;
    let flags = StreamFlags {
        antialias: !args.no_aa,
        ..StreamFlags::default()
    };
    let mut renderer = SvgRenderer::new(backend, flags)?;

    let clear = if args.opaque {
        wgpu::Color::WHITE
    } else {
        wgpu::Color::TRANSPARENT
    };
    let target = RenderTarget::new(gpu.device(), width, height, FORMAT).with_clear(Some(clear));

    let (logical_w, logical_h) = (width as f32 / args.scale, height as f32 / args.scale);
    renderer.begin_batch(&target, logical_w, logical_h, args.scale)?;
    renderer.draw(&image, None)?;
    renderer.end_batch()?;

    let mut rgba = target.read_rgba(gpu.device(), gpu.queue())?;
    unpremultiply(&mut rgba);
    image::save_buffer(&args.output, &rgba, width, height, image::ExtendedColorType::Rgba8)
        .with_context(|| format!("failed to write {}", args.output.display()))?;

    renderer.dispose()?;
    log::info!("wrote {}", args.output.display());
    Ok(())
}

/// Frames are composited with premultiplied alpha; PNG stores straight alpha.
fn unpremultiply(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = px[3] as u32;
        if a == 0 || a == 255 {
            continue;
        }
        for c in &mut px[..3] {
            *c = ((*c as u32 * 255 + a / 2) / a).min(255) as u8;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unpremultiply_restores_straight_alpha() {
        let mut px = [64, 32, 0, 128, 10, 20, 30, 255, 0, 0, 0, 0];
        unpremultiply(&mut px);
        assert_eq!(px, [128, 64, 0, 128, 10, 20, 30, 255, 0, 0, 0, 0]);
    }

    #[test]
    fn args_parse_with_defaults() {
        let args = Args::parse_from(["svgpu-studio", "in.svg", "out.png"]);
        assert_eq!(args.scale, 1.0);
        assert_eq!(args.units, Units::Px);
        assert!(!args.no_aa && !args.opaque);
    }
}
