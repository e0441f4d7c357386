mod common;

use svgpu_engine::backend::BackendError;
use svgpu_engine::coords::Rect;
use svgpu_engine::device::{Gpu, RenderTarget};
use svgpu_engine::render::{BackendConfig, ShaderSource, WgpuBackend};
use svgpu_engine::stream::StreamFlags;
use svgpu_engine::{Error, LoadError, LoadOptions, SvgImage, SvgRenderer, SvgView};

use common::pixel;

const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

const RED_SQUARE: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="100" height="100">
    <rect x="25" y="25" width="50" height="50" fill="#ff0000"/>
</svg>"##;

/// Square frame: the inner subpath winds the other way, leaving a hole
/// under the non-zero rule.
const FRAME: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="100" height="100">
    <path d="M10 10 H90 V90 H10 Z M30 30 V70 H70 V30 Z" fill="#0000ff"/>
</svg>"##;

/// Extends well past its own viewport.
const OVERFLOW: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="100" height="100">
    <rect x="-50" y="-50" width="200" height="200" fill="#ff0000"/>
</svg>"##;

const STROKED: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="100" height="100">
    <path d="M10 50 H90" stroke="#00ff00" stroke-width="10" fill="none"/>
</svg>"##;

fn renderer(gpu: &Gpu) -> SvgRenderer<WgpuBackend> {
    let backend = WgpuBackend::new(gpu.device(), gpu.queue(), BackendConfig::new(FORMAT)).unwrap();
    SvgRenderer::new(backend, StreamFlags::default()).unwrap()
}

fn render(gpu: &Gpu, svg: &str) -> Vec<u8> {
    let image = SvgImage::from_data(svg.as_bytes(), LoadOptions::default()).unwrap();
    let target = RenderTarget::new(gpu.device(), 100, 100, FORMAT);
    let mut r = renderer(gpu);
    r.begin_batch(&target, 100.0, 100.0, 1.0).unwrap();
    r.draw(&image, None).unwrap();
    r.end_batch().unwrap();
    target.read_rgba(gpu.device(), gpu.queue()).unwrap()
}

#[test]
fn convex_fill_covers_its_rect() {
    let Some(gpu) = common::gpu("convex_fill_covers_its_rect") else {
        return;
    };
    let rgba = render(&gpu, RED_SQUARE);
    assert_eq!(pixel(&rgba, 100, 50, 50), [255, 0, 0, 255]);
    assert_eq!(pixel(&rgba, 100, 30, 70), [255, 0, 0, 255]);
    assert_eq!(pixel(&rgba, 100, 5, 5), [0, 0, 0, 0]);
    assert_eq!(pixel(&rgba, 100, 90, 50), [0, 0, 0, 0]);
}

#[test]
fn stencil_fill_leaves_hole() {
    let Some(gpu) = common::gpu("stencil_fill_leaves_hole") else {
        return;
    };
    let rgba = render(&gpu, FRAME);
    assert_eq!(pixel(&rgba, 100, 20, 20), [0, 0, 255, 255]);
    assert_eq!(pixel(&rgba, 100, 80, 50), [0, 0, 255, 255]);
    assert_eq!(pixel(&rgba, 100, 50, 50), [0, 0, 0, 0]);
    assert_eq!(pixel(&rgba, 100, 5, 50), [0, 0, 0, 0]);
}

#[test]
fn stroke_is_drawn_with_its_width() {
    let Some(gpu) = common::gpu("stroke_is_drawn_with_its_width") else {
        return;
    };
    let rgba = render(&gpu, STROKED);
    assert_eq!(pixel(&rgba, 100, 50, 50), [0, 255, 0, 255]);
    assert_eq!(pixel(&rgba, 100, 50, 47), [0, 255, 0, 255]);
    assert_eq!(pixel(&rgba, 100, 50, 40), [0, 0, 0, 0]);
}

#[test]
fn dest_rect_is_scissored() {
    let Some(gpu) = common::gpu("dest_rect_is_scissored") else {
        return;
    };
    let image = SvgImage::from_data(OVERFLOW.as_bytes(), LoadOptions::default()).unwrap();
    let target = RenderTarget::new(gpu.device(), 100, 100, FORMAT);
    let mut r = renderer(&gpu);
    r.begin_batch(&target, 100.0, 100.0, 1.0).unwrap();
    r.draw(&image, Some(Rect::new(0.0, 0.0, 50.0, 50.0))).unwrap();
    r.end_batch().unwrap();

    // Scaled by half the rect spans -25..75; the scissor keeps 0..50.
    let rgba = target.read_rgba(gpu.device(), gpu.queue()).unwrap();
    assert_eq!(pixel(&rgba, 100, 10, 10), [255, 0, 0, 255]);
    assert_eq!(pixel(&rgba, 100, 45, 45), [255, 0, 0, 255]);
    assert_eq!(pixel(&rgba, 100, 60, 60), [0, 0, 0, 0]);
    assert_eq!(pixel(&rgba, 100, 60, 10), [0, 0, 0, 0]);
}

#[test]
fn mismatched_target_format_is_rejected() {
    let Some(gpu) = common::gpu("mismatched_target_format_is_rejected") else {
        return;
    };
    let image = SvgImage::from_data(RED_SQUARE.as_bytes(), LoadOptions::default()).unwrap();
    let other = RenderTarget::new(gpu.device(), 100, 100, wgpu::TextureFormat::Bgra8Unorm);
    let mut r = renderer(&gpu);

    let err = r.begin_batch(&other, 100.0, 100.0, 1.0).unwrap_err();
    assert!(matches!(
        err,
        Error::Backend(BackendError::TargetFormatMismatch { expected, found })
            if expected == FORMAT && found == wgpu::TextureFormat::Bgra8Unorm
    ));
    assert!(!r.is_batching());

    // The renderer is still usable with a matching target.
    let target = RenderTarget::new(gpu.device(), 100, 100, FORMAT);
    r.begin_batch(&target, 100.0, 100.0, 1.0).unwrap();
    r.draw(&image, None).unwrap();
    r.end_batch().unwrap();
    let rgba = target.read_rgba(gpu.device(), gpu.queue()).unwrap();
    assert_eq!(pixel(&rgba, 100, 50, 50), [255, 0, 0, 255]);
}

#[test]
fn pipeline_objects_are_reused_across_frames() {
    let Some(gpu) = common::gpu("pipeline_objects_are_reused_across_frames") else {
        return;
    };
    let image = SvgImage::from_data(FRAME.as_bytes(), LoadOptions::default()).unwrap();
    let target = RenderTarget::new(gpu.device(), 100, 100, FORMAT);
    let mut r = renderer(&gpu);

    let frame = |r: &mut SvgRenderer<WgpuBackend>| {
        r.begin_batch(&target, 100.0, 100.0, 1.0).unwrap();
        r.draw(&image, None).unwrap();
        r.end_batch().unwrap();
    };

    frame(&mut r);
    let first = r.backend().pipeline_cache_stats();
    let blends = r.backend().blend_cache_stats();
    let stencils = r.backend().stencil_cache_stats();
    assert!(first.misses > 0);
    assert_eq!(first.entries, first.misses);

    frame(&mut r);
    let second = r.backend().pipeline_cache_stats();
    assert_eq!(second.misses, first.misses);
    assert_eq!(second.entries, first.entries);
    assert!(second.hits > first.hits);
    assert_eq!(r.backend().blend_cache_stats().entries, blends.entries);
    assert_eq!(r.backend().stencil_cache_stats().entries, stencils.entries);
}

#[test]
fn view_draws_file_at_intrinsic_size() {
    let Some(gpu) = common::gpu("view_draws_file_at_intrinsic_size") else {
        return;
    };
    let path = common::svg_file("view", RED_SQUARE);
    let mut view = SvgView::new(&gpu, FORMAT, &path, LoadOptions::default()).unwrap();
    assert_eq!((view.width(), view.height()), (100.0, 100.0));

    let target = RenderTarget::new(gpu.device(), 100, 100, FORMAT);
    view.draw(&target, 1.0).unwrap();
    view.draw(&target, 2.0).unwrap();
    let rgba = target.read_rgba(gpu.device(), gpu.queue()).unwrap();
    assert_eq!(pixel(&rgba, 100, 50, 50), [255, 0, 0, 255]);

    view.dispose().unwrap();
    assert!(view.renderer().is_disposed());
    let _ = std::fs::remove_file(path);
}

#[test]
fn missing_file_fails_to_load() {
    let Some(gpu) = common::gpu("missing_file_fails_to_load") else {
        return;
    };
    let err = SvgView::new(&gpu, FORMAT, "no/such/file.svg", LoadOptions::default())
        .err()
        .unwrap();
    assert!(matches!(err, Error::Load(LoadError::Io { .. })), "{err}");
}

#[test]
fn missing_shader_bundle_fails_to_load() {
    let Some(gpu) = common::gpu("missing_shader_bundle_fails_to_load") else {
        return;
    };
    let config = BackendConfig {
        shader: ShaderSource::File("no/such/bundle.wgsl".into()),
        ..BackendConfig::new(FORMAT)
    };
    let err = WgpuBackend::new(gpu.device(), gpu.queue(), config).err().unwrap();
    assert!(matches!(err, LoadError::ShaderBundle { .. }), "{err}");
}
