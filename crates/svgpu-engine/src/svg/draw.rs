//! Walks a parsed document and records its shapes into a [`DrawStream`].

use std::collections::HashMap;
use std::sync::Weak;

use resvg::usvg;

use crate::backend::{BackendError, RenderBackend, TextureFormat};
use crate::coords::{Transform, Vec2, Viewport};
use crate::paint::{Color, CompositeOperation, Paint};
use crate::stream::{DrawStream, ImageFlags, ImageId, Scissor};

use super::load::{for_each_image, SvgImage};
use super::tess::{self, FillRule, LineCap, Polyline, StrokeStyle, Tolerance};

#[derive(Debug)]
struct ImageTextures {
    alive: Weak<()>,
    /// Raster node index to texture.
    ids: HashMap<usize, ImageId>,
}

/// Textures of embedded raster images, uploaded once per renderer.
#[derive(Debug, Default)]
pub(crate) struct RasterTextures {
    images: HashMap<u64, ImageTextures>,
}

impl RasterTextures {
    pub fn len(&self) -> usize {
        self.images.values().map(|t| t.ids.len()).sum()
    }

    fn get(&self, image: &SvgImage, index: usize) -> Option<ImageId> {
        self.images.get(&image.key())?.ids.get(&index).copied()
    }

    fn insert(&mut self, image: &SvgImage, index: usize, id: ImageId) {
        self.images
            .entry(image.key())
            .or_insert_with(|| ImageTextures {
                alive: image.liveness(),
                ids: HashMap::new(),
            })
            .ids
            .insert(index, id);
    }

    /// Forgets and returns every texture created for `image`.
    pub fn take_image(&mut self, image: &SvgImage) -> Vec<ImageId> {
        self.images
            .remove(&image.key())
            .map(|t| t.ids.into_values().collect())
            .unwrap_or_default()
    }

    /// Forgets and returns the textures of images that have been dropped.
    pub fn take_dropped(&mut self) -> Vec<ImageId> {
        let mut ids = Vec::new();
        self.images.retain(|_, t| {
            if t.alive.strong_count() > 0 {
                return true;
            }
            ids.extend(t.ids.values().copied());
            false
        });
        ids
    }

    pub fn clear(&mut self) {
        self.images.clear();
    }
}

/// One-time diagnostics for content the renderer reduces or skips.
#[derive(Debug, Default)]
pub(crate) struct Notes {
    multi_stop: bool,
    focal: bool,
    pattern: bool,
    text: bool,
    group_effects: bool,
}

/// Placement of one image draw.
#[derive(Debug, Copy, Clone)]
pub(crate) struct DrawParams {
    /// Document pixels to batch coordinates.
    pub xform: Transform,
    pub scissor: Scissor,
    pub viewport: Viewport,
}

struct Walker<'a, B> {
    stream: &'a mut DrawStream,
    backend: &'a mut B,
    image: &'a SvgImage,
    textures: &'a mut RasterTextures,
    notes: &'a mut Notes,
    params: DrawParams,
    tol: Tolerance,
    fringe: f32,
    raster_index: usize,
}

pub(crate) fn draw_svg<B: RenderBackend>(
    stream: &mut DrawStream,
    backend: &mut B,
    image: &SvgImage,
    textures: &mut RasterTextures,
    notes: &mut Notes,
    params: DrawParams,
) -> Result<(), BackendError> {
    let mut w = Walker {
        stream,
        backend,
        image,
        textures,
        notes,
        params,
        tol: Tolerance::for_viewport(params.viewport),
        fringe: params.viewport.fringe_width(),
        raster_index: 0,
    };
    w.group(image.tree().root(), 1.0)
}

fn transform(t: usvg::Transform) -> Transform {
    Transform::from_row(t.sx, t.ky, t.kx, t.sy, t.tx, t.ty)
}

fn color(c: usvg::Color, opacity: f32) -> Color {
    Color::from_rgba8(c.red, c.green, c.blue, 255).with_alpha_scaled(opacity)
}

impl<B: RenderBackend> Walker<'_, B> {
    fn antialias(&self) -> bool {
        self.stream.flags().antialias
    }

    fn group(&mut self, group: &usvg::Group, alpha: f32) -> Result<(), BackendError> {
        let alpha = alpha * group.opacity().get();
        if alpha <= 0.0 {
            // Keep raster indices aligned with document order.
            for_each_image(group, &mut |_| self.raster_index += 1);
            return Ok(());
        }
        let has_effects =
            group.clip_path().is_some() || group.mask().is_some() || !group.filters().is_empty();
        if has_effects && !self.notes.group_effects {
            self.notes.group_effects = true;
            log::debug!("clip paths, masks and filters are not applied");
        }

        for node in group.children() {
            match node {
                usvg::Node::Group(g) => self.group(g, alpha)?,
                usvg::Node::Path(p) => self.path(p, alpha),
                usvg::Node::Image(img) => {
                    let index = self.raster_index;
                    self.raster_index += 1;
                    self.raster(img, index, alpha)?;
                }
                usvg::Node::Text(_) => {
                    if !self.notes.text {
                        self.notes.text = true;
                        log::warn!("text nodes are not drawn");
                    }
                }
            }
        }
        Ok(())
    }

    fn path(&mut self, path: &usvg::Path, alpha: f32) {
        if !path.is_visible() {
            return;
        }
        let xform = transform(path.abs_transform()).then(self.params.xform);
        let polys = tess::flatten(path.data(), xform, self.tol);
        if polys.is_empty() {
            return;
        }

        match path.paint_order() {
            usvg::PaintOrder::FillAndStroke => {
                self.fill(path, &polys, xform, alpha);
                self.stroke(path, &polys, xform, alpha);
            }
            usvg::PaintOrder::StrokeAndFill => {
                self.stroke(path, &polys, xform, alpha);
                self.fill(path, &polys, xform, alpha);
            }
        }
    }

    fn fill(&mut self, path: &usvg::Path, polys: &[Polyline], xform: Transform, alpha: f32) {
        let Some(fill) = path.fill() else { return };
        let Some(paint) = self.paint(fill.paint(), fill.opacity().get() * alpha, xform) else {
            return;
        };
        let rule = match fill.rule() {
            usvg::FillRule::NonZero => FillRule::NonZero,
            usvg::FillRule::EvenOdd => FillRule::EvenOdd,
        };
        let fringe = self.antialias().then_some(self.fringe);
        let Some(geom) = tess::fill(polys, rule, fringe) else { return };
        self.stream.fill(
            &paint,
            CompositeOperation::SourceOver.state(),
            &self.params.scissor,
            self.fringe,
            geom.bounds,
            &geom.paths,
        );
    }

    fn stroke(&mut self, path: &usvg::Path, polys: &[Polyline], xform: Transform, alpha: f32) {
        let Some(stroke) = path.stroke() else { return };
        let mut alpha = stroke.opacity().get() * alpha;
        let mut width = stroke.width().get() * xform.average_scale();
        if width < self.fringe {
            // Thin lines fade out instead of thinning below a pixel.
            let cov = (width / self.fringe).clamp(0.0, 1.0);
            alpha *= cov * cov;
            width = self.fringe;
        }
        let Some(paint) = self.paint(stroke.paint(), alpha, xform) else { return };

        let style = StrokeStyle {
            width,
            cap: match stroke.linecap() {
                usvg::LineCap::Butt => LineCap::Butt,
                usvg::LineCap::Square => LineCap::Square,
                usvg::LineCap::Round => LineCap::Round,
            },
            miter_limit: stroke.miterlimit().get(),
        };
        let fringe = self.antialias().then_some(self.fringe);
        let meshes = tess::stroke(polys, style, fringe, self.tol.tess);
        self.stream.stroke(
            &paint,
            CompositeOperation::SourceOver.state(),
            &self.params.scissor,
            self.fringe,
            width,
            &meshes,
        );
    }

    /// Gradients keep their first and last stops only.
    fn paint(&mut self, paint: &usvg::Paint, opacity: f32, xform: Transform) -> Option<Paint> {
        match paint {
            usvg::Paint::Color(c) => Some(Paint::solid(color(*c, opacity))),
            usvg::Paint::LinearGradient(g) => {
                let (inner, outer) = self.end_stops(g.stops(), opacity)?;
                let space = transform(g.transform()).then(xform);
                let p = Paint::linear_gradient(
                    Vec2::new(g.x1(), g.y1()),
                    Vec2::new(g.x2(), g.y2()),
                    inner,
                    outer,
                );
                Some(p.transformed(&space))
            }
            usvg::Paint::RadialGradient(g) => {
                let (inner, outer) = self.end_stops(g.stops(), opacity)?;
                if (g.fx() != g.cx() || g.fy() != g.cy()) && !self.notes.focal {
                    self.notes.focal = true;
                    log::debug!("radial gradient focal points are drawn centered");
                }
                let space = transform(g.transform()).then(xform);
                let p = Paint::radial_gradient(
                    Vec2::new(g.cx(), g.cy()),
                    0.0,
                    g.r().get(),
                    inner,
                    outer,
                );
                Some(p.transformed(&space))
            }
            usvg::Paint::Pattern(_) => {
                if !self.notes.pattern {
                    self.notes.pattern = true;
                    log::warn!("pattern paints are not supported; shape skipped");
                }
                None
            }
        }
    }

    fn end_stops(&mut self, stops: &[usvg::Stop], opacity: f32) -> Option<(Color, Color)> {
        let (first, last) = (stops.first()?, stops.last()?);
        if stops.len() > 2 && !self.notes.multi_stop {
            self.notes.multi_stop = true;
            log::debug!("gradients with more than two stops use their end stops");
        }
        let stop = |s: &usvg::Stop| color(s.color(), s.opacity().get() * opacity);
        Some((stop(first), stop(last)))
    }

    fn raster(&mut self, img: &usvg::Image, index: usize, alpha: f32) -> Result<(), BackendError> {
        if !img.is_visible() {
            return Ok(());
        }
        let Some(raster) = self.image.raster(index) else { return Ok(()) };

        let id = match self.textures.get(self.image, index) {
            Some(id) => id,
            None => {
                let id = self.stream.create_image(
                    self.backend,
                    TextureFormat::Rgba,
                    raster.width,
                    raster.height,
                    ImageFlags::default(),
                    Some(&raster.rgba),
                )?;
                self.textures.insert(self.image, index, id);
                id
            }
        };

        let size = img.size();
        let (w, h) = (size.width(), size.height());
        let xform = transform(img.abs_transform()).then(self.params.xform);
        let quad = Polyline {
            points: [(0.0, 0.0), (w, 0.0), (w, h), (0.0, h)]
                .into_iter()
                .map(|(x, y)| xform.apply(Vec2::new(x, y)))
                .collect(),
            closed: true,
        };
        let paint =
            Paint::image_pattern(Vec2::zero(), Vec2::new(w, h), 0.0, id, alpha).transformed(&xform);

        let fringe = self.antialias().then_some(self.fringe);
        if let Some(geom) = tess::fill(&[quad], FillRule::NonZero, fringe) {
            self.stream.fill(
                &paint,
                CompositeOperation::SourceOver.state(),
                &self.params.scissor,
                self.fringe,
                geom.bounds,
                &geom.paths,
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::backend::recording::{Call, RecordingBackend};
    use crate::backend::ShapeKind;
    use crate::batch::SvgRenderer;
    use crate::stream::StreamFlags;
    use crate::svg::{LoadOptions, SvgImage};

    fn render(svg: &str, antialias: bool) -> SvgRenderer<RecordingBackend> {
        let image = SvgImage::from_data(svg.as_bytes(), LoadOptions::default()).unwrap();
        let flags = StreamFlags {
            antialias,
            ..StreamFlags::default()
        };
        let mut r = SvgRenderer::new(RecordingBackend::new(), flags).unwrap();
        r.begin_batch(&(), 100.0, 100.0, 1.0).unwrap();
        r.draw(&image, None).unwrap();
        r.end_batch().unwrap();
        r
    }

    fn draws(r: &SvgRenderer<RecordingBackend>) -> usize {
        r.backend().count(|c| matches!(c, Call::DrawPrimitives { .. }))
    }

    #[test]
    fn hidden_content_records_nothing() {
        let r = render(
            r##"<svg xmlns="http://www.w3.org/2000/svg" width="100" height="100">
                <g opacity="0"><rect width="10" height="10" fill="red"/></g>
                <rect width="10" height="10" fill="red" visibility="hidden"/>
                <rect width="10" height="10" fill="none"/>
            </svg>"##,
            true,
        );
        assert_eq!(draws(&r), 0);
        assert!(!r.backend().has_vertex_buffer());
    }

    #[test]
    fn thin_strokes_are_widened_to_the_fringe() {
        let r = render(
            r##"<svg xmlns="http://www.w3.org/2000/svg" width="100" height="100">
                <path d="M10 50 H90" stroke="black" stroke-width="0.25" fill="none"/>
            </svg>"##,
            true,
        );
        let ys: Vec<f32> = r.backend().vertices().iter().map(|v| v.pos[1]).collect();
        assert!(!ys.is_empty());
        // Half of the widened width plus half a fringe on either side.
        assert!(ys.iter().all(|&y| (y - 49.0).abs() < 1e-4 || (y - 51.0).abs() < 1e-4));
    }

    #[test]
    fn pattern_paints_are_skipped() {
        let r = render(
            r##"<svg xmlns="http://www.w3.org/2000/svg" width="100" height="100">
                <defs>
                    <pattern id="p" width="4" height="4" patternUnits="userSpaceOnUse">
                        <rect width="2" height="2" fill="red"/>
                    </pattern>
                </defs>
                <rect width="50" height="50" fill="url(#p)"/>
            </svg>"##,
            false,
        );
        assert_eq!(draws(&r), 0);
    }

    #[test]
    fn radial_gradient_uses_gradient_technique() {
        let r = render(
            r##"<svg xmlns="http://www.w3.org/2000/svg" width="100" height="100">
                <defs>
                    <radialGradient id="g" cx="50" cy="50" r="40" gradientUnits="userSpaceOnUse">
                        <stop offset="0" stop-color="white"/>
                        <stop offset="0.5" stop-color="red"/>
                        <stop offset="1" stop-color="black"/>
                    </radialGradient>
                </defs>
                <rect x="10" y="10" width="80" height="80" fill="url(#g)"/>
            </svg>"##,
            false,
        );
        assert_eq!(draws(&r), 1);
        assert_eq!(
            r.backend()
                .count(|c| matches!(c, Call::UpdateShader(t) if t.shape == ShapeKind::Gradient)),
            1
        );
    }

    /// A document embedding one 2x2 PNG by absolute path.
    fn with_raster(tag: &str) -> SvgImage {
        let png = std::env::temp_dir().join(format!("svgpu-{tag}-{}.png", std::process::id()));
        image::RgbaImage::from_pixel(2, 2, image::Rgba([0, 255, 0, 255]))
            .save(&png)
            .unwrap();
        let svg = format!(
            r##"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink"
                    width="100" height="100">
                <image x="10" y="10" width="20" height="20" xlink:href="{}"/>
            </svg>"##,
            png.display()
        );
        let image = SvgImage::from_data(svg.as_bytes(), LoadOptions::default()).unwrap();
        let _ = std::fs::remove_file(&png);
        image
    }

    #[test]
    fn dropped_images_release_their_textures() {
        let kept = with_raster("kept");
        let dropped = with_raster("dropped");

        let mut r = SvgRenderer::new(RecordingBackend::new(), StreamFlags::default()).unwrap();
        r.begin_batch(&(), 100.0, 100.0, 1.0).unwrap();
        r.draw(&kept, None).unwrap();
        r.draw(&dropped, None).unwrap();
        r.end_batch().unwrap();
        assert_eq!(r.raster_texture_count(), 2);

        drop(dropped);
        // Nothing is freed until the next batch starts.
        assert_eq!(r.backend().live_textures(), 2);

        r.begin_batch(&(), 100.0, 100.0, 1.0).unwrap();
        r.draw(&kept, None).unwrap();
        r.end_batch().unwrap();

        let b = r.backend();
        assert_eq!(b.count(|c| matches!(c, Call::DeleteTexture { .. })), 1);
        assert_eq!(b.count(|c| matches!(c, Call::CreateTexture { .. })), 2);
        assert_eq!(b.live_textures(), 1);
        assert_eq!(r.raster_texture_count(), 1);
    }

    #[test]
    fn raster_images_are_uploaded_once() {
        let image = with_raster("once");

        let mut r = SvgRenderer::new(RecordingBackend::new(), StreamFlags::default()).unwrap();
        for _ in 0..2 {
            r.begin_batch(&(), 100.0, 100.0, 1.0).unwrap();
            r.draw(&image, None).unwrap();
            r.draw(&image, None).unwrap();
            r.end_batch().unwrap();
        }

        let b = r.backend();
        assert_eq!(b.count(|c| matches!(c, Call::CreateTexture { .. })), 1);
        assert_eq!(b.count(|c| matches!(c, Call::UpdateTexture { .. })), 1);
        assert!(b.count(|c| matches!(c, Call::UpdateSampler(_))) >= 4);
        assert_eq!(r.raster_texture_count(), 1);

        r.release_image(&image).unwrap();
        assert_eq!(r.raster_texture_count(), 0);
        assert_eq!(r.backend().live_textures(), 0);
    }
}
