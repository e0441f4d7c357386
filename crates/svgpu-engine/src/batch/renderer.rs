use crate::backend::RenderBackend;
use crate::coords::{Rect, Transform, Viewport};
use crate::error::Result;
use crate::stream::{DrawStream, Scissor, StreamFlags};
use crate::svg::{self, DrawParams, Notes, RasterTextures, SvgImage};

use super::UsageError;

#[derive(Debug, Copy, Clone, PartialEq)]
enum Phase {
    Idle,
    Batching(Viewport),
    Disposed,
}

/// Frame/batch controller: draws parsed images through a [`RenderBackend`].
///
/// ```text
/// Idle -> begin_batch -> Batching -> draw* -> end_batch -> Idle
/// ```
///
/// Any failure inside a batch discards the frame and returns to `Idle`.
///
/// Embedded raster images are uploaded on first draw and kept until
/// [`release_image`](Self::release_image), until the next `begin_batch`
/// after their [`SvgImage`] is dropped, or until dispose.
pub struct SvgRenderer<B: RenderBackend> {
    backend: B,
    stream: DrawStream,
    textures: RasterTextures,
    notes: Notes,
    phase: Phase,
}

impl<B: RenderBackend> SvgRenderer<B> {
    /// Creates the device context on `backend`.
    pub fn new(mut backend: B, flags: StreamFlags) -> Result<Self> {
        let mut stream = DrawStream::new(flags);
        stream.create(&mut backend)?;
        Ok(Self {
            backend,
            stream,
            textures: RasterTextures::default(),
            notes: Notes::default(),
            phase: Phase::Idle,
        })
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    #[cfg(test)]
    fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn is_batching(&self) -> bool {
        matches!(self.phase, Phase::Batching(_))
    }

    pub fn is_disposed(&self) -> bool {
        self.phase == Phase::Disposed
    }

    /// Textures currently held for embedded raster images.
    pub fn raster_texture_count(&self) -> usize {
        self.textures.len()
    }

    /// Starts a frame on `target`. `width` and `height` are the logical size
    /// the target spans; `pixel_ratio` is physical pixels per logical pixel.
    pub fn begin_batch(
        &mut self,
        target: &B::Target,
        width: f32,
        height: f32,
        pixel_ratio: f32,
    ) -> Result<()> {
        match self.phase {
            Phase::Idle => {}
            Phase::Batching(_) => return Err(UsageError::NestedBatch.into()),
            Phase::Disposed => return Err(UsageError::Disposed.into()),
        }
        let viewport = Viewport::new(width, height, pixel_ratio);
        if !viewport.is_valid() {
            return Err(UsageError::InvalidViewport {
                width,
                height,
                pixel_ratio,
            }
            .into());
        }

        self.release_dropped()?;
        self.backend.begin_frame(target)?;
        self.stream.viewport(&mut self.backend, viewport);
        self.phase = Phase::Batching(viewport);
        log::debug!("batch begun ({width}x{height} @ {pixel_ratio})");
        Ok(())
    }

    /// Records `image`, either at its intrinsic pixel size at the origin or
    /// stretched onto `dest` and clipped to it.
    pub fn draw(&mut self, image: &SvgImage, dest: Option<Rect>) -> Result<()> {
        let viewport = match self.phase {
            Phase::Batching(viewport) => viewport,
            Phase::Idle => return Err(UsageError::DrawOutsideBatch.into()),
            Phase::Disposed => return Err(UsageError::Disposed.into()),
        };

        let (xform, scissor) = match dest {
            None => (Transform::identity(), Scissor::none()),
            Some(r) => {
                let (w, h) = image.size_px();
                if w <= 0.0 || h <= 0.0 {
                    return Ok(());
                }
                let fit = Transform::scale(r.size.x / w, r.size.y / h)
                    .then(Transform::translate(r.origin.x, r.origin.y));
                let clip = Scissor::rect(r.origin.x, r.origin.y, r.size.x, r.size.y, Transform::identity());
                (fit, clip)
            }
        };
        let params = DrawParams {
            xform,
            scissor,
            viewport,
        };

        let drawn = svg::draw_svg(
            &mut self.stream,
            &mut self.backend,
            image,
            &mut self.textures,
            &mut self.notes,
            params,
        );
        if let Err(err) = drawn {
            self.abort();
            return Err(err.into());
        }
        Ok(())
    }

    /// Submits everything drawn since `begin_batch`.
    pub fn end_batch(&mut self) -> Result<()> {
        match self.phase {
            Phase::Batching(_) => {}
            Phase::Idle => return Err(UsageError::EndOutsideBatch.into()),
            Phase::Disposed => return Err(UsageError::Disposed.into()),
        }
        self.phase = Phase::Idle;
        if let Err(err) = self.stream.flush(&mut self.backend) {
            if let Err(abort) = self.backend.abort_frame() {
                log::debug!("closing failed frame: {abort}");
            }
            return Err(err.into());
        }
        self.backend.end_frame()?;
        log::debug!("batch ended");
        Ok(())
    }

    /// Frees the textures created for `image`'s raster nodes. They are
    /// recreated if the image is drawn again.
    pub fn release_image(&mut self, image: &SvgImage) -> Result<()> {
        match self.phase {
            Phase::Idle => {}
            Phase::Batching(_) => return Err(UsageError::ReleaseInBatch.into()),
            Phase::Disposed => return Err(UsageError::Disposed.into()),
        }
        for id in self.textures.take_image(image) {
            self.stream.delete_image(&mut self.backend, id)?;
        }
        Ok(())
    }

    /// Releases every device resource. Later calls are no-ops.
    pub fn dispose(&mut self) -> Result<()> {
        if self.phase == Phase::Disposed {
            return Ok(());
        }
        if self.is_batching() {
            self.abort();
        }
        self.phase = Phase::Disposed;
        self.textures.clear();
        self.stream.delete(&mut self.backend)?;
        log::debug!("renderer disposed");
        Ok(())
    }

    fn release_dropped(&mut self) -> Result<()> {
        for id in self.textures.take_dropped() {
            self.stream.delete_image(&mut self.backend, id)?;
        }
        Ok(())
    }

    fn abort(&mut self) {
        self.stream.cancel();
        self.phase = Phase::Idle;
        if let Err(err) = self.backend.abort_frame() {
            log::debug!("closing aborted frame: {err}");
        }
    }
}

impl<B: RenderBackend> Drop for SvgRenderer<B> {
    fn drop(&mut self) {
        if let Err(err) = self.dispose() {
            log::warn!("releasing renderer resources: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::recording::{Call, RecordingBackend};
    use crate::backend::{BackendError, PrimitiveMode, ShapeKind};
    use crate::error::Error;
    use crate::svg::LoadOptions;

    const RECT: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="100" height="100">
        <rect width="100" height="100" fill="#ff0000"/>
    </svg>"##;

    const GRADIENT: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="100" height="100">
        <defs>
            <linearGradient id="g" x1="0" y1="0" x2="1" y2="0">
                <stop offset="0" stop-color="#000"/>
                <stop offset="1" stop-color="#fff"/>
            </linearGradient>
        </defs>
        <rect width="100" height="100" fill="url(#g)"/>
    </svg>"##;

    fn image(svg: &str) -> SvgImage {
        SvgImage::from_data(svg.as_bytes(), LoadOptions::default()).unwrap()
    }

    fn renderer(antialias: bool) -> SvgRenderer<RecordingBackend> {
        let flags = StreamFlags {
            antialias,
            ..StreamFlags::default()
        };
        SvgRenderer::new(RecordingBackend::new(), flags).unwrap()
    }

    fn usage(err: Error) -> UsageError {
        match err {
            Error::Usage(u) => u,
            other => panic!("expected usage error, got {other:?}"),
        }
    }

    #[test]
    fn flat_rect_is_one_convex_fill() {
        let img = image(RECT);
        let mut r = renderer(false);
        r.begin_batch(&(), 800.0, 600.0, 1.0).unwrap();
        r.draw(&img, None).unwrap();
        r.end_batch().unwrap();

        let b = r.backend();
        assert_eq!(b.count(|c| matches!(c, Call::CreateTexture { .. })), 0);
        assert_eq!(b.count(|c| matches!(c, Call::CreateVertexBuffer { .. })), 1);
        assert_eq!(b.count(|c| matches!(c, Call::UpdateVertexBuffer { .. })), 1);

        let draws: Vec<_> = b
            .calls()
            .iter()
            .filter_map(|c| match c {
                Call::DrawPrimitives { mode, vertex_count, primitives, .. } => {
                    Some((*mode, *vertex_count, *primitives))
                }
                _ => None,
            })
            .collect();
        assert_eq!(draws, vec![(PrimitiveMode::TriangleList, 6, 2)]);

        let mut xs: Vec<f32> = b.vertices().iter().map(|v| v.pos[0]).collect();
        xs.sort_by(f32::total_cmp);
        assert_eq!(xs.first().copied(), Some(0.0));
        assert_eq!(xs.last().copied(), Some(100.0));
    }

    #[test]
    fn viewport_precedes_draws() {
        let img = image(RECT);
        let mut r = renderer(true);
        r.begin_batch(&(), 800.0, 600.0, 2.0).unwrap();
        r.draw(&img, None).unwrap();
        r.end_batch().unwrap();

        let calls = r.backend().calls();
        let viewport = calls
            .iter()
            .position(|c| *c == Call::SetViewport { width: 800.0, height: 600.0 })
            .unwrap();
        let first_draw = calls
            .iter()
            .position(|c| matches!(c, Call::DrawPrimitives { .. }))
            .unwrap();
        assert!(viewport < first_draw);
        // Fill plus its anti-aliasing fringe.
        assert_eq!(r.backend().count(|c| matches!(c, Call::DrawPrimitives { .. })), 2);
    }

    #[test]
    fn gradient_fill_selects_gradient_technique() {
        let img = image(GRADIENT);
        let mut r = renderer(false);
        r.begin_batch(&(), 100.0, 100.0, 1.0).unwrap();
        r.draw(&img, None).unwrap();
        r.end_batch().unwrap();

        let b = r.backend();
        assert_eq!(b.count(|c| matches!(c, Call::CreateTexture { .. })), 0);
        assert!(b.count(|c| matches!(c, Call::UpdateShader(t) if t.shape == ShapeKind::Gradient)) >= 1);
    }

    #[test]
    fn dest_rect_scales_and_scissors() {
        let img = image(RECT);
        let mut r = renderer(false);
        r.begin_batch(&(), 800.0, 600.0, 1.0).unwrap();
        r.draw(&img, Some(Rect::new(10.0, 20.0, 50.0, 25.0))).unwrap();
        r.end_batch().unwrap();

        let pts: Vec<[f32; 2]> = r.backend().vertices().iter().map(|v| v.pos).collect();
        assert!(pts.iter().all(|p| (10.0..=60.0).contains(&p[0])));
        assert!(pts.iter().all(|p| (20.0..=45.0).contains(&p[1])));
        assert!(pts.contains(&[60.0, 45.0]));
    }

    #[test]
    fn draw_outside_batch_is_rejected() {
        let img = image(RECT);
        let mut r = renderer(true);
        assert_eq!(usage(r.draw(&img, None).unwrap_err()), UsageError::DrawOutsideBatch);

        r.begin_batch(&(), 10.0, 10.0, 1.0).unwrap();
        r.end_batch().unwrap();
        assert_eq!(usage(r.draw(&img, None).unwrap_err()), UsageError::DrawOutsideBatch);
    }

    #[test]
    fn nested_and_unmatched_batches_are_rejected() {
        let mut r = renderer(true);
        assert_eq!(usage(r.end_batch().unwrap_err()), UsageError::EndOutsideBatch);

        r.begin_batch(&(), 10.0, 10.0, 1.0).unwrap();
        assert_eq!(
            usage(r.begin_batch(&(), 10.0, 10.0, 1.0).unwrap_err()),
            UsageError::NestedBatch
        );
        // The original batch is still open.
        r.end_batch().unwrap();
    }

    #[test]
    fn invalid_viewport_is_rejected() {
        let mut r = renderer(true);
        let err = usage(r.begin_batch(&(), 0.0, 10.0, 1.0).unwrap_err());
        assert!(matches!(err, UsageError::InvalidViewport { .. }));
        assert!(!r.is_batching());
    }

    #[test]
    fn multiple_draws_share_one_upload() {
        let img = image(RECT);
        let mut r = renderer(false);
        r.begin_batch(&(), 800.0, 600.0, 1.0).unwrap();
        r.draw(&img, None).unwrap();
        r.draw(&img, Some(Rect::new(200.0, 0.0, 100.0, 100.0))).unwrap();
        r.end_batch().unwrap();

        let b = r.backend();
        assert_eq!(b.count(|c| matches!(c, Call::UpdateVertexBuffer { .. })), 1);
        assert_eq!(b.count(|c| matches!(c, Call::DrawPrimitives { .. })), 2);
        assert_eq!(b.vertices().len(), 12);
    }

    #[test]
    fn dispose_tears_down_once() {
        let img = image(RECT);
        let mut r = renderer(true);
        r.begin_batch(&(), 10.0, 10.0, 1.0).unwrap();
        r.draw(&img, None).unwrap();
        r.end_batch().unwrap();

        r.dispose().unwrap();
        r.dispose().unwrap();
        assert!(r.is_disposed());
        assert!(!r.backend().has_context());
        assert!(!r.backend().has_vertex_buffer());
        assert_eq!(r.backend().count(|c| *c == Call::DeleteContext), 1);
        assert_eq!(usage(r.begin_batch(&(), 10.0, 10.0, 1.0).unwrap_err()), UsageError::Disposed);
    }

    #[test]
    fn dispose_mid_batch_discards_the_frame() {
        let img = image(RECT);
        let mut r = renderer(true);
        r.begin_batch(&(), 10.0, 10.0, 1.0).unwrap();
        r.draw(&img, None).unwrap();
        r.dispose().unwrap();
        assert_eq!(r.backend().count(|c| matches!(c, Call::DrawPrimitives { .. })), 0);
        assert_eq!(r.backend().count(|c| *c == Call::AbortFrame), 1);
        assert_eq!(r.backend().count(|c| *c == Call::EndFrame), 0);
    }

    #[test]
    fn failed_flush_discards_the_frame() {
        let png = std::env::temp_dir().join(format!("svgpu-flush-{}.png", std::process::id()));
        image::RgbaImage::from_pixel(2, 2, image::Rgba([0, 0, 255, 255]))
            .save(&png)
            .unwrap();
        let svg = format!(
            r##"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink"
                    width="100" height="100">
                <rect width="50" height="50" fill="#ff0000"/>
                <image x="50" y="50" width="20" height="20" xlink:href="{}"/>
            </svg>"##,
            png.display()
        );
        let img = image(&svg);
        let _ = std::fs::remove_file(&png);

        let mut r = renderer(false);
        r.begin_batch(&(), 100.0, 100.0, 1.0).unwrap();
        r.draw(&img, None).unwrap();

        // Pull the raster texture out from under the stream so replay fails
        // after the rect has already been drawn.
        let texture = r
            .backend()
            .calls()
            .iter()
            .find_map(|c| match c {
                Call::CreateTexture { handle, .. } => Some(*handle),
                _ => None,
            })
            .unwrap();
        r.backend_mut().delete_texture(texture).unwrap();

        let err = r.end_batch().unwrap_err();
        assert!(matches!(err, Error::Backend(BackendError::UnknownTexture(h)) if h == texture));

        let b = r.backend();
        assert_eq!(b.count(|c| matches!(c, Call::DrawPrimitives { .. })), 1);
        assert_eq!(b.count(|c| *c == Call::EndFrame), 0);
        assert_eq!(b.count(|c| *c == Call::AbortFrame), 1);
        assert!(!r.is_batching());

        r.begin_batch(&(), 100.0, 100.0, 1.0).unwrap();
        r.end_batch().unwrap();
    }
}
