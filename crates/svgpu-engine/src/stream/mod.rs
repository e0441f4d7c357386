//! Draw-stream producer.
//!
//! Shapes are accumulated during a frame as draw calls over one shared vertex
//! array and a list of fragment uniform records. `flush` replays them through
//! a [`RenderBackend`] in protocol order; `cancel` drops them.
//!
//! Fills use the stencil-then-cover technique: fans are drawn into the stencil
//! buffer with color writes off (front faces decrement, back faces
//! increment), fringes are drawn where the stencil is still zero, then the
//! bounding quad covers every non-zero sample and clears it.

mod call;
mod images;
mod uniforms;

pub use call::PathMesh;
pub use images::{ImageFlags, ImageId};
pub use uniforms::{FragRecord, FragUniforms, Scissor};

use crate::backend::{
    AaMode, BackendError, CompositeKind, CompositeState, Handle, PrimitiveMode, RenderBackend,
    ShapeKind, StencilConfig, StencilFaceOps, StencilFunc, StencilOp, Technique, TextureFormat,
    TextureRegion, Vertex,
};
use crate::coords::{Rect, Transform, Viewport};
use crate::paint::Paint;

use call::{fan_list_len, CallKind, DrawCall, PathRange};
use images::ImageRegistry;

/// Stream creation flags.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct StreamFlags {
    /// Draw anti-aliasing fringes and select the edge-AA techniques.
    pub antialias: bool,
    /// Draw strokes through the stencil buffer so overlapping segments do
    /// not blend twice.
    pub stencil_strokes: bool,
}

impl Default for StreamFlags {
    fn default() -> Self {
        Self {
            antialias: true,
            stencil_strokes: true,
        }
    }
}

/// Alpha below which the stencil-stroke base pass discards fragments.
const STENCIL_STROKE_THRESHOLD: f32 = 1.0 - 0.5 / 255.0;

/// Per-context draw stream.
#[derive(Debug, Default)]
pub struct DrawStream {
    flags: StreamFlags,
    calls: Vec<DrawCall>,
    paths: Vec<PathRange>,
    verts: Vec<Vertex>,
    uniforms: Vec<FragRecord>,
    /// Live vertex buffer and its size in bytes.
    vertex_buffer: Option<(Handle, usize)>,
    images: ImageRegistry,
}

impl DrawStream {
    pub fn new(flags: StreamFlags) -> Self {
        Self {
            flags,
            ..Self::default()
        }
    }

    #[inline]
    pub fn flags(&self) -> StreamFlags {
        self.flags
    }

    #[inline]
    pub fn pending_calls(&self) -> usize {
        self.calls.len()
    }

    #[inline]
    pub fn pending_vertices(&self) -> usize {
        self.verts.len()
    }

    // ── lifetime ──────────────────────────────────────────────────────────

    pub fn create<B: RenderBackend>(&mut self, backend: &mut B) -> Result<(), BackendError> {
        backend.create_context()
    }

    /// Deletes every image, then the vertex buffer, then the device context.
    pub fn delete<B: RenderBackend>(&mut self, backend: &mut B) -> Result<(), BackendError> {
        self.cancel();
        let images = self.images.clear(backend);
        let buffer = match self.vertex_buffer.take() {
            Some((handle, _)) => backend.delete_vertex_buffer(handle),
            None => Ok(()),
        };
        backend.delete_context();
        images.and(buffer)
    }

    pub fn viewport<B: RenderBackend>(&mut self, backend: &mut B, viewport: Viewport) {
        backend.set_viewport(viewport.width, viewport.height);
    }

    // ── images ────────────────────────────────────────────────────────────

    pub fn create_image<B: RenderBackend>(
        &mut self,
        backend: &mut B,
        format: TextureFormat,
        width: u32,
        height: u32,
        flags: ImageFlags,
        data: Option<&[u8]>,
    ) -> Result<ImageId, BackendError> {
        self.images
            .create(backend, format, width, height, flags, data)
    }

    /// Uploads a sub-rectangle. Returns `Ok(false)` if `id` is unknown.
    pub fn update_image<B: RenderBackend>(
        &mut self,
        backend: &mut B,
        id: ImageId,
        region: TextureRegion,
        data: &[u8],
    ) -> Result<bool, BackendError> {
        self.images.update(backend, id, region, data)
    }

    /// Returns `Ok(false)` if `id` is unknown.
    pub fn delete_image<B: RenderBackend>(
        &mut self,
        backend: &mut B,
        id: ImageId,
    ) -> Result<bool, BackendError> {
        self.images.delete(backend, id)
    }

    pub fn image_size(&self, id: ImageId) -> Option<(u32, u32)> {
        self.images.get(id).map(|e| (e.width, e.height))
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    // ── recording ─────────────────────────────────────────────────────────

    pub fn fill(
        &mut self,
        paint: &Paint,
        blend: CompositeState,
        scissor: &Scissor,
        fringe: f32,
        bounds: Rect,
        paths: &[PathMesh],
    ) {
        let convex = paths.len() == 1 && paths[0].convex;
        let (kind, triangle_count) = if convex {
            (CallKind::ConvexFill, 0)
        } else {
            (CallKind::Fill, 4)
        };

        let records = if convex {
            self.convert_paint(paint, scissor, fringe, fringe, -1.0)
                .map(|r| vec![r])
        } else {
            self.convert_paint(paint, scissor, fringe, fringe, -1.0)
                .map(|r| vec![FragRecord::stencil_only(), r])
        };
        let Some(records) = records else { return };

        let path_offset = self.paths.len();
        for path in paths {
            let mut range = PathRange::default();
            if path.fill.len() > 2 {
                range.fill_offset = self.verts.len() as u32;
                range.fill_count = fan_list_len(path.fill.len()) as u32;
                let hub = path.fill[0];
                for w in path.fill[1..].windows(2) {
                    self.verts.extend_from_slice(&[w[0], w[1], hub]);
                }
            }
            if !path.stroke.is_empty() {
                range.stroke_offset = self.verts.len() as u32;
                range.stroke_count = path.stroke.len() as u32;
                self.verts.extend_from_slice(&path.stroke);
            }
            self.paths.push(range);
        }

        let triangle_offset = self.verts.len() as u32;
        if kind == CallKind::Fill {
            let (min, max) = (bounds.min(), bounds.max());
            self.verts.extend_from_slice(&[
                Vertex::new(max.x, max.y, 0.5, 1.0),
                Vertex::new(max.x, min.y, 0.5, 1.0),
                Vertex::new(min.x, max.y, 0.5, 1.0),
                Vertex::new(min.x, min.y, 0.5, 1.0),
            ]);
        }

        let uniform_offset = self.uniforms.len();
        self.uniforms.extend(records);
        self.calls.push(DrawCall {
            kind,
            image: paint.image,
            path_offset,
            path_count: paths.len(),
            triangle_offset,
            triangle_count,
            uniform_offset,
            blend,
        });
    }

    pub fn stroke(
        &mut self,
        paint: &Paint,
        blend: CompositeState,
        scissor: &Scissor,
        fringe: f32,
        stroke_width: f32,
        paths: &[PathMesh],
    ) {
        let records = if self.flags.stencil_strokes {
            let aa = self.convert_paint(paint, scissor, stroke_width, fringe, -1.0);
            let base = self.convert_paint(
                paint,
                scissor,
                stroke_width,
                fringe,
                STENCIL_STROKE_THRESHOLD,
            );
            aa.zip(base).map(|(a, b)| vec![a, b])
        } else {
            self.convert_paint(paint, scissor, stroke_width, fringe, -1.0)
                .map(|r| vec![r])
        };
        let Some(records) = records else { return };

        let path_offset = self.paths.len();
        for path in paths {
            let mut range = PathRange::default();
            if !path.stroke.is_empty() {
                range.stroke_offset = self.verts.len() as u32;
                range.stroke_count = path.stroke.len() as u32;
                self.verts.extend_from_slice(&path.stroke);
            }
            self.paths.push(range);
        }

        let uniform_offset = self.uniforms.len();
        self.uniforms.extend(records);
        self.calls.push(DrawCall {
            kind: CallKind::Stroke,
            image: paint.image,
            path_offset,
            path_count: paths.len(),
            triangle_offset: 0,
            triangle_count: 0,
            uniform_offset,
            blend,
        });
    }

    /// Textured triangle list (e.g. glyph quads).
    pub fn triangles(
        &mut self,
        paint: &Paint,
        blend: CompositeState,
        scissor: &Scissor,
        verts: &[Vertex],
        fringe: f32,
    ) {
        let Some(mut record) = self.convert_paint(paint, scissor, 1.0, fringe, -1.0) else {
            return;
        };
        record.shape = ShapeKind::Triangles;

        let triangle_offset = self.verts.len() as u32;
        self.verts.extend_from_slice(verts);

        let uniform_offset = self.uniforms.len();
        self.uniforms.push(record);
        self.calls.push(DrawCall {
            kind: CallKind::Triangles,
            image: paint.image,
            path_offset: self.paths.len(),
            path_count: 0,
            triangle_offset,
            triangle_count: verts.len() as u32,
            uniform_offset,
            blend,
        });
    }

    /// Drops everything recorded since the last flush.
    pub fn cancel(&mut self) {
        self.calls.clear();
        self.paths.clear();
        self.verts.clear();
        self.uniforms.clear();
    }

    // ── replay ────────────────────────────────────────────────────────────

    /// Uploads the frame's vertices and replays every recorded call.
    ///
    /// Recorded data is discarded whether or not replay succeeds.
    pub fn flush<B: RenderBackend>(&mut self, backend: &mut B) -> Result<(), BackendError> {
        let result = if self.calls.is_empty() {
            Ok(())
        } else {
            self.replay(backend)
        };
        self.cancel();
        result
    }

    fn replay<B: RenderBackend>(&mut self, backend: &mut B) -> Result<(), BackendError> {
        backend.reset_state();

        let needed = self.verts.len().max(1) * Vertex::STRIDE;
        let buffer = match self.vertex_buffer {
            Some((handle, size)) if size >= needed => handle,
            stale => {
                if let Some((handle, _)) = stale {
                    self.vertex_buffer = None;
                    backend.delete_vertex_buffer(handle)?;
                }
                let handle = backend.create_vertex_buffer(needed)?;
                self.vertex_buffer = Some((handle, needed));
                handle
            }
        };
        backend.update_vertex_buffer(buffer, &self.verts)?;

        for call in &self.calls {
            backend.update_blend(call.blend);
            match call.kind {
                CallKind::Fill => self.replay_fill(backend, buffer, call)?,
                CallKind::ConvexFill => self.replay_convex_fill(backend, buffer, call)?,
                CallKind::Stroke => self.replay_stroke(backend, buffer, call)?,
                CallKind::Triangles => self.replay_triangles(backend, buffer, call)?,
            }
        }
        Ok(())
    }

    fn replay_fill<B: RenderBackend>(
        &self,
        backend: &mut B,
        buffer: Handle,
        call: &DrawCall,
    ) -> Result<(), BackendError> {
        let paths = self.call_paths(call);

        // Shapes into the stencil buffer.
        backend.toggle_color_write(false);
        backend.toggle_stencil(true);
        backend.update_stencil(StencilConfig::new(
            StencilFunc::Always,
            StencilFaceOps::on_pass(StencilOp::Increment),
            StencilFaceOps::on_pass(StencilOp::Decrement),
        ));
        backend.toggle_cull(false);
        self.set_uniforms(backend, call.uniform_offset, None)?;
        backend.apply_state(buffer)?;
        for p in paths {
            draw(backend, PrimitiveMode::TriangleList, p.fill_offset, p.fill_count)?;
        }

        // Anti-aliased fringes outside the shape.
        backend.toggle_color_write(true);
        backend.toggle_cull(true);
        self.set_uniforms(backend, call.uniform_offset + 1, call.image)?;
        if self.flags.antialias {
            backend.update_stencil(StencilConfig::symmetric(
                StencilFunc::Equal,
                StencilFaceOps::all(StencilOp::Keep),
            ));
            backend.apply_state(buffer)?;
            for p in paths {
                draw(backend, PrimitiveMode::TriangleStrip, p.stroke_offset, p.stroke_count)?;
            }
        }

        // Cover, clearing the stencil as it goes.
        backend.update_stencil(StencilConfig::symmetric(
            StencilFunc::NotEqual,
            StencilFaceOps::all(StencilOp::Zero),
        ));
        backend.apply_state(buffer)?;
        draw(
            backend,
            PrimitiveMode::TriangleStrip,
            call.triangle_offset,
            call.triangle_count,
        )?;

        backend.toggle_stencil(false);
        Ok(())
    }

    fn replay_convex_fill<B: RenderBackend>(
        &self,
        backend: &mut B,
        buffer: Handle,
        call: &DrawCall,
    ) -> Result<(), BackendError> {
        self.set_uniforms(backend, call.uniform_offset, call.image)?;
        backend.apply_state(buffer)?;
        for p in self.call_paths(call) {
            draw(backend, PrimitiveMode::TriangleList, p.fill_offset, p.fill_count)?;
            draw(backend, PrimitiveMode::TriangleStrip, p.stroke_offset, p.stroke_count)?;
        }
        Ok(())
    }

    fn replay_stroke<B: RenderBackend>(
        &self,
        backend: &mut B,
        buffer: Handle,
        call: &DrawCall,
    ) -> Result<(), BackendError> {
        let paths = self.call_paths(call);
        let draw_strips = |backend: &mut B| -> Result<(), BackendError> {
            for p in paths {
                draw(backend, PrimitiveMode::TriangleStrip, p.stroke_offset, p.stroke_count)?;
            }
            Ok(())
        };

        if !self.flags.stencil_strokes {
            self.set_uniforms(backend, call.uniform_offset, call.image)?;
            backend.apply_state(buffer)?;
            return draw_strips(backend);
        }

        backend.toggle_stencil(true);

        // Stroke base without overlap.
        backend.update_stencil(StencilConfig::symmetric(
            StencilFunc::Equal,
            StencilFaceOps::on_pass(StencilOp::IncrementSaturate),
        ));
        self.set_uniforms(backend, call.uniform_offset + 1, call.image)?;
        backend.apply_state(buffer)?;
        draw_strips(backend)?;

        // Anti-aliased pixels.
        self.set_uniforms(backend, call.uniform_offset, call.image)?;
        backend.update_stencil(StencilConfig::symmetric(
            StencilFunc::Equal,
            StencilFaceOps::all(StencilOp::Keep),
        ));
        backend.apply_state(buffer)?;
        draw_strips(backend)?;

        // Clear the stencil.
        backend.toggle_color_write(false);
        backend.update_stencil(StencilConfig::symmetric(
            StencilFunc::Always,
            StencilFaceOps::all(StencilOp::Zero),
        ));
        backend.apply_state(buffer)?;
        draw_strips(backend)?;

        backend.toggle_color_write(true);
        backend.toggle_stencil(false);
        Ok(())
    }

    fn replay_triangles<B: RenderBackend>(
        &self,
        backend: &mut B,
        buffer: Handle,
        call: &DrawCall,
    ) -> Result<(), BackendError> {
        self.set_uniforms(backend, call.uniform_offset, call.image)?;
        backend.apply_state(buffer)?;
        draw(
            backend,
            PrimitiveMode::TriangleList,
            call.triangle_offset,
            call.triangle_count,
        )
    }

    fn call_paths(&self, call: &DrawCall) -> &[PathRange] {
        &self.paths[call.path_offset..call.path_offset + call.path_count]
    }

    fn set_uniforms<B: RenderBackend>(
        &self,
        backend: &mut B,
        record: usize,
        image: Option<ImageId>,
    ) -> Result<(), BackendError> {
        let rec = &self.uniforms[record];
        backend.update_uniforms(rec.uniforms.as_bytes())?;
        backend.update_shader(Technique::new(
            AaMode::from_enabled(self.flags.antialias),
            rec.shape,
            rec.composite,
        ))?;
        if let Some(entry) = image.and_then(|id| self.images.get(id)) {
            backend.update_sampler(entry.texture)?;
        }
        Ok(())
    }

    // ── paint conversion ──────────────────────────────────────────────────

    /// Builds the fragment record for `paint`. Returns `None` when the paint
    /// references an unknown image; the shape is then skipped.
    fn convert_paint(
        &self,
        paint: &Paint,
        scissor: &Scissor,
        width: f32,
        fringe: f32,
        stroke_threshold: f32,
    ) -> Option<FragRecord> {
        let mut u = FragUniforms {
            inner_color: paint.inner_color.premultiplied(),
            outer_color: paint.outer_color.premultiplied(),
            extent: paint.extent,
            stroke_mult: (width * 0.5 + fringe * 0.5) / fringe,
            stroke_threshold,
            ..FragUniforms::default()
        };

        if scissor.is_enabled() {
            let x = scissor.xform.m;
            u.scissor_mat = scissor.xform.inverse().to_mat3x4();
            u.scissor_extent = scissor.extent;
            u.scissor_scale = [
                (x[0] * x[0] + x[2] * x[2]).sqrt() / fringe,
                (x[1] * x[1] + x[3] * x[3]).sqrt() / fringe,
            ];
        } else {
            u.scissor_extent = [1.0, 1.0];
            u.scissor_scale = [1.0, 1.0];
        }

        let (shape, composite, paint_xform) = match paint.image {
            Some(id) => {
                let Some(entry) = self.images.get(id) else {
                    log::warn!("paint references unknown image {}; shape skipped", id.get());
                    return None;
                };
                let composite = match entry.format {
                    TextureFormat::Rgba if entry.flags.premultiplied => {
                        CompositeKind::Premultiplied
                    }
                    TextureFormat::Rgba => CompositeKind::NonPremultiplied,
                    TextureFormat::Alpha => CompositeKind::Alpha,
                };
                let xform = if entry.flags.flip_y {
                    let half = u.extent[1] * 0.5;
                    Transform::translate(0.0, -half)
                        .then(Transform::scale(1.0, -1.0))
                        .then(Transform::translate(0.0, half))
                        .then(paint.xform)
                } else {
                    paint.xform
                };
                (ShapeKind::Image, composite, xform)
            }
            None => {
                u.radius = paint.radius;
                u.feather = paint.feather;
                (ShapeKind::Gradient, CompositeKind::Premultiplied, paint.xform)
            }
        };
        u.paint_mat = paint_xform.inverse().to_mat3x4();

        Some(FragRecord {
            uniforms: u,
            shape,
            composite,
        })
    }
}

/// Issues a draw, skipping empty ranges.
fn draw<B: RenderBackend>(
    backend: &mut B,
    mode: PrimitiveMode,
    first: u32,
    count: u32,
) -> Result<(), BackendError> {
    if count == 0 {
        return Ok(());
    }
    backend.draw_primitives(mode, first, count)
}
