use crate::backend::{CompositeState, Vertex};

use super::ImageId;

/// Tessellated geometry of one sub-path.
///
/// `fill` is a triangle fan (first vertex is the hub), `stroke` a triangle
/// strip: the anti-aliasing fringe of a fill, or the body of a stroke.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PathMesh {
    pub fill: Vec<Vertex>,
    pub stroke: Vec<Vertex>,
    pub convex: bool,
}

/// `(n - 2) * 3` for fans of at least 3 vertices.
#[inline]
pub(crate) fn fan_list_len(n: usize) -> usize {
    n.saturating_sub(2) * 3
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) enum CallKind {
    /// Stencil the fans, draw fringes outside, cover the bounding quad.
    Fill,
    /// Single convex path: fan and fringe drawn directly.
    ConvexFill,
    Stroke,
    Triangles,
}

#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub(crate) struct PathRange {
    pub fill_offset: u32,
    pub fill_count: u32,
    pub stroke_offset: u32,
    pub stroke_count: u32,
}

#[derive(Debug, Copy, Clone)]
pub(crate) struct DrawCall {
    pub kind: CallKind,
    pub image: Option<ImageId>,
    pub path_offset: usize,
    pub path_count: usize,
    pub triangle_offset: u32,
    pub triangle_count: u32,
    /// Index of the first fragment record used by this call.
    pub uniform_offset: usize,
    pub blend: CompositeState,
}
