//! Path flattening and triangulation into fans and strips.
//!
//! Orientation: a *solid* loop runs counter-clockwise as seen on screen,
//! which is a negative [`signed_area`] in +Y-down coordinates. Holes run the
//! other way. Strip vertex pairs are emitted left side first, so every strip
//! triangle faces front.

use std::f32::consts::{FRAC_PI_2, PI};

use lyon_path::iterator::PathIterator;
use lyon_path::math::point;
use lyon_path::PathEvent;
use resvg::usvg::tiny_skia_path::{self, PathSegment};

use crate::backend::Vertex;
use crate::coords::{Rect, Transform, Vec2, Viewport};
use crate::stream::PathMesh;

/// Miter limit applied to fill fringes.
const FILL_MITER_LIMIT: f32 = 2.4;

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Polyline {
    pub points: Vec<Vec2>,
    pub closed: bool,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) enum FillRule {
    NonZero,
    EvenOdd,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) enum LineCap {
    Butt,
    Square,
    Round,
}

/// Flatten tolerances, both in device-independent pixels.
#[derive(Debug, Copy, Clone, PartialEq)]
pub(crate) struct Tolerance {
    /// Maximum curve-to-chord distance.
    pub tess: f32,
    /// Points closer than this are merged.
    pub dist: f32,
}

impl Tolerance {
    pub fn for_viewport(viewport: Viewport) -> Self {
        Self {
            tess: viewport.tessellation_tolerance(),
            dist: 0.01 / viewport.pixel_ratio,
        }
    }
}

// ── flattening ────────────────────────────────────────────────────────────

/// Collects flattened points into polylines, merging near-duplicates.
struct Flattener {
    tol: Tolerance,
    out: Vec<Polyline>,
    current: Polyline,
}

impl Flattener {
    fn add(&mut self, p: Vec2) {
        if let Some(&last) = self.current.points.last() {
            if last.approx_eq(p, self.tol.dist) {
                return;
            }
        }
        self.current.points.push(p);
    }

    fn finish(&mut self, closed: bool) {
        let mut poly = std::mem::take(&mut self.current);
        poly.closed = closed;
        if closed && poly.points.len() > 1 {
            let (first, last) = (poly.points[0], poly.points[poly.points.len() - 1]);
            if first.approx_eq(last, self.tol.dist) {
                poly.points.pop();
            }
        }
        if poly.points.len() >= 2 {
            self.out.push(poly);
        }
    }
}

/// Rebuilds `path` in lyon form with every point mapped through `xform`.
///
/// Affine maps commute with Bézier evaluation, so mapping control points
/// first lets the flattening tolerance apply in batch coordinates.
fn to_lyon(path: &tiny_skia_path::Path, xform: Transform) -> lyon_path::Path {
    let map = |p: tiny_skia_path::Point| {
        let v = xform.apply(Vec2::new(p.x, p.y));
        point(v.x, v.y)
    };
    let mut builder = lyon_path::Path::builder();
    let mut open = false;
    let mut start = point(0.0, 0.0);

    for seg in path.segments() {
        match seg {
            PathSegment::MoveTo(p) => {
                if open {
                    builder.end(false);
                }
                start = map(p);
                builder.begin(start);
                open = true;
                continue;
            }
            PathSegment::Close => {
                if open {
                    builder.end(true);
                    open = false;
                }
                continue;
            }
            _ => {}
        }
        // A segment after `Close` starts at the subpath origin.
        if !open {
            builder.begin(start);
            open = true;
        }
        match seg {
            PathSegment::LineTo(p) => {
                builder.line_to(map(p));
            }
            PathSegment::QuadTo(c, p) => {
                builder.quadratic_bezier_to(map(c), map(p));
            }
            PathSegment::CubicTo(c1, c2, p) => {
                builder.cubic_bezier_to(map(c1), map(c2), map(p));
            }
            PathSegment::MoveTo(_) | PathSegment::Close => {}
        }
    }
    if open {
        builder.end(false);
    }
    builder.build()
}

/// Maps `path` through `xform` and flattens its curves into polylines.
pub(crate) fn flatten(path: &tiny_skia_path::Path, xform: Transform, tol: Tolerance) -> Vec<Polyline> {
    let mut f = Flattener {
        tol,
        out: Vec::new(),
        current: Polyline::default(),
    };
    let vec = |p: lyon_path::math::Point| Vec2::new(p.x, p.y);

    for event in to_lyon(path, xform).iter().flattened(tol.tess) {
        match event {
            PathEvent::Begin { at } => f.add(vec(at)),
            PathEvent::Line { to, .. } => f.add(vec(to)),
            // Not produced by `flattened`; kept as a chord.
            PathEvent::Quadratic { to, .. } | PathEvent::Cubic { to, .. } => f.add(vec(to)),
            PathEvent::End { close, .. } => f.finish(close),
        }
    }
    f.finish(false);
    f.out
}

// ── geometry helpers ──────────────────────────────────────────────────────

/// Twice the signed area; negative for loops that are solid on screen.
pub(crate) fn signed_area(points: &[Vec2]) -> f32 {
    let n = points.len();
    (0..n).map(|i| points[i].cross(points[(i + 1) % n])).sum()
}

pub(crate) fn is_convex(points: &[Vec2]) -> bool {
    let n = points.len();
    if n < 3 {
        return false;
    }
    let (mut pos, mut neg) = (false, false);
    for i in 0..n {
        let a = points[i];
        let b = points[(i + 1) % n];
        let c = points[(i + 2) % n];
        let turn = (b - a).cross(c - b);
        if turn > 1e-6 {
            pos = true;
        } else if turn < -1e-6 {
            neg = true;
        }
    }
    !(pos && neg)
}

/// Parameter along `p2 -> p3` where it meets the line `p0 -> p1`, or NaN
/// for parallel or degenerate lines.
fn line_crossing(p0: Vec2, p1: Vec2, p2: Vec2, p3: Vec2) -> f32 {
    let b = p2 - p0;
    let d = p1 - p0;
    let e = p3 - p2;
    let m = d.cross(e);
    if m.abs() < 1e-6 {
        return f32::NAN;
    }
    -d.cross(b) / m
}

/// Even-odd classification: a ray from the loop's first point past its
/// bounding box crosses the other loops an even number of times for solids.
fn is_hole(loops: &[Vec<Vec2>], index: usize) -> bool {
    let pts = &loops[index];
    let Some(bounds) = Rect::bounding(pts.iter().copied()) else {
        return false;
    };
    let p0 = pts[0];
    let p1 = bounds.min() - Vec2::new(1.0, 1.0);

    let mut crossings = 0usize;
    for (j, other) in loops.iter().enumerate() {
        if j == index || other.len() < 2 {
            continue;
        }
        let n = other.len();
        for k in 0..n {
            let (a, b) = (other[k], other[(k + 1) % n]);
            let along_segment = line_crossing(p0, p1, a, b);
            let along_ray = line_crossing(a, b, p0, p1);
            if (0.0..1.0).contains(&along_segment) && along_ray >= 0.0 {
                crossings += 1;
            }
        }
    }
    crossings % 2 == 1
}

/// Direction to offset vertex `i` by, scaled so edges move by one unit.
fn miter_normal(points: &[Vec2], i: usize, closed: bool, limit: f32) -> Vec2 {
    let n = points.len();
    let prev = if i > 0 {
        Some(points[i - 1])
    } else if closed {
        Some(points[n - 1])
    } else {
        None
    };
    let next = if i + 1 < n {
        Some(points[i + 1])
    } else if closed {
        Some(points[0])
    } else {
        None
    };
    let p = points[i];
    let n_in = prev.map(|a| (p - a).normalize_or_zero().perp());
    let n_out = next.map(|b| (b - p).normalize_or_zero().perp());

    match (n_in, n_out) {
        (Some(a), Some(b)) => {
            let avg = (a + b) * 0.5;
            let d2 = avg.dot(avg);
            if d2 < 1e-6 {
                return b;
            }
            avg * (1.0 / d2).min(limit * limit)
        }
        (Some(a), None) => a,
        (None, Some(b)) => b,
        (None, None) => Vec2::zero(),
    }
}

fn vertex(p: Vec2, u: f32) -> Vertex {
    Vertex::new(p.x, p.y, u, 1.0)
}

// ── fills ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct FillGeometry {
    pub paths: Vec<PathMesh>,
    pub bounds: Rect,
}

/// Fans plus (with `fringe`) anti-aliasing strips along the outside edge.
pub(crate) fn fill(polys: &[Polyline], rule: FillRule, fringe: Option<f32>) -> Option<FillGeometry> {
    let mut loops: Vec<Vec<Vec2>> = polys
        .iter()
        .filter(|p| p.points.len() >= 3)
        .map(|p| p.points.clone())
        .collect();
    if loops.is_empty() {
        return None;
    }

    let convex = loops.len() == 1 && is_convex(&loops[0]);
    if convex {
        orient(&mut loops[0], true);
    } else if rule == FillRule::EvenOdd {
        let holes: Vec<bool> = (0..loops.len()).map(|i| is_hole(&loops, i)).collect();
        for (pts, hole) in loops.iter_mut().zip(holes) {
            orient(pts, !hole);
        }
    }

    let bounds = Rect::bounding(loops.iter().flatten().copied())?;
    let paths = loops
        .iter()
        .map(|pts| PathMesh {
            fill: pts.iter().map(|&p| Vertex::new(p.x, p.y, 0.5, 1.0)).collect(),
            stroke: fringe.map(|f| fringe_strip(pts, f)).unwrap_or_default(),
            convex,
        })
        .collect();
    Some(FillGeometry { paths, bounds })
}

fn orient(points: &mut [Vec2], solid: bool) {
    let area = signed_area(points);
    if (solid && area > 0.0) || (!solid && area < 0.0) {
        points.reverse();
    }
}

/// One fringe width outwards from the loop, opaque on the loop itself.
fn fringe_strip(points: &[Vec2], fringe: f32) -> Vec<Vertex> {
    let mut out = Vec::with_capacity((points.len() + 1) * 2);
    for i in 0..points.len() {
        let dm = miter_normal(points, i, true, FILL_MITER_LIMIT);
        out.push(vertex(points[i], 0.5));
        out.push(vertex(points[i] - dm * fringe, 0.0));
    }
    out.push(out[0]);
    out.push(out[1]);
    out
}

// ── strokes ───────────────────────────────────────────────────────────────

#[derive(Debug, Copy, Clone, PartialEq)]
pub(crate) struct StrokeStyle {
    /// Full width in device-independent pixels, after transformation.
    pub width: f32,
    pub cap: LineCap,
    pub miter_limit: f32,
}

/// One strip per polyline; `u` runs 0 → 1 across the stroke.
pub(crate) fn stroke(
    polys: &[Polyline],
    style: StrokeStyle,
    fringe: Option<f32>,
    tess_tol: f32,
) -> Vec<PathMesh> {
    let half = style.width * 0.5;
    let hw = half + fringe.map_or(0.0, |f| f * 0.5);

    polys
        .iter()
        .filter(|p| p.points.len() >= 2)
        .map(|poly| {
            let closed = poly.closed && poly.points.len() >= 3;
            let strip = if closed {
                closed_stroke(&poly.points, hw, style.miter_limit)
            } else {
                open_stroke(&poly.points, hw, half, style, tess_tol)
            };
            PathMesh {
                fill: Vec::new(),
                stroke: strip,
                convex: false,
            }
        })
        .collect()
}

fn push_pair(out: &mut Vec<Vertex>, p: Vec2, dm: Vec2, hw: f32) {
    out.push(vertex(p + dm * hw, 0.0));
    out.push(vertex(p - dm * hw, 1.0));
}

fn closed_stroke(points: &[Vec2], hw: f32, miter_limit: f32) -> Vec<Vertex> {
    let mut out = Vec::with_capacity((points.len() + 1) * 2);
    for i in 0..points.len() {
        push_pair(&mut out, points[i], miter_normal(points, i, true, miter_limit), hw);
    }
    out.push(out[0]);
    out.push(out[1]);
    out
}

fn open_stroke(points: &[Vec2], hw: f32, half: f32, style: StrokeStyle, tess_tol: f32) -> Vec<Vertex> {
    let mut pts = points.to_vec();
    let n = pts.len();
    let d_start = (pts[1] - pts[0]).normalize_or_zero();
    let d_end = (pts[n - 1] - pts[n - 2]).normalize_or_zero();
    if style.cap == LineCap::Square {
        pts[0] = pts[0] - d_start * half;
        pts[n - 1] = pts[n - 1] + d_end * half;
    }

    let cap_slices = if style.cap == LineCap::Round {
        round_cap_divisions(hw, tess_tol)
    } else {
        0
    };
    let mut out = Vec::with_capacity((n + 2 * cap_slices) * 2);

    // Round caps are lens-shaped runs of pairs narrowing to the tip.
    let normal = d_start.perp();
    for k in 0..cap_slices {
        let phi = k as f32 / cap_slices as f32 * FRAC_PI_2;
        let c = pts[0] - d_start * (hw * phi.cos());
        push_pair(&mut out, c, normal, hw * phi.sin());
    }
    for i in 0..n {
        push_pair(&mut out, pts[i], miter_normal(&pts, i, false, style.miter_limit), hw);
    }
    let normal = d_end.perp();
    for k in (0..cap_slices).rev() {
        let phi = k as f32 / cap_slices as f32 * FRAC_PI_2;
        let c = pts[n - 1] + d_end * (hw * phi.cos());
        push_pair(&mut out, c, normal, hw * phi.sin());
    }
    out
}

/// Slices for a quarter turn at radius `r` within `tol`.
fn round_cap_divisions(r: f32, tol: f32) -> usize {
    let da = (r / (r + tol)).acos() * 2.0;
    if da <= 0.0 || !da.is_finite() {
        return 2;
    }
    ((PI * 0.5 / da).ceil() as usize).clamp(2, 32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(x: f32, y: f32) -> Vec2 {
        Vec2::new(x, y)
    }

    fn closed(points: &[(f32, f32)]) -> Polyline {
        Polyline {
            points: points.iter().map(|&(x, y)| v(x, y)).collect(),
            closed: true,
        }
    }

    fn pos(vx: &Vertex) -> Vec2 {
        v(vx.pos[0], vx.pos[1])
    }

    /// Strip triangles alternate vertex order; undo that and check facing.
    fn strip_faces_front(strip: &[Vertex]) -> bool {
        strip.windows(3).enumerate().all(|(k, w)| {
            let (a, b, c) = if k % 2 == 0 {
                (pos(&w[0]), pos(&w[1]), pos(&w[2]))
            } else {
                (pos(&w[1]), pos(&w[0]), pos(&w[2]))
            };
            (b - a).cross(c - a) <= 1e-4
        })
    }

    const TOL: Tolerance = Tolerance {
        tess: 0.25,
        dist: 0.01,
    };

    #[test]
    fn rectangle_flattens_to_one_closed_loop() {
        let rect = tiny_skia_path::Rect::from_xywh(10.0, 20.0, 30.0, 40.0).unwrap();
        let path = tiny_skia_path::PathBuilder::from_rect(rect);
        let polys = flatten(&path, Transform::translate(1.0, 2.0), TOL);
        assert_eq!(polys.len(), 1);
        assert!(polys[0].closed);
        assert_eq!(polys[0].points.len(), 4);
        assert_eq!(polys[0].points[0], v(11.0, 22.0));
    }

    #[test]
    fn curves_end_on_their_endpoint() {
        let mut pb = tiny_skia_path::PathBuilder::new();
        pb.move_to(0.0, 0.0);
        pb.cubic_to(0.0, 50.0, 100.0, 50.0, 100.0, 0.0);
        let path = pb.finish().unwrap();
        let polys = flatten(&path, Transform::identity(), TOL);
        let pts = &polys[0].points;
        assert!(pts.len() > 6);
        assert_eq!(*pts.last().unwrap(), v(100.0, 0.0));
        assert!(!polys[0].closed);
        // Curve peak is 37.5 below the chord.
        let peak = pts.iter().map(|p| p.y).fold(0.0, f32::max);
        assert!((peak - 37.5).abs() < 0.5);
    }

    #[test]
    fn flattened_quadratic_stays_within_tolerance() {
        let mut pb = tiny_skia_path::PathBuilder::new();
        pb.move_to(0.0, 0.0);
        pb.quad_to(50.0, 100.0, 100.0, 0.0);
        let path = pb.finish().unwrap();
        // Scaled 2x: the tolerance applies after the transform.
        let polys = flatten(&path, Transform::scale(2.0, 2.0), TOL);
        let pts = &polys[0].points;
        assert_eq!(pts[0], v(0.0, 0.0));
        assert_eq!(*pts.last().unwrap(), v(200.0, 0.0));

        // Chord midpoints stay near the parabola y = x (2 - x / 100). The
        // slope never exceeds 2, so vertical error is at most sqrt(5) times
        // the distance.
        let curve_y = |x: f32| x * (2.0 - x / 100.0);
        for w in pts.windows(2) {
            let mid = (w[0] + w[1]) * 0.5;
            assert!((curve_y(mid.x) - mid.y).abs() <= TOL.tess * 2.3, "{mid:?}");
        }
    }

    #[test]
    fn segment_after_close_restarts_at_origin() {
        let mut pb = tiny_skia_path::PathBuilder::new();
        pb.move_to(0.0, 0.0);
        pb.line_to(10.0, 0.0);
        pb.line_to(10.0, 10.0);
        pb.close();
        pb.line_to(0.0, 20.0);
        let path = pb.finish().unwrap();
        let polys = flatten(&path, Transform::identity(), TOL);
        assert_eq!(polys.len(), 2);
        assert!(polys[0].closed);
        assert_eq!(polys[0].points.len(), 3);
        assert!(!polys[1].closed);
        assert_eq!(polys[1].points, vec![v(0.0, 0.0), v(0.0, 20.0)]);
    }

    #[test]
    fn convex_fill_is_reoriented_to_solid() {
        // Clockwise on screen: a hole until reoriented.
        let square = closed(&[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)]);
        assert!(signed_area(&square.points) > 0.0);

        let g = fill(&[square], FillRule::NonZero, None).unwrap();
        assert_eq!(g.paths.len(), 1);
        assert!(g.paths[0].convex);
        let pts: Vec<Vec2> = g.paths[0].fill.iter().map(pos).collect();
        assert!(signed_area(&pts) < 0.0);
        assert!(g.paths[0].stroke.is_empty());
        assert_eq!(g.bounds, Rect::new(0.0, 0.0, 10.0, 10.0));
    }

    #[test]
    fn fringe_runs_outside_and_closes() {
        let square = closed(&[(0.0, 0.0), (0.0, 10.0), (10.0, 10.0), (10.0, 0.0)]);
        let g = fill(&[square], FillRule::NonZero, Some(1.0)).unwrap();
        let strip = &g.paths[0].stroke;
        assert_eq!(strip.len(), 10);
        assert_eq!(strip[8], strip[0]);
        assert_eq!(strip[1].uv, [0.0, 1.0]);
        assert_eq!(strip[0].uv, [0.5, 1.0]);
        // Corner (0, 0) moves diagonally outwards by a miter.
        assert!(pos(&strip[1]).approx_eq(v(-1.0, -1.0), 1e-4));
        assert!(strip_faces_front(strip));
    }

    #[test]
    fn even_odd_marks_inner_loop_as_hole() {
        let outer = closed(&[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)]);
        let inner = closed(&[(3.0, 3.0), (3.0, 7.0), (7.0, 7.0), (7.0, 3.0)]);
        let g = fill(&[outer, inner], FillRule::EvenOdd, None).unwrap();
        let area = |m: &PathMesh| signed_area(&m.fill.iter().map(pos).collect::<Vec<_>>());
        assert!(area(&g.paths[0]) < 0.0);
        assert!(area(&g.paths[1]) > 0.0);
        assert!(!g.paths[0].convex);
    }

    #[test]
    fn non_zero_keeps_source_winding() {
        let a = closed(&[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)]);
        let b = closed(&[(3.0, 3.0), (7.0, 3.0), (7.0, 7.0), (3.0, 7.0)]);
        let g = fill(&[a.clone(), b.clone()], FillRule::NonZero, None).unwrap();
        assert_eq!(pos(&g.paths[0].fill[1]), a.points[1]);
        assert_eq!(pos(&g.paths[1].fill[1]), b.points[1]);
    }

    #[test]
    fn degenerate_fills_produce_nothing() {
        let line = Polyline {
            points: vec![v(0.0, 0.0), v(1.0, 1.0)],
            closed: true,
        };
        assert!(fill(&[line], FillRule::NonZero, Some(1.0)).is_none());
    }

    #[test]
    fn open_stroke_spans_half_width_plus_half_fringe() {
        let line = Polyline {
            points: vec![v(0.0, 0.0), v(10.0, 0.0)],
            closed: false,
        };
        let style = StrokeStyle {
            width: 4.0,
            cap: LineCap::Butt,
            miter_limit: 4.0,
        };
        let meshes = stroke(&[line], style, Some(1.0), 0.25);
        let s = &meshes[0].stroke;
        assert_eq!(s.len(), 4);
        assert!(pos(&s[0]).approx_eq(v(0.0, -2.5), 1e-5));
        assert!(pos(&s[1]).approx_eq(v(0.0, 2.5), 1e-5));
        assert_eq!((s[0].uv[0], s[1].uv[0]), (0.0, 1.0));
        assert!(strip_faces_front(s));
    }

    #[test]
    fn square_caps_extend_by_half_width() {
        let line = Polyline {
            points: vec![v(0.0, 0.0), v(10.0, 0.0)],
            closed: false,
        };
        let style = StrokeStyle {
            width: 4.0,
            cap: LineCap::Square,
            miter_limit: 4.0,
        };
        let s = &stroke(&[line], style, None, 0.25)[0].stroke;
        assert!(pos(&s[0]).approx_eq(v(-2.0, -2.0), 1e-5));
        assert!(pos(&s[3]).approx_eq(v(12.0, 2.0), 1e-5));
    }

    #[test]
    fn round_caps_face_front() {
        let line = Polyline {
            points: vec![v(0.0, 0.0), v(10.0, 5.0), v(20.0, 0.0)],
            closed: false,
        };
        let style = StrokeStyle {
            width: 6.0,
            cap: LineCap::Round,
            miter_limit: 4.0,
        };
        let s = &stroke(&[line], style, Some(1.0), 0.25)[0].stroke;
        assert!(s.len() > 6);
        assert!(strip_faces_front(s));
        // The tip sits one radius before the start point.
        assert!(pos(&s[0]).approx_eq(pos(&s[1]), 1e-4));
    }

    #[test]
    fn closed_stroke_repeats_first_pair() {
        let tri = closed(&[(0.0, 0.0), (10.0, 0.0), (5.0, 8.0)]);
        let style = StrokeStyle {
            width: 2.0,
            cap: LineCap::Butt,
            miter_limit: 10.0,
        };
        let s = &stroke(&[tri], style, None, 0.25)[0].stroke;
        assert_eq!(s.len(), 8);
        assert_eq!(s[6], s[0]);
        assert_eq!(s[7], s[1]);
    }

    #[test]
    fn convexity() {
        assert!(is_convex(&[v(0.0, 0.0), v(4.0, 0.0), v(4.0, 4.0), v(0.0, 4.0)]));
        assert!(!is_convex(&[
            v(0.0, 0.0),
            v(4.0, 0.0),
            v(2.0, 1.0),
            v(4.0, 4.0),
            v(0.0, 4.0)
        ]));
    }
}
