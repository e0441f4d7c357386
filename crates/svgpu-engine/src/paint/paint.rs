use crate::coords::{Transform, Vec2};
use crate::paint::Color;
use crate::stream::ImageId;

/// Extent used by linear gradients along the axis that does not vary.
const LARGE: f32 = 1e5;

/// Paint applied to a fill or stroke.
///
/// All paint kinds share one representation: a transform into paint space, a
/// rounded box (`extent`, `radius`) and a feather distance over which
/// `inner_color` fades into `outer_color`. Image patterns additionally carry
/// an image id and sample it in paint space.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Paint {
    pub xform: Transform,
    pub extent: [f32; 2],
    pub radius: f32,
    pub feather: f32,
    pub inner_color: Color,
    pub outer_color: Color,
    pub image: Option<ImageId>,
}

impl Paint {
    /// Uniform color.
    pub fn solid(color: Color) -> Self {
        Self {
            xform: Transform::identity(),
            extent: [0.0, 0.0],
            radius: 0.0,
            feather: 1.0,
            inner_color: color,
            outer_color: color,
            image: None,
        }
    }

    /// Linear gradient from `start` (inner color) to `end` (outer color).
    pub fn linear_gradient(start: Vec2, end: Vec2, inner: Color, outer: Color) -> Self {
        let delta = end - start;
        let d = delta.length();
        let (dx, dy) = if d > 0.0001 {
            (delta.x / d, delta.y / d)
        } else {
            (0.0, 1.0)
        };

        Self {
            xform: Transform::from_row(
                dy,
                -dx,
                dx,
                dy,
                start.x - dx * LARGE,
                start.y - dy * LARGE,
            ),
            extent: [LARGE, LARGE + d * 0.5],
            radius: 0.0,
            feather: d.max(1.0),
            inner_color: inner,
            outer_color: outer,
            image: None,
        }
    }

    /// Radial gradient centered at `center`, fading between the two radii.
    pub fn radial_gradient(
        center: Vec2,
        inner_radius: f32,
        outer_radius: f32,
        inner: Color,
        outer: Color,
    ) -> Self {
        let r = (inner_radius + outer_radius) * 0.5;
        let f = outer_radius - inner_radius;

        Self {
            xform: Transform::translate(center.x, center.y),
            extent: [r, r],
            radius: r,
            feather: f.max(1.0),
            inner_color: inner,
            outer_color: outer,
            image: None,
        }
    }

    /// Feathered rounded rectangle, useful for drop shadows.
    pub fn box_gradient(
        origin: Vec2,
        size: Vec2,
        radius: f32,
        feather: f32,
        inner: Color,
        outer: Color,
    ) -> Self {
        Self {
            xform: Transform::translate(origin.x + size.x * 0.5, origin.y + size.y * 0.5),
            extent: [size.x * 0.5, size.y * 0.5],
            radius,
            feather: feather.max(1.0),
            inner_color: inner,
            outer_color: outer,
            image: None,
        }
    }

    /// Image repeated (or clamped) over a `size` tile whose top-left corner is
    /// at `origin`, rotated by `angle` radians around it.
    pub fn image_pattern(origin: Vec2, size: Vec2, angle: f32, image: ImageId, alpha: f32) -> Self {
        let tint = Color::white().with_alpha_scaled(alpha);
        Self {
            xform: Transform::rotate(angle).then(Transform::translate(origin.x, origin.y)),
            extent: [size.x, size.y],
            radius: 0.0,
            feather: 0.0,
            inner_color: tint,
            outer_color: tint,
            image: Some(image),
        }
    }

    /// Paint as seen through `xform` (paint space first, then `xform`).
    pub fn transformed(mut self, xform: &Transform) -> Self {
        self.xform = self.xform.then(*xform);
        self
    }

    /// Multiplies both colors' alpha by `alpha`.
    pub fn with_alpha(mut self, alpha: f32) -> Self {
        self.inner_color = self.inner_color.with_alpha_scaled(alpha);
        self.outer_color = self.outer_color.with_alpha_scaled(alpha);
        self
    }
}
