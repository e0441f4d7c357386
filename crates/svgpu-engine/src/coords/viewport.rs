/// Batch viewport: logical size plus the device pixel ratio.
///
/// The shader only sees the inverse logical size; the pixel ratio drives the
/// anti-aliasing fringe width and the curve flattening tolerance.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
    pub pixel_ratio: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(1.0, 1.0, 1.0)
    }
}

impl Viewport {
    #[inline]
    pub const fn new(width: f32, height: f32, pixel_ratio: f32) -> Self {
        Self { width, height, pixel_ratio }
    }

    #[inline]
    pub fn is_valid(self) -> bool {
        self.width > 0.0
            && self.height > 0.0
            && self.pixel_ratio > 0.0
            && self.width.is_finite()
            && self.height.is_finite()
            && self.pixel_ratio.is_finite()
    }

    /// Width of the anti-aliasing fringe in logical pixels.
    #[inline]
    pub fn fringe_width(self) -> f32 {
        1.0 / self.pixel_ratio
    }

    /// Maximum distance between a curve and its flattened polyline.
    #[inline]
    pub fn tessellation_tolerance(self) -> f32 {
        0.25 / self.pixel_ratio
    }
}
