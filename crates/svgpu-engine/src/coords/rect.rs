use super::Vec2;

/// Axis-aligned rectangle in logical pixels (top-left origin).
///
/// Used as the destination box of a draw and as the scissor applied to it.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Rect {
    pub origin: Vec2,
    pub size: Vec2,
}

impl Rect {
    #[inline]
    pub const fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self {
            origin: Vec2::new(x, y),
            size: Vec2::new(w, h),
        }
    }

    #[inline]
    pub fn min(self) -> Vec2 {
        self.origin
    }

    #[inline]
    pub fn max(self) -> Vec2 {
        self.origin + self.size
    }

    #[inline]
    pub fn center(self) -> Vec2 {
        self.origin + self.size * 0.5
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.size.x <= 0.0 || self.size.y <= 0.0
    }

    #[inline]
    pub fn is_finite(self) -> bool {
        self.origin.is_finite() && self.size.is_finite()
    }

    /// Normalizes the rectangle so width/height are non-negative.
    #[inline]
    pub fn normalized(self) -> Self {
        let mut r = self;
        if r.size.x < 0.0 {
            r.origin.x += r.size.x;
            r.size.x = -r.size.x;
        }
        if r.size.y < 0.0 {
            r.origin.y += r.size.y;
            r.size.y = -r.size.y;
        }
        r
    }

    /// Smallest rectangle containing every point, or `None` for no points.
    pub fn bounding(points: impl IntoIterator<Item = Vec2>) -> Option<Rect> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let (mut lo, mut hi) = (first, first);
        for p in iter {
            lo = Vec2::new(lo.x.min(p.x), lo.y.min(p.y));
            hi = Vec2::new(hi.x.max(p.x), hi.y.max(p.y));
        }
        Some(Rect::new(lo.x, lo.y, hi.x - lo.x, hi.y - lo.y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(x: f32, y: f32, w: f32, h: f32) -> Rect {
        Rect::new(x, y, w, h)
    }

    #[test]
    fn normalized_flips_negative_extent() {
        assert_eq!(r(10.0, 10.0, -4.0, -6.0).normalized(), r(6.0, 4.0, 4.0, 6.0));
    }

    #[test]
    fn normalized_is_identity_for_positive_extent() {
        assert_eq!(r(1.0, 2.0, 3.0, 4.0).normalized(), r(1.0, 2.0, 3.0, 4.0));
    }

    #[test]
    fn center_and_max() {
        let rect = r(10.0, 20.0, 100.0, 50.0);
        assert_eq!(rect.center(), Vec2::new(60.0, 45.0));
        assert_eq!(rect.max(), Vec2::new(110.0, 70.0));
    }

    #[test]
    fn is_empty_zero_size() {
        assert!(r(0.0, 0.0, 0.0, 5.0).is_empty());
        assert!(r(0.0, 0.0, 5.0, 0.0).is_empty());
        assert!(!r(0.0, 0.0, 1.0, 1.0).is_empty());
    }

    #[test]
    fn bounding_covers_all_points() {
        let b = Rect::bounding([
            Vec2::new(3.0, -1.0),
            Vec2::new(-2.0, 4.0),
            Vec2::new(1.0, 1.0),
        ])
        .unwrap();
        assert_eq!(b, r(-2.0, -1.0, 5.0, 5.0));
    }

    #[test]
    fn bounding_of_nothing_is_none() {
        assert!(Rect::bounding(std::iter::empty()).is_none());
    }
}
