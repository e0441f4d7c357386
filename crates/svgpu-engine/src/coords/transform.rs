use super::Vec2;

/// 2D affine transform stored as `[a, b, c, d, e, f]`:
///
/// ```text
/// x' = a*x + c*y + e
/// y' = b*x + d*y + f
/// ```
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Transform {
    pub m: [f32; 6],
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

impl Transform {
    #[inline]
    pub const fn identity() -> Self {
        Self { m: [1.0, 0.0, 0.0, 1.0, 0.0, 0.0] }
    }

    #[inline]
    pub const fn from_row(a: f32, b: f32, c: f32, d: f32, e: f32, f: f32) -> Self {
        Self { m: [a, b, c, d, e, f] }
    }

    #[inline]
    pub const fn translate(tx: f32, ty: f32) -> Self {
        Self { m: [1.0, 0.0, 0.0, 1.0, tx, ty] }
    }

    #[inline]
    pub const fn scale(sx: f32, sy: f32) -> Self {
        Self { m: [sx, 0.0, 0.0, sy, 0.0, 0.0] }
    }

    pub fn rotate(angle: f32) -> Self {
        let (sn, cs) = angle.sin_cos();
        Self { m: [cs, sn, -sn, cs, 0.0, 0.0] }
    }

    /// Returns the transform that applies `self` first, then `next`.
    pub fn then(self, next: Transform) -> Transform {
        let t = self.m;
        let s = next.m;
        Transform {
            m: [
                t[0] * s[0] + t[1] * s[2],
                t[0] * s[1] + t[1] * s[3],
                t[2] * s[0] + t[3] * s[2],
                t[2] * s[1] + t[3] * s[3],
                t[4] * s[0] + t[5] * s[2] + s[4],
                t[4] * s[1] + t[5] * s[3] + s[5],
            ],
        }
    }

    /// Inverse transform; singular transforms invert to identity.
    pub fn inverse(self) -> Transform {
        let t = self.m;
        let det = t[0] as f64 * t[3] as f64 - t[2] as f64 * t[1] as f64;
        if det.abs() < 1e-6 {
            return Transform::identity();
        }
        let inv = 1.0 / det;
        let t: [f64; 6] = t.map(f64::from);
        Transform {
            m: [
                (t[3] * inv) as f32,
                (-t[1] * inv) as f32,
                (-t[2] * inv) as f32,
                (t[0] * inv) as f32,
                ((t[2] * t[5] - t[3] * t[4]) * inv) as f32,
                ((t[1] * t[4] - t[0] * t[5]) * inv) as f32,
            ],
        }
    }

    #[inline]
    pub fn apply(self, p: Vec2) -> Vec2 {
        let t = self.m;
        Vec2::new(
            p.x * t[0] + p.y * t[2] + t[4],
            p.x * t[1] + p.y * t[3] + t[5],
        )
    }

    /// Mean of the horizontal and vertical scale factors.
    pub fn average_scale(self) -> f32 {
        let t = self.m;
        let sx = (t[0] * t[0] + t[2] * t[2]).sqrt();
        let sy = (t[1] * t[1] + t[3] * t[3]).sqrt();
        (sx + sy) * 0.5
    }

    /// Column-major 3x4 layout expected by the fragment uniform block
    /// (three `vec4` columns, the last one carrying the translation).
    pub fn to_mat3x4(self) -> [f32; 12] {
        let t = self.m;
        [
            t[0], t[1], 0.0, 0.0, //
            t[2], t[3], 0.0, 0.0, //
            t[4], t[5], 1.0, 0.0,
        ]
    }
}
