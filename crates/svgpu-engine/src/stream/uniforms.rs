use bytemuck::{Pod, Zeroable};

use crate::backend::{CompositeKind, ShapeKind, UNIFORM_BYTES};
use crate::coords::Transform;

/// Fragment uniform block: 11 × vec4, uploaded verbatim.
///
/// ```text
/// [0..3)  scissor matrix (inverse scissor transform, 3 columns)
/// [3..6)  paint matrix (inverse paint transform, 3 columns)
/// [6]     inner color, premultiplied
/// [7]     outer color, premultiplied
/// [8]     scissor extent.xy, scissor scale.xy
/// [9]     extent.xy, radius, feather
/// [10]    stroke multiplier, stroke threshold, unused
/// ```
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Pod, Zeroable)]
pub struct FragUniforms {
    pub scissor_mat: [f32; 12],
    pub paint_mat: [f32; 12],
    pub inner_color: [f32; 4],
    pub outer_color: [f32; 4],
    pub scissor_extent: [f32; 2],
    pub scissor_scale: [f32; 2],
    pub extent: [f32; 2],
    pub radius: f32,
    pub feather: f32,
    pub stroke_mult: f32,
    pub stroke_threshold: f32,
    pub _pad: [f32; 2],
}

const _: () = assert!(std::mem::size_of::<FragUniforms>() == UNIFORM_BYTES);

impl FragUniforms {
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}

/// Uniforms plus the technique axes they are drawn with. The axes are
/// consumed by `update_shader` and never uploaded.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct FragRecord {
    pub uniforms: FragUniforms,
    pub shape: ShapeKind,
    pub composite: CompositeKind,
}

impl FragRecord {
    /// Record for the stencil-only pass of a fill: no paint, no scissor.
    pub fn stencil_only() -> Self {
        Self {
            uniforms: FragUniforms {
                stroke_threshold: -1.0,
                ..FragUniforms::default()
            },
            shape: ShapeKind::StencilFill,
            composite: CompositeKind::Premultiplied,
        }
    }
}

/// Clip rectangle expressed as a transform plus half extents. A negative
/// extent disables scissoring.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Scissor {
    pub xform: Transform,
    pub extent: [f32; 2],
}

impl Default for Scissor {
    fn default() -> Self {
        Self::none()
    }
}

impl Scissor {
    pub fn none() -> Self {
        Self {
            xform: Transform::identity(),
            extent: [-1.0, -1.0],
        }
    }

    /// Axis-aligned rectangle, mapped through `xform`.
    pub fn rect(x: f32, y: f32, w: f32, h: f32, xform: Transform) -> Self {
        let w = w.max(0.0);
        let h = h.max(0.0);
        Self {
            xform: Transform::translate(x + w * 0.5, y + h * 0.5).then(xform),
            extent: [w * 0.5, h * 0.5],
        }
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.extent[0] >= -0.5 && self.extent[1] >= -0.5
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_matches_constant_buffer_size() {
        let f = FragUniforms::default();
        assert_eq!(f.as_bytes().len(), 176);
    }

    #[test]
    fn field_offsets_follow_vec4_rows() {
        let f = FragUniforms {
            inner_color: [1.0, 2.0, 3.0, 4.0],
            radius: 7.0,
            stroke_mult: 9.0,
            ..FragUniforms::default()
        };
        let floats: &[f32] = bytemuck::cast_slice(f.as_bytes());
        assert_eq!(&floats[24..28], &[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(floats[9 * 4 + 2], 7.0);
        assert_eq!(floats[10 * 4], 9.0);
    }

    #[test]
    fn scissor_rect_is_centered() {
        let s = Scissor::rect(10.0, 20.0, 30.0, 40.0, Transform::identity());
        assert!(s.is_enabled());
        assert_eq!(s.extent, [15.0, 20.0]);
        assert_eq!(s.xform.m[4], 25.0);
        assert_eq!(s.xform.m[5], 40.0);
        assert!(!Scissor::none().is_enabled());
    }
}
