//! Memoized pipeline-state objects.
//!
//! Blend and depth-stencil configurations are bit-packed into 32-bit keys;
//! equal keys share one cached object for the lifetime of the device context.
//! Nothing is ever evicted.

use std::collections::HashMap;
use std::hash::Hash;
use std::rc::Rc;

use crate::backend::{BlendFactor, CompositeState, StencilConfig, StencilFaceOps, StencilOp};

/// Depth/stencil attachment format used by every pass.
pub(crate) const STENCIL_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24PlusStencil8;

/// Hit/miss counters of one cache.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: u64,
}

/// Insert-only map from a packed key to a shared state object.
#[derive(Debug)]
pub(crate) struct StateCache<K, V> {
    map: HashMap<K, Rc<V>>,
    hits: u64,
    misses: u64,
}

impl<K, V> Default for StateCache<K, V> {
    fn default() -> Self {
        Self {
            map: HashMap::new(),
            hits: 0,
            misses: 0,
        }
    }
}

impl<K: Copy + Eq + Hash, V> StateCache<K, V> {
    pub fn get_or_create(&mut self, key: K, create: impl FnOnce() -> V) -> Rc<V> {
        if let Some(v) = self.map.get(&key) {
            self.hits += 1;
            return Rc::clone(v);
        }
        self.misses += 1;
        let v = Rc::new(create());
        self.map.insert(key, Rc::clone(&v));
        v
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            entries: self.map.len() as u64,
        }
    }
}

// ── blend ─────────────────────────────────────────────────────────────────

/// `src_rgb | src_alpha << 4 | dst_rgb << 8 | dst_alpha << 12 | color_write << 16`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub(crate) struct BlendKey(pub u32);

impl BlendKey {
    pub fn pack(state: CompositeState, color_write: bool) -> Self {
        BlendKey(
            (state.src_rgb as u32)
                | (state.src_alpha as u32) << 4
                | (state.dst_rgb as u32) << 8
                | (state.dst_alpha as u32) << 12
                | (color_write as u32) << 16,
        )
    }
}

/// Realized blend configuration.
#[derive(Debug, Copy, Clone, PartialEq)]
pub(crate) struct BlendDesc {
    pub blend: wgpu::BlendState,
    pub write_mask: wgpu::ColorWrites,
}

impl BlendDesc {
    pub fn new(state: CompositeState, color_write: bool) -> Self {
        let component = |src, dst| wgpu::BlendComponent {
            src_factor: blend_factor(src),
            dst_factor: blend_factor(dst),
            operation: wgpu::BlendOperation::Add,
        };
        Self {
            blend: wgpu::BlendState {
                color: component(state.src_rgb, state.dst_rgb),
                alpha: component(state.src_alpha, state.dst_alpha),
            },
            write_mask: if color_write {
                wgpu::ColorWrites::ALL
            } else {
                wgpu::ColorWrites::empty()
            },
        }
    }
}

fn blend_factor(f: BlendFactor) -> wgpu::BlendFactor {
    match f {
        BlendFactor::Zero => wgpu::BlendFactor::Zero,
        BlendFactor::One => wgpu::BlendFactor::One,
        BlendFactor::SrcColor => wgpu::BlendFactor::Src,
        BlendFactor::OneMinusSrcColor => wgpu::BlendFactor::OneMinusSrc,
        BlendFactor::DstColor => wgpu::BlendFactor::Dst,
        BlendFactor::OneMinusDstColor => wgpu::BlendFactor::OneMinusDst,
        BlendFactor::SrcAlpha => wgpu::BlendFactor::SrcAlpha,
        BlendFactor::OneMinusSrcAlpha => wgpu::BlendFactor::OneMinusSrcAlpha,
        BlendFactor::DstAlpha => wgpu::BlendFactor::DstAlpha,
        BlendFactor::OneMinusDstAlpha => wgpu::BlendFactor::OneMinusDstAlpha,
        BlendFactor::SrcAlphaSaturate => wgpu::BlendFactor::SrcAlphaSaturated,
    }
}

// ── stencil ───────────────────────────────────────────────────────────────

/// Seven 3-bit fields: func, cw fail/depth-fail/pass, ccw fail/depth-fail/pass.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub(crate) struct StencilKey(pub u32);

impl StencilKey {
    pub fn pack(config: StencilConfig) -> Self {
        let fields = [
            config.func as u32,
            config.cw.fail as u32,
            config.cw.depth_fail as u32,
            config.cw.pass as u32,
            config.ccw.fail as u32,
            config.ccw.depth_fail as u32,
            config.ccw.pass as u32,
        ];
        let mut key = 0;
        for (i, f) in fields.into_iter().enumerate() {
            debug_assert!(f < 8, "stencil field {i} does not fit in 3 bits");
            key |= f << (3 * i);
        }
        StencilKey(key)
    }
}

/// Two-sided stencil, depth test off, masks 0xFF, reference 0 (set per pass).
///
/// Front faces are counter-clockwise on screen and take the `ccw` ops.
pub(crate) fn stencil_state(config: StencilConfig) -> wgpu::DepthStencilState {
    let compare = compare_function(config.func);
    let face = |ops: StencilFaceOps| wgpu::StencilFaceState {
        compare,
        fail_op: stencil_op(ops.fail),
        depth_fail_op: stencil_op(ops.depth_fail),
        pass_op: stencil_op(ops.pass),
    };
    wgpu::DepthStencilState {
        format: STENCIL_FORMAT,
        depth_write_enabled: false,
        depth_compare: wgpu::CompareFunction::Always,
        stencil: wgpu::StencilState {
            front: face(config.ccw),
            back: face(config.cw),
            read_mask: 0xFF,
            write_mask: 0xFF,
        },
        bias: wgpu::DepthBiasState::default(),
    }
}

/// The shared "stencil off" state: no depth test, no stencil test or writes.
pub(crate) fn stencil_disabled() -> wgpu::DepthStencilState {
    wgpu::DepthStencilState {
        format: STENCIL_FORMAT,
        depth_write_enabled: false,
        depth_compare: wgpu::CompareFunction::Always,
        stencil: wgpu::StencilState::default(),
        bias: wgpu::DepthBiasState::default(),
    }
}

fn compare_function(f: crate::backend::StencilFunc) -> wgpu::CompareFunction {
    use crate::backend::StencilFunc;
    match f {
        StencilFunc::Always => wgpu::CompareFunction::Always,
        StencilFunc::Never => wgpu::CompareFunction::Never,
        StencilFunc::Less => wgpu::CompareFunction::Less,
        StencilFunc::LessEqual => wgpu::CompareFunction::LessEqual,
        StencilFunc::Equal => wgpu::CompareFunction::Equal,
        StencilFunc::GreaterEqual => wgpu::CompareFunction::GreaterEqual,
        StencilFunc::Greater => wgpu::CompareFunction::Greater,
        StencilFunc::NotEqual => wgpu::CompareFunction::NotEqual,
    }
}

fn stencil_op(op: StencilOp) -> wgpu::StencilOperation {
    match op {
        StencilOp::Keep => wgpu::StencilOperation::Keep,
        StencilOp::Zero => wgpu::StencilOperation::Zero,
        StencilOp::Replace => wgpu::StencilOperation::Replace,
        StencilOp::Increment => wgpu::StencilOperation::IncrementWrap,
        StencilOp::Decrement => wgpu::StencilOperation::DecrementWrap,
        StencilOp::IncrementSaturate => wgpu::StencilOperation::IncrementClamp,
        StencilOp::DecrementSaturate => wgpu::StencilOperation::DecrementClamp,
        StencilOp::Invert => wgpu::StencilOperation::Invert,
    }
}
