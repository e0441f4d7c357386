use std::num::NonZeroU64;

use bytemuck::{Pod, Zeroable};

// ── handles ───────────────────────────────────────────────────────────────

/// Opaque identifier of a GPU-side resource handed across the bridge.
///
/// Zero is never issued. Vertex buffers always use [`Handle::VERTEX_BUFFER`];
/// textures get fresh values from a [`HandleAllocator`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct Handle(NonZeroU64);

impl Handle {
    /// The single live vertex buffer.
    pub const VERTEX_BUFFER: Handle = Handle(NonZeroU64::MIN);

    #[inline]
    pub fn new(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(Handle)
    }

    #[inline]
    pub fn get(self) -> u64 {
        self.0.get()
    }
}

impl std::fmt::Display for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Monotonic handle source starting at 1. Freed values are never reissued.
#[derive(Debug)]
pub struct HandleAllocator {
    next: NonZeroU64,
}

impl Default for HandleAllocator {
    fn default() -> Self {
        Self { next: NonZeroU64::MIN }
    }
}

impl HandleAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self) -> Handle {
        let h = Handle(self.next);
        // Wrapping past u64::MAX is not a supported scenario.
        self.next = self.next.saturating_add(1);
        h
    }
}

// ── vertices / uniforms ───────────────────────────────────────────────────

/// Interleaved position + texture coordinate, 16 bytes, no padding.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub pos: [f32; 2],
    pub uv: [f32; 2],
}

impl Vertex {
    pub const STRIDE: usize = std::mem::size_of::<Vertex>();

    #[inline]
    pub const fn new(x: f32, y: f32, u: f32, v: f32) -> Self {
        Self { pos: [x, y], uv: [u, v] }
    }
}

/// Size of the fragment constant-buffer region (11 × vec4<f32>).
pub const UNIFORM_BYTES: usize = 11 * 16;

// ── blend ─────────────────────────────────────────────────────────────────

/// The 11 standard blend factors. Discriminants fit in 4 bits.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
#[repr(u8)]
pub enum BlendFactor {
    Zero = 0,
    One = 1,
    SrcColor = 2,
    OneMinusSrcColor = 3,
    DstColor = 4,
    OneMinusDstColor = 5,
    SrcAlpha = 6,
    OneMinusSrcAlpha = 7,
    DstAlpha = 8,
    OneMinusDstAlpha = 9,
    SrcAlphaSaturate = 10,
}

/// Separate RGB/alpha blend factors for one draw call.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct CompositeState {
    pub src_rgb: BlendFactor,
    pub dst_rgb: BlendFactor,
    pub src_alpha: BlendFactor,
    pub dst_alpha: BlendFactor,
}

impl CompositeState {
    /// Same factors for color and alpha.
    pub const fn uniform(src: BlendFactor, dst: BlendFactor) -> Self {
        Self {
            src_rgb: src,
            dst_rgb: dst,
            src_alpha: src,
            dst_alpha: dst,
        }
    }

    /// Blending disabled: the source replaces the destination.
    pub const fn opaque() -> Self {
        Self::uniform(BlendFactor::One, BlendFactor::Zero)
    }
}

impl Default for CompositeState {
    fn default() -> Self {
        Self::opaque()
    }
}

// ── stencil ───────────────────────────────────────────────────────────────

/// Stencil comparison against reference value 0. Discriminants fit in 3 bits.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
#[repr(u8)]
pub enum StencilFunc {
    #[default]
    Always = 0,
    Never = 1,
    Less = 2,
    LessEqual = 3,
    Equal = 4,
    GreaterEqual = 5,
    Greater = 6,
    NotEqual = 7,
}

/// Stencil update operation. Discriminants fit in 3 bits.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
#[repr(u8)]
pub enum StencilOp {
    #[default]
    Keep = 0,
    Zero = 1,
    Replace = 2,
    /// Increment, wrapping to 0.
    Increment = 3,
    /// Decrement, wrapping to the maximum.
    Decrement = 4,
    /// Increment, clamped at the maximum.
    IncrementSaturate = 5,
    /// Decrement, clamped at 0.
    DecrementSaturate = 6,
    Invert = 7,
}

/// Operations applied to one face orientation.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub struct StencilFaceOps {
    pub fail: StencilOp,
    pub depth_fail: StencilOp,
    pub pass: StencilOp,
}

impl StencilFaceOps {
    pub const fn new(fail: StencilOp, depth_fail: StencilOp, pass: StencilOp) -> Self {
        Self { fail, depth_fail, pass }
    }

    /// `op` in all three slots.
    pub const fn all(op: StencilOp) -> Self {
        Self::new(op, op, op)
    }

    /// `Keep` on failure, `op` on pass.
    pub const fn on_pass(op: StencilOp) -> Self {
        Self::new(StencilOp::Keep, StencilOp::Keep, op)
    }
}

/// Two-sided stencil configuration, selected by the on-screen winding of each triangle.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub struct StencilConfig {
    pub func: StencilFunc,
    pub cw: StencilFaceOps,
    pub ccw: StencilFaceOps,
}

impl StencilConfig {
    pub const fn new(func: StencilFunc, cw: StencilFaceOps, ccw: StencilFaceOps) -> Self {
        Self { func, cw, ccw }
    }

    /// Same ops on both faces.
    pub const fn symmetric(func: StencilFunc, ops: StencilFaceOps) -> Self {
        Self::new(func, ops, ops)
    }
}

// ── techniques ────────────────────────────────────────────────────────────

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum AaMode {
    EdgeAa,
    NoAa,
}

impl AaMode {
    pub const ALL: [AaMode; 2] = [AaMode::EdgeAa, AaMode::NoAa];

    #[inline]
    pub fn from_enabled(antialias: bool) -> Self {
        if antialias { AaMode::EdgeAa } else { AaMode::NoAa }
    }

    fn name(self) -> &'static str {
        match self {
            AaMode::EdgeAa => "EdgeAA",
            AaMode::NoAa => "NoAA",
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ShapeKind {
    Gradient,
    Image,
    StencilFill,
    Triangles,
}

impl ShapeKind {
    pub const ALL: [ShapeKind; 4] = [
        ShapeKind::Gradient,
        ShapeKind::Image,
        ShapeKind::StencilFill,
        ShapeKind::Triangles,
    ];

    fn name(self) -> &'static str {
        match self {
            ShapeKind::Gradient => "Gradient",
            ShapeKind::Image => "Image",
            ShapeKind::StencilFill => "StencilFill",
            ShapeKind::Triangles => "Tris",
        }
    }
}

/// How sampled texels are turned into premultiplied color.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub enum CompositeKind {
    #[default]
    Premultiplied,
    NonPremultiplied,
    /// Single-channel texture; the channel is broadcast to all four.
    Alpha,
}

impl CompositeKind {
    pub const ALL: [CompositeKind; 3] = [
        CompositeKind::Premultiplied,
        CompositeKind::NonPremultiplied,
        CompositeKind::Alpha,
    ];

    fn name(self) -> &'static str {
        match self {
            CompositeKind::Premultiplied => "Premultiplied",
            CompositeKind::NonPremultiplied => "Nonpremultiplied",
            CompositeKind::Alpha => "Alpha",
        }
    }
}

/// One cell of the 2×4×3 shader variant table.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct Technique {
    pub aa: AaMode,
    pub shape: ShapeKind,
    pub composite: CompositeKind,
}

impl Technique {
    pub const COUNT: usize = AaMode::ALL.len() * ShapeKind::ALL.len() * CompositeKind::ALL.len();

    pub const fn new(aa: AaMode, shape: ShapeKind, composite: CompositeKind) -> Self {
        Self { aa, shape, composite }
    }

    /// Row-major index `[aa][shape][composite]`, always `< COUNT`.
    pub fn index(self) -> usize {
        let aa = self.aa as usize;
        let shape = self.shape as usize;
        let composite = self.composite as usize;
        (aa * ShapeKind::ALL.len() + shape) * CompositeKind::ALL.len() + composite
    }

    /// Every technique, in index order.
    pub fn all() -> impl Iterator<Item = Technique> {
        AaMode::ALL.into_iter().flat_map(|aa| {
            ShapeKind::ALL.into_iter().flat_map(move |shape| {
                CompositeKind::ALL
                    .into_iter()
                    .map(move |composite| Technique::new(aa, shape, composite))
            })
        })
    }

    /// Display name, e.g. `EdgeAA_Gradient_Premultiplied`.
    pub fn name(self) -> String {
        format!("{}_{}_{}", self.aa.name(), self.shape.name(), self.composite.name())
    }
}

// ── textures ──────────────────────────────────────────────────────────────

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum TextureFormat {
    /// 4 bytes per pixel.
    Rgba,
    /// 1 byte per pixel, coverage only.
    Alpha,
}

impl TextureFormat {
    #[inline]
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            TextureFormat::Rgba => 4,
            TextureFormat::Alpha => 1,
        }
    }
}

/// Arguments of `create_texture`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct TextureDesc {
    pub format: TextureFormat,
    pub width: u32,
    pub height: u32,
    pub nearest: bool,
    pub repeat_x: bool,
    pub repeat_y: bool,
}

impl TextureDesc {
    pub fn new(format: TextureFormat, width: u32, height: u32) -> Self {
        Self {
            format,
            width,
            height,
            nearest: false,
            repeat_x: false,
            repeat_y: false,
        }
    }

    pub fn full_region(&self) -> TextureRegion {
        TextureRegion::new(0, 0, self.width, self.height)
    }
}

/// Sub-rectangle of a texture, in texels.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct TextureRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl TextureRegion {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Bytes expected for this region at `bpp` bytes per pixel.
    pub fn byte_len(&self, bpp: usize) -> usize {
        self.width as usize * self.height as usize * bpp
    }

    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        let right = self.x.checked_add(self.width);
        let bottom = self.y.checked_add(self.height);
        matches!((right, bottom), (Some(r), Some(b)) if r <= width && b <= height)
    }
}

// ── primitives ────────────────────────────────────────────────────────────

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum PrimitiveMode {
    TriangleList,
    TriangleStrip,
}

impl PrimitiveMode {
    /// Triangles produced by `vertex_count` vertices.
    #[inline]
    pub fn primitive_count(self, vertex_count: u32) -> u32 {
        match self {
            PrimitiveMode::TriangleList => vertex_count / 3,
            PrimitiveMode::TriangleStrip => vertex_count.saturating_sub(2),
        }
    }

    /// Vertices consumed by `primitives` triangles.
    #[inline]
    pub fn vertex_count(self, primitives: u32) -> u32 {
        match self {
            PrimitiveMode::TriangleList => primitives * 3,
            PrimitiveMode::TriangleStrip if primitives == 0 => 0,
            PrimitiveMode::TriangleStrip => primitives + 2,
        }
    }
}
