//! Coordinate and geometry types shared by the tessellator, paints and the
//! render backend.
//!
//! Canonical CPU space:
//! - Logical pixels (the batch viewport, before the pixel ratio is applied)
//! - Origin top-left
//! - +X right, +Y down
//!
//! The vertex shader converts to NDC using the inverse viewport size.

mod rect;
mod transform;
mod vec2;
mod viewport;

pub use rect::Rect;
pub use transform::Transform;
pub use vec2::Vec2;
pub use viewport::Viewport;
