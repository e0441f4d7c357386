//! Paint model consumed by the draw stream.
//!
//! Scope:
//! - straight-alpha colors (premultiplied when converted to uniforms)
//! - paint sources (solid, linear/radial/box gradients, image patterns)
//! - composite operations and their blend factors
//!
//! Geometry types remain in `coords`.

mod color;
mod composite;
mod paint;

pub use color::Color;
pub use composite::CompositeOperation;
pub use paint::Paint;
