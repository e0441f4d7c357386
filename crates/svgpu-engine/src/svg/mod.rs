//! SVG documents: loading, tessellation and drawing.
//!
//! Documents are parsed with `usvg`; embedded raster images are decoded up
//! front so that drawing never fails on content. Drawing flattens every path
//! with a tolerance derived from the batch pixel ratio and records fills and
//! strokes into a draw stream.

mod draw;
mod load;
mod tess;

pub use load::{LoadOptions, SvgImage, Units};

pub(crate) use draw::{draw_svg, DrawParams, Notes, RasterTextures};
