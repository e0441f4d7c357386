//! Frame/batch control.
//!
//! [`SvgRenderer`] enforces the begin/draw/end sequence over any
//! [`RenderBackend`](crate::backend::RenderBackend). [`SvgView`] bundles one
//! image with a wgpu renderer for the common "draw this file" case.

mod error;
mod renderer;
mod view;

pub use error::UsageError;
pub use renderer::SvgRenderer;
pub use view::SvgView;
