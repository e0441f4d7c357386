//! svgpu engine crate.
//!
//! Draws parsed SVG documents through a nanovg-style callback protocol onto
//! a wgpu device. The layers, bottom up:
//!
//! - [`backend`]: the callback contract and its value types
//! - [`render`]: the wgpu implementation of that contract
//! - [`stream`]: the producer that tessellated shapes are recorded into
//! - [`svg`]: document loading, tessellation and tree walking
//! - [`batch`]: the begin/draw/end controller applications use

pub mod backend;
pub mod batch;
pub mod coords;
pub mod device;
pub mod error;
pub mod logging;
pub mod paint;
pub mod render;
pub mod stream;
pub mod svg;

pub use batch::{SvgRenderer, SvgView, UsageError};
pub use error::{Error, LoadError, Result};
pub use svg::{LoadOptions, SvgImage, Units};
