//! Headless GPU device and offscreen render targets.
//!
//! This module is responsible for:
//! - creating the wgpu Instance/Adapter/Device/Queue without a surface
//! - allocating color targets that frames are rendered into
//! - reading textures back to the CPU

mod error;
mod gpu;
mod readback;
mod target;

pub use error::ReadbackError;
pub use gpu::{Gpu, GpuInit};
pub(crate) use readback::read_texture;
pub use target::RenderTarget;
