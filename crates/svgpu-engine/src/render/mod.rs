//! wgpu implementation of the device callback surface.
//!
//! [`WgpuBackend`] owns the resource table, the pipeline-state caches and the
//! technique table. Pipeline objects are realized lazily: blend and stencil
//! configurations are packed into integer keys, and equal keys share one
//! cached object until the context is deleted.
//!
//! Convention:
//! - vertex positions are in viewport units (top-left origin, +Y down)
//! - the viewport set per flush spans the whole render target
//! - counter-clockwise triangles (as seen on screen) are front faces

mod backend;
mod config;
mod frame;
mod pipeline;
mod resources;
mod state_cache;
mod technique;

pub use backend::WgpuBackend;
pub use config::{BackendConfig, ShaderSource};
pub use state_cache::CacheStats;
pub use technique::entry_point;
