//! Shared helpers for `svgpu-engine` integration tests.

use std::path::PathBuf;

use svgpu_engine::device::{Gpu, GpuInit};

/// Returns a device, or `None` (after logging why) on machines without any
/// usable adapter.
pub fn gpu(test_name: &str) -> Option<Gpu> {
    let attempts = [
        GpuInit::fallback(),
        GpuInit {
            power_preference: wgpu::PowerPreference::LowPower,
            required_limits: wgpu::Limits::downlevel_defaults(),
            ..GpuInit::default()
        },
    ];
    let mut last = None;
    for init in attempts {
        match pollster::block_on(Gpu::new(init)) {
            Ok(gpu) => return Some(gpu),
            Err(err) => last = Some(err),
        }
    }
    if let Some(err) = last {
        eprintln!("skipping {test_name}: {err:#}");
    }
    None
}

/// Writes `svg` to a per-process temporary file.
#[allow(dead_code)]
pub fn svg_file(name: &str, svg: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("svgpu-{}-{name}.svg", std::process::id()));
    std::fs::write(&path, svg).unwrap();
    path
}

/// RGBA of pixel `(x, y)` in a tightly packed 4-byte-per-pixel image.
#[allow(dead_code)]
pub fn pixel(rgba: &[u8], width: u32, x: u32, y: u32) -> [u8; 4] {
    let i = ((y * width + x) * 4) as usize;
    [rgba[i], rgba[i + 1], rgba[i + 2], rgba[i + 3]]
}
