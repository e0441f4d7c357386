use std::sync::mpsc;

use super::ReadbackError;

/// Copies a whole single-sample texture into tightly packed rows.
pub(crate) fn read_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    texture: &wgpu::Texture,
) -> Result<Vec<u8>, ReadbackError> {
    let format = texture.format();
    let bpp = format
        .block_copy_size(None)
        .ok_or(ReadbackError::UnsupportedFormat(format))?;
    let (width, height) = (texture.width(), texture.height());

    let row = width * bpp;
    let padded_row = row.div_ceil(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT) * wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;

    let staging = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("svgpu readback"),
        size: u64::from(padded_row) * u64::from(height),
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("svgpu readback encoder"),
    });
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &staging,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(padded_row),
                rows_per_image: Some(height),
            },
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
    queue.submit(Some(encoder.finish()));

    let slice = staging.slice(..);
    let (tx, rx) = mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |res| {
        let _ = tx.send(res);
    });
    wait_idle(device)?;
    rx.recv().map_err(|_| ReadbackError::Disconnected)??;

    let mapped = slice.get_mapped_range();
    let mut out = Vec::with_capacity((row * height) as usize);
    for chunk in mapped.chunks(padded_row as usize) {
        out.extend_from_slice(&chunk[..row as usize]);
    }
    drop(mapped);
    staging.unmap();
    Ok(out)
}

/// Blocks until all submitted work has completed.
fn wait_idle(device: &wgpu::Device) -> Result<(), ReadbackError> {
    device.poll(wgpu::PollType::wait_indefinitely())?;
    Ok(())
}
