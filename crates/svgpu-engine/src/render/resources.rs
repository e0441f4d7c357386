//! Resource table: handle-keyed textures plus the single vertex buffer slot.

use std::collections::HashMap;

use crate::backend::{
    BackendError, Handle, HandleAllocator, TextureDesc, TextureFormat, TextureRegion, Vertex,
};

/// Device texture with its sampler and bind group, owned by the table.
#[derive(Debug)]
pub(crate) struct TextureRecord {
    pub texture: wgpu::Texture,
    pub bind_group: wgpu::BindGroup,
    pub desc: TextureDesc,
}

impl TextureRecord {
    pub fn bytes_per_pixel(&self) -> usize {
        self.desc.format.bytes_per_pixel()
    }
}

#[derive(Debug)]
pub(crate) struct VertexSlot {
    pub buffer: wgpu::Buffer,
    /// Capacity in bytes.
    pub capacity: usize,
    /// Vertices written by the latest update.
    pub len: u32,
}

/// Integer handle → device resource. Handles are never reused.
#[derive(Debug, Default)]
pub(crate) struct ResourceTable {
    handles: HandleAllocator,
    textures: HashMap<Handle, TextureRecord>,
    vertices: Option<VertexSlot>,
}

impl ResourceTable {
    pub fn texture(&self, handle: Handle) -> Result<&TextureRecord, BackendError> {
        self.textures
            .get(&handle)
            .ok_or(BackendError::UnknownTexture(handle))
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    pub fn create_texture(
        &mut self,
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        desc: &TextureDesc,
    ) -> Result<Handle, BackendError> {
        let max = device.limits().max_texture_dimension_2d;
        let reject = |reason| BackendError::TextureCreation {
            width: desc.width,
            height: desc.height,
            reason,
        };
        if desc.width == 0 || desc.height == 0 {
            return Err(reject("zero-sized texture"));
        }
        if desc.width > max || desc.height > max {
            return Err(reject("exceeds the device texture size limit"));
        }

        let handle = self.handles.alloc();
        let label = format!("svgpu texture {handle}");
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(&label),
            size: wgpu::Extent3d {
                width: desc.width,
                height: desc.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: texture_format(desc.format),
            usage: wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_DST
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let bind_group = texture_bind_group(device, layout, &texture, desc, &label);

        log::trace!("create texture {handle} {}x{} {:?}", desc.width, desc.height, desc.format);
        self.textures.insert(
            handle,
            TextureRecord {
                texture,
                bind_group,
                desc: *desc,
            },
        );
        Ok(handle)
    }

    pub fn update_texture(
        &self,
        queue: &wgpu::Queue,
        handle: Handle,
        region: TextureRegion,
        data: &[u8],
    ) -> Result<(), BackendError> {
        let rec = self.texture(handle)?;
        let (width, height) = (rec.desc.width, rec.desc.height);
        if !region.fits_within(width, height) {
            return Err(BackendError::RegionOutOfBounds {
                region,
                width,
                height,
            });
        }
        let bpp = rec.bytes_per_pixel();
        let expected = region.byte_len(bpp);
        if data.len() != expected {
            return Err(BackendError::UploadSize {
                expected,
                actual: data.len(),
            });
        }
        if expected == 0 {
            return Ok(());
        }

        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &rec.texture,
                mip_level: 0,
                origin: wgpu::Origin3d {
                    x: region.x,
                    y: region.y,
                    z: 0,
                },
                aspect: wgpu::TextureAspect::All,
            },
            data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(region.width * bpp as u32),
                rows_per_image: Some(region.height),
            },
            wgpu::Extent3d {
                width: region.width,
                height: region.height,
                depth_or_array_layers: 1,
            },
        );
        Ok(())
    }

    pub fn delete_texture(&mut self, handle: Handle) -> Result<(), BackendError> {
        // Dropped rather than destroyed: submitted passes may still sample it.
        self.textures
            .remove(&handle)
            .ok_or(BackendError::UnknownTexture(handle))?;
        log::trace!("delete texture {handle}");
        Ok(())
    }

    // ── vertex buffer ─────────────────────────────────────────────────────

    pub fn vertex_slot(&self) -> Option<&VertexSlot> {
        self.vertices.as_ref()
    }

    pub fn create_vertex_buffer(
        &mut self,
        device: &wgpu::Device,
        size_bytes: usize,
    ) -> Result<Handle, BackendError> {
        if self.vertices.is_some() {
            return Err(BackendError::VertexBufferAlive);
        }
        // Whole vertices only; wgpu also wants a multiple of 4.
        let capacity = (size_bytes / Vertex::STRIDE).max(1) * Vertex::STRIDE;
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("svgpu vertices"),
            size: capacity as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        log::trace!("create vertex buffer ({capacity} bytes)");
        self.vertices = Some(VertexSlot {
            buffer,
            capacity,
            len: 0,
        });
        Ok(Handle::VERTEX_BUFFER)
    }

    pub fn update_vertex_buffer(
        &mut self,
        queue: &wgpu::Queue,
        handle: Handle,
        vertices: &[Vertex],
    ) -> Result<(), BackendError> {
        let slot = self.vertex_slot_mut(handle)?;
        let bytes: &[u8] = bytemuck::cast_slice(vertices);
        if bytes.len() > slot.capacity {
            return Err(BackendError::VertexBufferOverflow {
                needed: bytes.len(),
                capacity: slot.capacity,
            });
        }
        if !bytes.is_empty() {
            queue.write_buffer(&slot.buffer, 0, bytes);
        }
        slot.len = vertices.len() as u32;
        Ok(())
    }

    pub fn delete_vertex_buffer(&mut self, handle: Handle) -> Result<(), BackendError> {
        self.vertex_slot_mut(handle)?;
        self.vertices = None;
        log::trace!("delete vertex buffer");
        Ok(())
    }

    fn vertex_slot_mut(&mut self, handle: Handle) -> Result<&mut VertexSlot, BackendError> {
        if handle != Handle::VERTEX_BUFFER {
            return Err(BackendError::NotVertexBuffer(handle));
        }
        self.vertices.as_mut().ok_or(BackendError::NoVertexBuffer)
    }

    /// Drops every resource. Handles keep counting upwards.
    pub fn clear(&mut self) {
        self.textures.clear();
        self.vertices = None;
    }
}

pub(crate) fn texture_format(format: TextureFormat) -> wgpu::TextureFormat {
    match format {
        TextureFormat::Rgba => wgpu::TextureFormat::Rgba8Unorm,
        TextureFormat::Alpha => wgpu::TextureFormat::R8Unorm,
    }
}

pub(crate) fn sampler_descriptor(desc: &TextureDesc) -> wgpu::SamplerDescriptor<'static> {
    let filter = if desc.nearest {
        wgpu::FilterMode::Nearest
    } else {
        wgpu::FilterMode::Linear
    };
    let wrap = |repeat| {
        if repeat {
            wgpu::AddressMode::Repeat
        } else {
            wgpu::AddressMode::ClampToEdge
        }
    };
    wgpu::SamplerDescriptor {
        label: Some("svgpu sampler"),
        address_mode_u: wrap(desc.repeat_x),
        address_mode_v: wrap(desc.repeat_y),
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: filter,
        min_filter: filter,
        mipmap_filter: wgpu::MipmapFilterMode::Nearest,
        ..Default::default()
    }
}

/// Group 1: texture view + sampler.
pub(crate) fn texture_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    texture: &wgpu::Texture,
    desc: &TextureDesc,
    label: &str,
) -> wgpu::BindGroup {
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    let sampler = device.create_sampler(&sampler_descriptor(desc));
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(label),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(&sampler),
            },
        ],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_follow_channel_count() {
        assert_eq!(texture_format(TextureFormat::Rgba), wgpu::TextureFormat::Rgba8Unorm);
        assert_eq!(texture_format(TextureFormat::Alpha), wgpu::TextureFormat::R8Unorm);
    }

    #[test]
    fn sampler_records_filter_and_wrap() {
        let mut desc = TextureDesc::new(TextureFormat::Rgba, 4, 4);
        desc.nearest = true;
        desc.repeat_x = true;
        let s = sampler_descriptor(&desc);
        assert_eq!(s.mag_filter, wgpu::FilterMode::Nearest);
        assert_eq!(s.min_filter, wgpu::FilterMode::Nearest);
        assert_eq!(s.address_mode_u, wgpu::AddressMode::Repeat);
        assert_eq!(s.address_mode_v, wgpu::AddressMode::ClampToEdge);

        let s = sampler_descriptor(&TextureDesc::new(TextureFormat::Alpha, 1, 1));
        assert_eq!(s.mag_filter, wgpu::FilterMode::Linear);
    }

    #[test]
    fn unknown_handles_are_rejected_without_a_device() {
        let mut table = ResourceTable::default();
        let h = Handle::new(7).unwrap();
        assert!(matches!(table.texture(h), Err(BackendError::UnknownTexture(x)) if x == h));
        assert!(matches!(table.delete_texture(h), Err(BackendError::UnknownTexture(_))));
        assert!(matches!(
            table.delete_vertex_buffer(Handle::VERTEX_BUFFER),
            Err(BackendError::NoVertexBuffer)
        ));
        assert!(matches!(table.delete_vertex_buffer(h), Err(BackendError::NotVertexBuffer(_))));
    }
}
