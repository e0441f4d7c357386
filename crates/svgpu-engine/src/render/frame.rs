//! Per-frame draw recording and render pass encoding.
//!
//! Draws are recorded between `begin_frame` and `end_frame` and encoded into
//! one render pass per vertex-buffer generation. The stencil attachment is
//! cleared only by the first pass of a frame.

use std::num::NonZeroU64;
use std::rc::Rc;

use crate::backend::UNIFORM_BYTES;

use super::pipeline::GLOBALS_BYTES;
use super::state_cache::STENCIL_FORMAT;

/// One recorded `draw_primitives`.
#[derive(Debug)]
pub(crate) struct DrawOp {
    pub pipeline: Rc<wgpu::RenderPipeline>,
    pub textures: wgpu::BindGroup,
    pub frag_offset: u32,
    pub first: u32,
    pub count: u32,
}

/// State of the frame between `begin_frame` and `end_frame`.
#[derive(Debug)]
pub(crate) struct Frame {
    pub color: wgpu::TextureView,
    pub clear: Option<wgpu::Color>,
    pub ops: Vec<DrawOp>,
    /// Fragment records packed at `stride`.
    frags: Vec<u8>,
    stride: usize,
    passes: u32,
}

impl Frame {
    pub fn new(color: wgpu::TextureView, clear: Option<wgpu::Color>, alignment: u32) -> Self {
        Self {
            color,
            clear,
            ops: Vec::new(),
            frags: Vec::new(),
            stride: uniform_stride(alignment),
            passes: 0,
        }
    }

    /// Appends a fragment record and returns its dynamic offset.
    pub fn push_frag(&mut self, frag: &[u8; UNIFORM_BYTES]) -> u32 {
        let offset = self.frags.len();
        self.frags.extend_from_slice(frag);
        self.frags.resize(offset + self.stride, 0);
        offset as u32
    }

    /// Whether anything must still be encoded before the frame ends.
    pub fn needs_pass(&self) -> bool {
        !self.ops.is_empty() || (self.passes == 0 && self.clear.is_some())
    }
}

/// Fragment records are addressed with dynamic offsets aligned to the
/// device's uniform offset alignment.
pub(crate) fn uniform_stride(alignment: u32) -> usize {
    UNIFORM_BYTES.next_multiple_of(alignment.max(1) as usize)
}

/// Growable uniform storage plus its group 0 bind group.
#[derive(Debug)]
pub(crate) struct UniformArena {
    globals: wgpu::Buffer,
    frags: wgpu::Buffer,
    capacity: u64,
    pub bind_group: wgpu::BindGroup,
}

impl UniformArena {
    pub fn new(device: &wgpu::Device, layout: &wgpu::BindGroupLayout, alignment: u32) -> Self {
        let globals = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("svgpu globals"),
            size: GLOBALS_BYTES,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let capacity = (uniform_stride(alignment) * 64) as u64;
        let frags = Self::frag_buffer(device, capacity);
        let bind_group = Self::bind_group(device, layout, &globals, &frags);
        Self {
            globals,
            frags,
            capacity,
            bind_group,
        }
    }

    fn frag_buffer(device: &wgpu::Device, capacity: u64) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("svgpu fragment uniforms"),
            size: capacity,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    fn bind_group(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        globals: &wgpu::Buffer,
        frags: &wgpu::Buffer,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("svgpu uniforms bind group"),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: globals.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                        buffer: frags,
                        offset: 0,
                        size: NonZeroU64::new(UNIFORM_BYTES as u64),
                    }),
                },
            ],
        })
    }

    /// Uploads globals and fragment records, growing the buffer if needed.
    pub fn upload(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        layout: &wgpu::BindGroupLayout,
        inv_view_size: [f32; 2],
        frags: &[u8],
    ) {
        let globals = [inv_view_size[0], inv_view_size[1], 0.0, 0.0];
        queue.write_buffer(&self.globals, 0, bytemuck::cast_slice(&globals));

        let needed = frags.len() as u64;
        if needed > self.capacity {
            self.capacity = needed.next_power_of_two();
            // Earlier passes of this frame may still read the old buffer;
            // dropping it defers release until they complete.
            self.frags = Self::frag_buffer(device, self.capacity);
            self.bind_group = Self::bind_group(device, layout, &self.globals, &self.frags);
            log::trace!("fragment uniform buffer grown to {} bytes", self.capacity);
        }
        if needed > 0 {
            queue.write_buffer(&self.frags, 0, frags);
        }
    }
}

/// Stencil attachment matching the current color target size.
#[derive(Debug)]
pub(crate) struct StencilTarget {
    view: wgpu::TextureView,
    size: (u32, u32),
}

impl StencilTarget {
    pub fn new(device: &wgpu::Device, size: (u32, u32)) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("svgpu stencil"),
            size: wgpu::Extent3d {
                width: size.0,
                height: size.1,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: STENCIL_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { view, size }
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }
}

/// Shared objects a pass is encoded against.
pub(crate) struct PassResources<'a> {
    pub device: &'a wgpu::Device,
    pub queue: &'a wgpu::Queue,
    pub uniforms_layout: &'a wgpu::BindGroupLayout,
    pub uniforms: &'a mut UniformArena,
    pub stencil: &'a StencilTarget,
    pub vertices: Option<&'a wgpu::Buffer>,
    pub inv_view_size: [f32; 2],
}

/// Encodes and submits every recorded draw, then clears the recording.
pub(crate) fn submit_pass(frame: &mut Frame, res: PassResources<'_>) {
    if !frame.needs_pass() {
        return;
    }
    res.uniforms.upload(
        res.device,
        res.queue,
        res.uniforms_layout,
        res.inv_view_size,
        &frame.frags,
    );

    let first = frame.passes == 0;
    let color_load = match frame.clear {
        Some(c) if first => wgpu::LoadOp::Clear(c),
        _ => wgpu::LoadOp::Load,
    };
    let (depth_load, stencil_load) = if first {
        (wgpu::LoadOp::Clear(1.0), wgpu::LoadOp::Clear(0))
    } else {
        (wgpu::LoadOp::Load, wgpu::LoadOp::Load)
    };

    let mut encoder = res
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("svgpu frame encoder"),
        });
    {
        let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("svgpu pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &frame.color,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: color_load,
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &res.stencil.view,
                depth_ops: Some(wgpu::Operations {
                    load: depth_load,
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: Some(wgpu::Operations {
                    load: stencil_load,
                    store: wgpu::StoreOp::Store,
                }),
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });

        if let Some(vertices) = res.vertices {
            rpass.set_vertex_buffer(0, vertices.slice(..));
        }
        rpass.set_stencil_reference(0);
        for op in &frame.ops {
            rpass.set_pipeline(&op.pipeline);
            rpass.set_bind_group(0, &res.uniforms.bind_group, &[op.frag_offset]);
            rpass.set_bind_group(1, &op.textures, &[]);
            rpass.draw(op.first..op.first + op.count, 0..1);
        }
    }
    res.queue.submit(Some(encoder.finish()));

    log::trace!("submitted pass {} ({} draws)", frame.passes, frame.ops.len());
    frame.passes += 1;
    frame.ops.clear();
    frame.frags.clear();
}
