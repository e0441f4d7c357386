//! Render pipelines keyed by technique, blend, stencil, topology and culling.

use std::num::NonZeroU64;

use crate::backend::{PrimitiveMode, Technique, Vertex, UNIFORM_BYTES};

use super::state_cache::{BlendDesc, BlendKey, StencilKey};
use super::technique::{TechniqueTable, VERTEX_ENTRY};

/// Everything a render pipeline is specialized on.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub(crate) struct PipelineKey {
    pub technique: Technique,
    pub blend: BlendKey,
    /// `None` is the shared "stencil off" state.
    pub stencil: Option<StencilKey>,
    pub mode: PrimitiveMode,
    pub cull: bool,
}

impl Vertex {
    pub(crate) fn layout() -> wgpu::VertexBufferLayout<'static> {
        const ATTRS: [wgpu::VertexAttribute; 2] = wgpu::vertex_attr_array![
            0 => Float32x2, // pos
            1 => Float32x2, // uv
        ];
        wgpu::VertexBufferLayout {
            array_stride: Vertex::STRIDE as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &ATTRS,
        }
    }
}

/// Bind group layouts shared by every pipeline.
#[derive(Debug)]
pub(crate) struct Layouts {
    /// Group 0: view globals + dynamic-offset fragment uniforms.
    pub uniforms: wgpu::BindGroupLayout,
    /// Group 1: texture + sampler.
    pub texture: wgpu::BindGroupLayout,
    pub pipeline: wgpu::PipelineLayout,
}

/// `vec2 inv_view_size` padded to 16 bytes.
pub(crate) const GLOBALS_BYTES: u64 = 16;

impl Layouts {
    pub fn new(device: &wgpu::Device) -> Self {
        let uniform_entry = |binding, size: u64, dynamic| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: dynamic,
                min_binding_size: NonZeroU64::new(size),
            },
            count: None,
        };

        let uniforms = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("svgpu uniforms bgl"),
            entries: &[
                uniform_entry(0, GLOBALS_BYTES, false),
                uniform_entry(1, UNIFORM_BYTES as u64, true),
            ],
        });

        let texture = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("svgpu texture bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("svgpu pipeline layout"),
            bind_group_layouts: &[&uniforms, &texture],
            immediate_size: 0,
        });

        Self {
            uniforms,
            texture,
            pipeline,
        }
    }
}

fn topology(mode: PrimitiveMode) -> wgpu::PrimitiveTopology {
    match mode {
        PrimitiveMode::TriangleList => wgpu::PrimitiveTopology::TriangleList,
        PrimitiveMode::TriangleStrip => wgpu::PrimitiveTopology::TriangleStrip,
    }
}

/// Counter-clockwise triangles face front; culling removes back faces.
pub(crate) fn primitive_state(mode: PrimitiveMode, cull: bool) -> wgpu::PrimitiveState {
    wgpu::PrimitiveState {
        topology: topology(mode),
        strip_index_format: None,
        front_face: wgpu::FrontFace::Ccw,
        cull_mode: cull.then_some(wgpu::Face::Back),
        polygon_mode: wgpu::PolygonMode::Fill,
        unclipped_depth: false,
        conservative: false,
    }
}

pub(crate) fn create_pipeline(
    device: &wgpu::Device,
    layouts: &Layouts,
    techniques: &TechniqueTable,
    color_format: wgpu::TextureFormat,
    key: &PipelineKey,
    blend: &BlendDesc,
    depth_stencil: &wgpu::DepthStencilState,
) -> wgpu::RenderPipeline {
    let fragment_entry = techniques.fragment_entry(key.technique);
    log::trace!(
        "create pipeline {} {:?} cull={} blend={:#x} stencil={:?}",
        key.technique.name(),
        key.mode,
        key.cull,
        key.blend.0,
        key.stencil.map(|s| s.0),
    );

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(fragment_entry),
        layout: Some(&layouts.pipeline),

        vertex: wgpu::VertexState {
            module: techniques.module(),
            entry_point: Some(VERTEX_ENTRY),
            compilation_options: Default::default(),
            buffers: &[Vertex::layout()],
        },

        fragment: Some(wgpu::FragmentState {
            module: techniques.module(),
            entry_point: Some(fragment_entry),
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format: color_format,
                blend: Some(blend.blend),
                write_mask: blend.write_mask,
            })],
        }),

        primitive: primitive_state(key.mode, key.cull),
        depth_stencil: Some(depth_stencil.clone()),
        multisample: wgpu::MultisampleState::default(),
        multiview_mask: None,
        cache: None,
    })
}
