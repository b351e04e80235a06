use crate::compile::{ShaderError, ShaderModules};
use crate::types::TextureSlot;

use super::textures::SlotTexture;

pub(crate) struct PipelineLayouts {
    pub uniform_layout: wgpu::BindGroupLayout,
    pub texture_layout: wgpu::BindGroupLayout,
}

impl PipelineLayouts {
    pub fn new(device: &wgpu::Device) -> Self {
        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("uniform layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });
        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("texture slot layout"),
            entries: &build_slot_layout_entries(),
        });
        Self {
            uniform_layout,
            texture_layout,
        }
    }
}

pub(crate) fn create_pipeline(
    device: &wgpu::Device,
    layouts: &PipelineLayouts,
    modules: &ShaderModules,
    surface_format: wgpu::TextureFormat,
) -> Result<wgpu::RenderPipeline, ShaderError> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("ink pipeline layout"),
        bind_group_layouts: &[&layouts.uniform_layout, &layouts.texture_layout],
        push_constant_ranges: &[],
    });

    let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("ink pipeline"),
        layout: Some(&pipeline_layout),
        vertex: wgpu::VertexState {
            module: &modules.vertex,
            entry_point: Some("main"),
            buffers: &[],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        fragment: Some(wgpu::FragmentState {
            module: &modules.fragment,
            entry_point: Some("main"),
            targets: &[Some(wgpu::ColorTargetState {
                format: surface_format,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        multiview: None,
        cache: None,
    });
    if let Some(error) = pollster::block_on(device.pop_error_scope()) {
        tracing::error!(%error, "render pipeline creation failed");
        return Err(link_error(&error));
    }
    Ok(pipeline)
}

fn link_error(error: &impl std::fmt::Display) -> ShaderError {
    ShaderError::Link {
        message: error.to_string(),
    }
}

/// Bind group for both slots; rebuilt whenever either texture changes.
pub(crate) fn create_slot_bind_group(
    device: &wgpu::Device,
    layouts: &PipelineLayouts,
    slots: &[SlotTexture; 2],
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("texture slot bind group"),
        layout: &layouts.texture_layout,
        entries: &build_slot_entries(slots),
    })
}

fn build_slot_entries(slots: &[SlotTexture; 2]) -> Vec<wgpu::BindGroupEntry<'_>> {
    let mut entries = Vec::with_capacity(4);
    for slot in TextureSlot::BOTH {
        let resource = &slots[slot.index()];
        let base = slot.index() as u32 * 2;
        entries.push(wgpu::BindGroupEntry {
            binding: base,
            resource: wgpu::BindingResource::TextureView(&resource.view),
        });
        entries.push(wgpu::BindGroupEntry {
            binding: base + 1,
            resource: wgpu::BindingResource::Sampler(&resource.sampler),
        });
    }
    entries
}

fn build_slot_layout_entries() -> Vec<wgpu::BindGroupLayoutEntry> {
    let mut entries = Vec::with_capacity(4);
    for slot in TextureSlot::BOTH {
        let base = slot.index() as u32 * 2;
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: base,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        });
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: base + 1,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
            count: None,
        });
    }
    entries
}
