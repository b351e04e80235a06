use std::sync::Arc;

use anyhow::{Context, Result};
use image::RgbaImage;
use wgpu::util::DeviceExt;
use winit::dpi::PhysicalSize;
use winit::window::Window;

use crate::compile::compile_program;
use crate::render_loop::{FrameBackend, FrameError};
use crate::types::{FrameParams, RendererConfig, TextureSlot};

use super::context::GpuContext;
use super::pipeline::{create_pipeline, create_slot_bind_group, PipelineLayouts};
use super::textures::{create_placeholder, upload_image, SlotTexture};
use super::uniforms::InkUniforms;

/// Everything the comparison program needs on the GPU for one mounted
/// surface. Dropping it releases the surface, pipeline and both textures.
pub(crate) struct GpuState {
    context: GpuContext,
    layouts: PipelineLayouts,
    pipeline: wgpu::RenderPipeline,
    uniforms: InkUniforms,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    slots: [SlotTexture; 2],
    slot_bind_group: wgpu::BindGroup,
}

impl GpuState {
    pub(crate) fn new(
        window: Arc<Window>,
        size: PhysicalSize<u32>,
        config: &RendererConfig,
    ) -> Result<Self> {
        let context = GpuContext::new(window, size, config.color_space, config.power, config.vsync)?;
        let device = &context.device;

        let modules = compile_program(device).context("shader program failed to compile")?;
        let layouts = PipelineLayouts::new(device);
        let pipeline = create_pipeline(device, &layouts, &modules, context.surface_format)
            .context("render pipeline failed to link")?;

        let uniforms = InkUniforms::new(context.size.width, context.size.height);
        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("ink uniforms"),
            contents: bytemuck::bytes_of(&uniforms),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("uniform bind group"),
            layout: &layouts.uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let slots = TextureSlot::BOTH.map(|slot| {
            create_placeholder(device, &context.queue, slot, context.color_space)
        });
        let slot_bind_group = create_slot_bind_group(device, &layouts, &slots);

        tracing::debug!(
            width = context.size.width,
            height = context.size.height,
            format = ?context.surface_format,
            "GPU state ready"
        );

        Ok(Self {
            context,
            layouts,
            pipeline,
            uniforms,
            uniform_buffer,
            uniform_bind_group,
            slots,
            slot_bind_group,
        })
    }

    pub(crate) fn size(&self) -> PhysicalSize<u32> {
        self.context.size
    }

    fn acquire(&mut self) -> Result<wgpu::SurfaceTexture, FrameError> {
        match self.context.surface.get_current_texture() {
            Ok(frame) => Ok(frame),
            Err(wgpu::SurfaceError::Lost) | Err(wgpu::SurfaceError::Outdated) => {
                tracing::debug!("surface lost or outdated; reconfiguring");
                self.context.reconfigure();
                Err(FrameError::SurfaceLost)
            }
            Err(wgpu::SurfaceError::Timeout) => Err(FrameError::Timeout),
            Err(wgpu::SurfaceError::OutOfMemory) => Err(FrameError::OutOfMemory),
            Err(error) => Err(FrameError::Other(error.to_string())),
        }
    }
}

impl FrameBackend for GpuState {
    fn resize(&mut self, size: PhysicalSize<u32>) {
        self.context.resize(size);
    }

    fn upload(&mut self, slot: TextureSlot, image: &RgbaImage) -> Result<()> {
        let texture = upload_image(
            &self.context.device,
            &self.context.queue,
            slot,
            image,
            self.context.color_space,
            self.context.max_texture_dimension,
        )?;
        let previous = std::mem::replace(&mut self.slots[slot.index()], texture);
        self.slot_bind_group =
            create_slot_bind_group(&self.context.device, &self.layouts, &self.slots);
        tracing::trace!(
            %slot,
            replaced_placeholder = previous.placeholder,
            previous_size = ?previous.size,
            "slot texture replaced"
        );
        Ok(())
    }

    fn draw(&mut self, params: &FrameParams) -> Result<(), FrameError> {
        let frame = self.acquire()?;

        self.uniforms.apply(params);
        self.context
            .queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&self.uniforms));

        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder =
            self.context
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("render encoder"),
                });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("ink pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            render_pass.set_pipeline(&self.pipeline);
            render_pass.set_bind_group(0, &self.uniform_bind_group, &[]);
            render_pass.set_bind_group(1, &self.slot_bind_group, &[]);
            render_pass.draw(0..6, 0..1);
        }
        self.context.queue.submit(std::iter::once(encoder.finish()));
        frame.present();
        Ok(())
    }
}
