use anyhow::{bail, Result};
use image::RgbaImage;
use wgpu::util::{DeviceExt, TextureDataOrder};

use crate::types::TextureSlot;

use super::context::SurfaceColorSpace;

/// One bound image: texture, view and its clamp/linear sampler.
pub(crate) struct SlotTexture {
    pub _texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: wgpu::Sampler,
    pub size: (u32, u32),
    pub placeholder: bool,
}

fn create_sampler(device: &wgpu::Device, slot: TextureSlot) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some(&format!("{slot} image sampler")),
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter: wgpu::FilterMode::Linear,
        ..Default::default()
    })
}

fn create_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    slot: TextureSlot,
    label: &str,
    (width, height): (u32, u32),
    data: &[u8],
    color_space: SurfaceColorSpace,
) -> wgpu::Texture {
    device.create_texture_with_data(
        queue,
        &wgpu::TextureDescriptor {
            label: Some(&format!("{slot} {label}")),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: color_space.texture_format(),
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        },
        TextureDataOrder::LayerMajor,
        data,
    )
}

/// Empty slot: a single transparent black texel.
pub(crate) fn create_placeholder(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    slot: TextureSlot,
    color_space: SurfaceColorSpace,
) -> SlotTexture {
    let texture = create_texture(
        device,
        queue,
        slot,
        "placeholder texture",
        (1, 1),
        &[0, 0, 0, 0],
        color_space,
    );
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    SlotTexture {
        _texture: texture,
        view,
        sampler: create_sampler(device, slot),
        size: (1, 1),
        placeholder: true,
    }
}

/// Uploads decoded pixels. Row 0 is the top of the image, matching the
/// top-down `v_uv` produced by the vertex stage.
pub(crate) fn upload_image(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    slot: TextureSlot,
    image: &RgbaImage,
    color_space: SurfaceColorSpace,
    max_dimension: u32,
) -> Result<SlotTexture> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        bail!("{slot} image is empty");
    }
    if width > max_dimension || height > max_dimension {
        bail!("{slot} image is {width}x{height}, but the GPU limit is {max_dimension} per side");
    }

    let texture = create_texture(
        device,
        queue,
        slot,
        "image texture",
        (width, height),
        image.as_raw(),
        color_space,
    );
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    Ok(SlotTexture {
        _texture: texture,
        view,
        sampler: create_sampler(device, slot),
        size: (width, height),
        placeholder: false,
    })
}
