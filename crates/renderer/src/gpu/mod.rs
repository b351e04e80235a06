//! wgpu side of the renderer.
//!
//! - `context` owns instance/adapter/device/surface wiring and reconfigures
//!   the swapchain on resize or surface loss.
//! - `textures` turns decoded images into clamp/linear sampled textures and
//!   provides the transparent placeholder used for empty slots.
//! - `pipeline` builds the single render pipeline and the two-slot bind group.
//! - `uniforms` mirrors the `InkParams` block.
//! - `state` glues everything together as the render loop's `FrameBackend`.

mod context;
mod pipeline;
mod state;
mod textures;
mod uniforms;

pub(crate) use state::GpuState;
