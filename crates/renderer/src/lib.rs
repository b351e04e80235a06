//! Renderer crate for Ink & Crystal.
//!
//! The crate turns a pair of image sources into a continuously animated
//! before/after comparison. The overall flow is:
//!
//! ```text
//!   CLI / sequencer
//!          │ RendererConfig + StateController
//!          ▼
//!   Renderer::run ──▶ winit event loop ──▶ RenderLoop::frame()
//!                         │                   │
//!                         │ Resized           ├─▶ TextureLoader::poll ─▶ slot upload
//!                         ▼                   ├─▶ TransitionProgress::advance
//!                    ViewportSizer ───────────┴─▶ FrameBackend::draw ─▶ GPU UBO
//! ```
//!
//! `RenderLoop` owns the animation state and is generic over the
//! [`FrameBackend`] that actually draws; the window uses the wgpu backend in
//! `gpu`. The `shading` module evaluates the same program on the CPU, which is
//! what [`render_still`] and the tests use.

use std::time::Duration;

use anyhow::{Context, Result};
use image::RgbaImage;

mod compile;
mod controller;
mod gpu;
mod loader;
mod progress;
mod render_loop;
mod runtime;
pub mod shading;
mod types;
mod viewport;
mod window;

pub use compile::{validate_program, ShaderError, FRAGMENT_SHADER_GLSL, VERTEX_SHADER_GLSL};
pub use controller::{ControlFrame, FixedState, StateController};
pub use loader::{
    decode_image, fetch_bytes, load_image, LoadError, LoadOutcome, ResolvedPair, TextureLoader,
    DEFAULT_FETCH_TIMEOUT,
};
pub use progress::{TransitionProgress, DEFAULT_PROGRESS_STEP, PROGRESS_OVERSHOOT};
pub use render_loop::{FrameBackend, FrameError, FrameInput, FrameOutcome, RenderLoop};
pub use runtime::{BoxedClock, FrameClock, SteppedClock, WallClock};
pub use types::{
    ColorSpaceMode, FrameParams, GpuPowerPreference, ImageSource, RenderState, RendererConfig,
    ShaderMode, SourcePair, TextureSlot,
};
pub use viewport::{pixel_size, ViewportSizer};

/// Entry point that opens the comparison window.
pub struct Renderer {
    config: RendererConfig,
}

impl Renderer {
    pub fn new(config: RendererConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Runs the window until it is closed. The controller owns the state
    /// machine; the renderer only reads it.
    pub fn run<C>(self, controller: C) -> Result<()>
    where
        C: StateController + 'static,
    {
        tracing::info!(
            width = self.config.window_size.0,
            height = self.config.window_size.1,
            old = %self.config.sources.old,
            new = %self.config.sources.new,
            "opening comparison window"
        );
        window::run_window(self.config, controller)
    }
}

/// Loads both sources and renders one frame on the CPU. A slot that fails to
/// load is logged and rendered empty, the same way the window treats it.
pub fn render_still(
    sources: &SourcePair,
    params: &FrameParams,
    timeout: Duration,
) -> Result<RgbaImage> {
    let mut loader = TextureLoader::new(timeout);
    loader.request(sources);
    let pair = loader
        .wait(timeout + Duration::from_secs(1))
        .context("timed out waiting for source images")?;

    let mut images: [Option<RgbaImage>; 2] = [None, None];
    for (slot, result) in [(TextureSlot::Old, pair.old), (TextureSlot::New, pair.new)] {
        match result {
            Ok(image) => images[slot.index()] = Some(image),
            Err(err) => tracing::warn!(%slot, "leaving slot empty: {err}"),
        }
    }
    let [old, new] = images;
    Ok(shading::render_frame(params, old.as_ref(), new.as_ref()))
}
