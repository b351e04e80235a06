use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use tracing::{debug, error, info};
use winit::dpi::LogicalSize;
use winit::event::{ElementState, Event, KeyEvent, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::{Key, NamedKey};
use winit::window::{Window, WindowBuilder};

use crate::controller::StateController;
use crate::gpu::GpuState;
use crate::loader::TextureLoader;
use crate::progress::TransitionProgress;
use crate::render_loop::{FrameInput, FrameOutcome, RenderLoop};
use crate::runtime::WallClock;
use crate::types::{ImageSource, RenderState, RendererConfig, SourcePair};
use crate::viewport::ViewportSizer;

/// User intents recognised from the keyboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum KeyIntent {
    Trigger,
    Reset,
    Exit,
}

pub(crate) fn intent_for_key(key: &Key) -> Option<KeyIntent> {
    match key {
        Key::Named(NamedKey::Space) | Key::Named(NamedKey::Enter) => Some(KeyIntent::Trigger),
        Key::Named(NamedKey::Escape) => Some(KeyIntent::Exit),
        Key::Character(value) if value.as_str() == " " => Some(KeyIntent::Trigger),
        Key::Character(value) if value.eq_ignore_ascii_case("r") => Some(KeyIntent::Reset),
        _ => None,
    }
}

fn intent_for_event(event: &KeyEvent) -> Option<KeyIntent> {
    if event.state != ElementState::Pressed || event.repeat {
        return None;
    }
    intent_for_key(&event.logical_key)
}

/// Slider position driven by the pointer. Only follows the pointer while the
/// comparison is interactive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct PointerSlider {
    value: f32,
}

impl PointerSlider {
    pub(crate) fn new(value: f32) -> Self {
        Self {
            value: value.clamp(0.0, 1.0),
        }
    }

    pub(crate) fn value(&self) -> f32 {
        self.value
    }

    /// Returns true when the slider moved.
    pub(crate) fn pointer_moved(&mut self, x: f64, width: f64, state: RenderState) -> bool {
        if state != RenderState::Interactive || width <= 0.0 {
            return false;
        }
        let next = (x / width).clamp(0.0, 1.0) as f32;
        if next == self.value {
            return false;
        }
        self.value = next;
        true
    }
}

/// Reshapes the window to an image's aspect ratio. Portrait images keep the
/// current height and landscape images keep the current width.
pub(crate) fn fit_to_aspect(current: LogicalSize<f64>, image: (u32, u32)) -> LogicalSize<f64> {
    let (width, height) = image;
    if width == 0 || height == 0 {
        return current;
    }
    let aspect = width as f64 / height as f64;
    if aspect < 1.0 {
        LogicalSize::new((current.height * aspect).round(), current.height)
    } else {
        LogicalSize::new(current.width, (current.width / aspect).round())
    }
}

/// A dropped file becomes both sides of the comparison until an enhanced
/// result replaces the new side.
pub(crate) fn dropped_sources(path: std::path::PathBuf) -> SourcePair {
    let source = ImageSource::Path(path);
    SourcePair::new(source.clone(), source)
}

fn remount_gpu(
    render: &mut RenderLoop<GpuState>,
    window: &Arc<Window>,
    config: &RendererConfig,
    sources: SourcePair,
) -> Result<()> {
    let size = render.viewport().current().unwrap_or(window.inner_size());
    render.remount(sources, || GpuState::new(window.clone(), size, config))
}

fn window_title(prefix: &str, state: RenderState) -> String {
    format!("{prefix} | {}", state.status_label())
}

/// Opens the window and drives the render loop on the calling thread until
/// the window closes.
pub(crate) fn run_window<C>(config: RendererConfig, mut controller: C) -> Result<()>
where
    C: StateController + 'static,
{
    let event_loop = EventLoop::new().map_err(|err| anyhow!("failed to create event loop: {err}"))?;
    let (width, height) = config.window_size;
    let window = WindowBuilder::new()
        .with_title(window_title(&config.title, RenderState::Idle))
        .with_inner_size(LogicalSize::new(width as f64, height as f64))
        .build(&event_loop)
        .map_err(|err| anyhow!("failed to create window: {err}"))?;
    let window = Arc::new(window);

    let scale_factor = window.scale_factor();
    let viewport = ViewportSizer::new(window.inner_size().to_logical(scale_factor), scale_factor);
    let mut render: RenderLoop<GpuState> = RenderLoop::new(
        viewport,
        TransitionProgress::new(config.progress_step),
        Box::new(WallClock::new()),
        TextureLoader::new(config.fetch_timeout),
    );

    let initial_size = render.viewport().current().unwrap_or(window.inner_size());
    let gpu = GpuState::new(window.clone(), initial_size, &config)
        .context("failed to initialise renderer")?;
    info!(
        width = gpu.size().width,
        height = gpu.size().height,
        scale_factor,
        "renderer ready"
    );
    render.mount(gpu, config.sources.clone());
    window.request_redraw();

    let mut slider = PointerSlider::new(config.slider);
    let mut state = RenderState::Idle;
    let mut fit_pending = false;
    let mut result = Ok(());

    let run_result = event_loop.run(|event, elwt| match event {
        Event::WindowEvent { window_id, event } if window_id == window.id() => match event {
            WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                render.stop();
                elwt.exit();
            }
            WindowEvent::KeyboardInput { event, .. } => match intent_for_event(&event) {
                Some(KeyIntent::Trigger) => controller.trigger(),
                Some(KeyIntent::Reset) => controller.reset(),
                Some(KeyIntent::Exit) => {
                    render.stop();
                    elwt.exit();
                }
                None => {}
            },
            WindowEvent::CursorMoved { position, .. } => {
                let width = window.inner_size().width as f64;
                if slider.pointer_moved(position.x, width, state) {
                    tracing::trace!(slider = slider.value(), "slider moved");
                }
            }
            WindowEvent::Resized(new_size) => {
                render.viewport_mut().observe_physical(new_size);
            }
            WindowEvent::ScaleFactorChanged { scale_factor, .. } => {
                render.viewport_mut().observe_scale_factor(scale_factor);
            }
            WindowEvent::DroppedFile(path) => {
                info!(path = %path.display(), "image dropped; replacing both sources");
                let sources = dropped_sources(path);
                controller.replace_sources(sources.clone());
                if let Err(err) = remount_gpu(&mut render, &window, &config, sources) {
                    error!("failed to remount renderer: {err:?}");
                    result = Err(err);
                    elwt.exit();
                    return;
                }
                fit_pending = true;
                window.request_redraw();
            }
            WindowEvent::RedrawRequested => {
                let control = controller.poll(Instant::now());
                if control.state != state {
                    info!(from = %state, to = %control.state, "render state changed");
                    state = control.state;
                    window.set_title(&window_title(&config.title, state));
                }
                if let Some(sources) = control.sources {
                    if let Err(err) = remount_gpu(&mut render, &window, &config, sources) {
                        error!("failed to remount renderer: {err:?}");
                        result = Err(err);
                        elwt.exit();
                        return;
                    }
                }
                let input = FrameInput {
                    state,
                    slider: slider.value(),
                };
                if render.frame(input) == FrameOutcome::Stopped {
                    error!("render loop stopped; closing window");
                    elwt.exit();
                    return;
                }
                if fit_pending {
                    if let Some(image) = render.take_installed_old_size() {
                        fit_pending = false;
                        let current = window.inner_size().to_logical(window.scale_factor());
                        let target = fit_to_aspect(current, image);
                        debug!(width = target.width, height = target.height, "fitting window to image");
                        // Some platforms apply the size later and report it via Resized.
                        let _ = window.request_inner_size(target);
                    }
                }
            }
            _ => {}
        },
        Event::AboutToWait => {
            if render.is_running() {
                window.request_redraw();
            }
            elwt.set_control_flow(ControlFlow::Wait);
        }
        Event::LoopExiting => {
            render.stop();
        }
        _ => {}
    });

    if let Err(err) = run_result {
        return Err(anyhow!("window event loop error: {err}"));
    }
    result
}
