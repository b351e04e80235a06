//! Per-frame driver for one mounted surface.
//!
//! ```text
//!   mount(backend, sources) ──▶ TextureLoader::request (worker threads)
//!                                        │ LoadOutcome
//!   frame(input) ─┬─ poll loader ◀───────┘  install pair once both resolved
//!                 ├─ apply pending viewport resize
//!                 ├─ progress.advance(state), clock.seconds()
//!                 └─ backend.draw(FrameParams)
//!   stop() ── cancel loads, drop backend (idempotent)
//! ```
//!
//! The loop is generic over [`FrameBackend`] so the lifecycle can be driven
//! without a GPU; `gpu::GpuState` is the real implementation.

use anyhow::Result;
use image::RgbaImage;
use thiserror::Error;
use winit::dpi::PhysicalSize;

use crate::loader::{ResolvedPair, TextureLoader};
use crate::progress::TransitionProgress;
use crate::runtime::BoxedClock;
use crate::types::{FrameParams, RenderState, ShaderMode, SourcePair, TextureSlot};
use crate::viewport::ViewportSizer;

/// Why a frame could not be presented.
#[derive(Debug, Error)]
pub enum FrameError {
    /// The surface was lost or outdated and has been reconfigured.
    #[error("surface lost; reconfigured for the next frame")]
    SurfaceLost,
    #[error("timed out acquiring the next surface texture")]
    Timeout,
    #[error("graphics device is out of memory")]
    OutOfMemory,
    #[error("{0}")]
    Other(String),
}

/// What the render loop needs from a graphics context.
pub trait FrameBackend {
    /// Reallocates the drawing surface.
    fn resize(&mut self, size: PhysicalSize<u32>);
    /// Replaces the texture bound to `slot`, releasing the previous one.
    fn upload(&mut self, slot: TextureSlot, image: &RgbaImage) -> Result<()>;
    /// Writes uniforms and issues the single quad draw.
    fn draw(&mut self, params: &FrameParams) -> Result<(), FrameError>;
}

/// Externally owned inputs read at the start of each frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameInput {
    pub state: RenderState,
    pub slider: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Presented,
    /// Nothing was presented but the loop keeps running.
    Skipped,
    /// The loop is not mounted; do not reschedule.
    Stopped,
}

pub struct RenderLoop<B: FrameBackend> {
    backend: Option<B>,
    sources: Option<SourcePair>,
    loader: TextureLoader,
    progress: TransitionProgress,
    clock: BoxedClock,
    viewport: ViewportSizer,
    frames: u64,
    installed_old: Option<(u32, u32)>,
}

impl<B: FrameBackend> RenderLoop<B> {
    pub fn new(
        viewport: ViewportSizer,
        progress: TransitionProgress,
        clock: BoxedClock,
        loader: TextureLoader,
    ) -> Self {
        Self {
            backend: None,
            sources: None,
            loader,
            progress,
            clock,
            viewport,
            frames: 0,
            installed_old: None,
        }
    }

    /// Takes ownership of a fresh backend and starts loading `sources`.
    /// Anything previously mounted is torn down first.
    pub fn mount(&mut self, mut backend: B, sources: SourcePair) {
        self.stop();
        self.viewport.take_pending();
        if let Some(size) = self.viewport.current() {
            backend.resize(size);
        }
        let generation = self.loader.request(&sources);
        tracing::info!(generation, old = %sources.old, new = %sources.new, "mounted render loop");
        self.backend = Some(backend);
        self.sources = Some(sources);
        self.progress = TransitionProgress::new(self.progress.step());
        self.clock.reset();
        self.frames = 0;
        self.installed_old = None;
    }

    /// Full reinitialisation for a new source pair. The old backend is
    /// dropped before `create` runs so GPU resources never overlap.
    pub fn remount<F>(&mut self, sources: SourcePair, create: F) -> Result<()>
    where
        F: FnOnce() -> Result<B>,
    {
        self.stop();
        let backend = create()?;
        self.mount(backend, sources);
        Ok(())
    }

    /// Cancels pending loads and releases the backend. Returns whether
    /// anything was running; calling it again is a no-op.
    pub fn stop(&mut self) -> bool {
        self.loader.cancel();
        self.sources = None;
        match self.backend.take() {
            Some(backend) => {
                drop(backend);
                tracing::debug!(frames = self.frames, "render loop stopped");
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.backend.is_some()
    }

    pub fn sources(&self) -> Option<&SourcePair> {
        self.sources.as_ref()
    }

    pub fn backend(&self) -> Option<&B> {
        self.backend.as_ref()
    }

    pub fn backend_mut(&mut self) -> Option<&mut B> {
        self.backend.as_mut()
    }

    pub fn viewport(&self) -> &ViewportSizer {
        &self.viewport
    }

    pub fn viewport_mut(&mut self) -> &mut ViewportSizer {
        &mut self.viewport
    }

    /// Dimensions of the "old" image once this mount's pair has been
    /// installed. Taking it clears it.
    pub fn take_installed_old_size(&mut self) -> Option<(u32, u32)> {
        self.installed_old.take()
    }

    /// Frames drawn since the last mount.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Runs one frame. The caller reschedules unless this returns
    /// [`FrameOutcome::Stopped`].
    pub fn frame(&mut self, input: FrameInput) -> FrameOutcome {
        let Some(backend) = self.backend.as_mut() else {
            return FrameOutcome::Stopped;
        };

        if let Some(pair) = self.loader.poll() {
            self.installed_old = pair.get(TextureSlot::Old).as_ref().ok().map(|image| image.dimensions());
            install_pair(backend, pair);
        }
        if let Some(size) = self.viewport.take_pending() {
            tracing::debug!(width = size.width, height = size.height, "resizing surface");
            backend.resize(size);
        }
        let Some(size) = self.viewport.current() else {
            return FrameOutcome::Skipped;
        };

        let time = self.clock.seconds();
        let progress = self.progress.advance(input.state);
        let params = FrameParams {
            time,
            slider: input.slider.clamp(0.0, 1.0),
            mode: ShaderMode::from(input.state),
            progress,
            resolution: (size.width, size.height),
        };

        match backend.draw(&params) {
            Ok(()) => {
                self.frames = self.frames.saturating_add(1);
                FrameOutcome::Presented
            }
            Err(FrameError::SurfaceLost) | Err(FrameError::Timeout) => FrameOutcome::Skipped,
            Err(FrameError::OutOfMemory) => {
                tracing::error!("out of memory while rendering; stopping");
                self.stop();
                FrameOutcome::Stopped
            }
            Err(error) => {
                tracing::warn!(%error, "frame failed");
                FrameOutcome::Skipped
            }
        }
    }
}

impl<B: FrameBackend> Drop for RenderLoop<B> {
    fn drop(&mut self) {
        self.stop();
    }
}

fn install_pair<B: FrameBackend>(backend: &mut B, pair: ResolvedPair) {
    for slot in TextureSlot::BOTH {
        match pair.get(slot) {
            Ok(image) => {
                let (width, height) = image.dimensions();
                match backend.upload(slot, image) {
                    Ok(()) => tracing::debug!(%slot, width, height, "texture installed"),
                    Err(error) => tracing::warn!(
                        %slot,
                        error = %format!("{error:#}"),
                        "texture upload failed; slot left empty"
                    ),
                }
            }
            Err(error) => tracing::warn!(
                %slot,
                generation = pair.generation,
                %error,
                "texture load failed; slot left empty"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::tests::data_source;
    use crate::runtime::SteppedClock;
    use crate::types::ImageSource;
    use std::cell::RefCell;
    use std::path::PathBuf;
    use std::rc::Rc;
    use std::thread;
    use std::time::Duration;
    use winit::dpi::LogicalSize;

    #[derive(Default)]
    struct Log {
        created: u32,
        dropped: u32,
        resizes: Vec<(u32, u32)>,
        uploads: Vec<(TextureSlot, (u32, u32))>,
        draws: Vec<FrameParams>,
    }

    struct FakeBackend {
        log: Rc<RefCell<Log>>,
        fail_with: Option<fn() -> FrameError>,
    }

    impl FakeBackend {
        fn new(log: &Rc<RefCell<Log>>) -> Self {
            log.borrow_mut().created += 1;
            Self {
                log: Rc::clone(log),
                fail_with: None,
            }
        }
    }

    impl Drop for FakeBackend {
        fn drop(&mut self) {
            self.log.borrow_mut().dropped += 1;
        }
    }

    impl FrameBackend for FakeBackend {
        fn resize(&mut self, size: PhysicalSize<u32>) {
            self.log.borrow_mut().resizes.push((size.width, size.height));
        }

        fn upload(&mut self, slot: TextureSlot, image: &RgbaImage) -> Result<()> {
            self.log.borrow_mut().uploads.push((slot, image.dimensions()));
            Ok(())
        }

        fn draw(&mut self, params: &FrameParams) -> Result<(), FrameError> {
            if let Some(fail) = self.fail_with {
                return Err(fail());
            }
            self.log.borrow_mut().draws.push(*params);
            Ok(())
        }
    }

    fn render_loop() -> RenderLoop<FakeBackend> {
        RenderLoop::new(
            ViewportSizer::new(LogicalSize::new(100.0, 50.0), 2.0),
            TransitionProgress::new(0.015),
            Box::new(SteppedClock::sixty_hz()),
            TextureLoader::default(),
        )
    }

    fn pair() -> SourcePair {
        SourcePair::new(data_source(3, 3, [255, 0, 0, 255]), data_source(6, 2, [0, 0, 255, 255]))
    }

    fn input(state: RenderState) -> FrameInput {
        FrameInput { state, slider: 0.5 }
    }

    fn run_until_uploaded(render: &mut RenderLoop<FakeBackend>, log: &Rc<RefCell<Log>>, expected: usize) {
        for _ in 0..500 {
            assert_eq!(render.frame(input(RenderState::Idle)), FrameOutcome::Presented);
            let uploads = log.borrow().uploads.len();
            assert!(uploads == 0 || uploads == expected, "partial install: {uploads}");
            if uploads == expected && !render.loader.in_flight() {
                return;
            }
            thread::sleep(Duration::from_millis(5));
        }
        panic!("textures never installed");
    }

    #[test]
    fn frames_render_before_textures_arrive_and_install_together() {
        let log = Rc::new(RefCell::new(Log::default()));
        let mut render = render_loop();
        render.mount(FakeBackend::new(&log), pair());
        assert_eq!(log.borrow().resizes, vec![(200, 100)]);

        run_until_uploaded(&mut render, &log, 2);
        assert_eq!(render.take_installed_old_size(), Some((3, 3)));
        assert_eq!(render.take_installed_old_size(), None);
        let log = log.borrow();
        assert_eq!(
            log.uploads,
            vec![(TextureSlot::Old, (3, 3)), (TextureSlot::New, (6, 2))]
        );
        assert!(!log.draws.is_empty());
    }

    #[test]
    fn failed_load_leaves_slot_empty_and_keeps_drawing() {
        let log = Rc::new(RefCell::new(Log::default()));
        let mut render = render_loop();
        let sources = pair().with_new(ImageSource::Path(PathBuf::from("/missing/after.png")));
        render.mount(FakeBackend::new(&log), sources);

        for _ in 0..500 {
            assert_eq!(render.frame(input(RenderState::Breathing)), FrameOutcome::Presented);
            if !render.loader.in_flight() {
                break;
            }
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(log.borrow().uploads, vec![(TextureSlot::Old, (3, 3))]);
        assert_eq!(render.frame(input(RenderState::Breathing)), FrameOutcome::Presented);
    }

    #[test]
    fn teardown_is_idempotent() {
        let log = Rc::new(RefCell::new(Log::default()));
        let mut render = render_loop();
        render.mount(FakeBackend::new(&log), pair());
        assert!(render.stop());
        assert!(!render.stop());
        assert_eq!(log.borrow().dropped, 1);
        assert_eq!(render.frame(input(RenderState::Idle)), FrameOutcome::Stopped);
        drop(render);
        assert_eq!(log.borrow().dropped, 1);
    }

    #[test]
    fn late_loads_after_teardown_are_discarded() {
        let log = Rc::new(RefCell::new(Log::default()));
        let mut render = render_loop();
        render.mount(FakeBackend::new(&log), pair());
        render.stop();
        thread::sleep(Duration::from_millis(100));
        assert_eq!(render.frame(input(RenderState::Idle)), FrameOutcome::Stopped);
        assert!(render.loader.poll().is_none());
        assert!(log.borrow().uploads.is_empty());
    }

    #[test]
    fn remount_releases_previous_backend_first() {
        let log = Rc::new(RefCell::new(Log::default()));
        let mut render = render_loop();
        render.mount(FakeBackend::new(&log), pair());

        let replacement = SourcePair::new(data_source(9, 9, [1, 2, 3, 255]), data_source(9, 9, [4, 5, 6, 255]));
        let log_for_create = Rc::clone(&log);
        render
            .remount(replacement.clone(), || {
                assert_eq!(log_for_create.borrow().dropped, 1);
                Ok(FakeBackend::new(&log_for_create))
            })
            .unwrap();
        assert_eq!(render.sources(), Some(&replacement));
        assert_eq!(log.borrow().created, 2);

        run_until_uploaded(&mut render, &log, 2);
        assert!(log.borrow().uploads.iter().all(|(_, dims)| *dims == (9, 9)));
    }

    #[test]
    fn uniforms_follow_state_and_time_increases() {
        let log = Rc::new(RefCell::new(Log::default()));
        let mut render = render_loop();
        render.mount(FakeBackend::new(&log), pair());

        render.frame(input(RenderState::Breathing));
        for _ in 0..10 {
            render.frame(input(RenderState::Crystallizing));
        }
        render.frame(FrameInput {
            state: RenderState::Interactive,
            slider: 7.0,
        });

        let log = log.borrow();
        let draws = &log.draws;
        assert_eq!(draws.len(), 12);
        assert_eq!(draws[0].mode, ShaderMode::Breathing);
        assert_eq!(draws[0].progress, 0.0);
        assert!((draws[10].progress - 0.15).abs() < 1e-4);
        assert_eq!(draws[10].mode, ShaderMode::Crystallizing);
        assert_eq!(draws[11].progress, 1.0);
        assert_eq!(draws[11].slider, 1.0);
        assert_eq!(draws[11].resolution, (200, 100));
        assert!(draws.windows(2).all(|pair| pair[1].time > pair[0].time));
    }

    #[test]
    fn resize_applies_once_per_change() {
        let log = Rc::new(RefCell::new(Log::default()));
        let mut render = render_loop();
        render.mount(FakeBackend::new(&log), pair());

        render.viewport_mut().observe_container(LogicalSize::new(120.0, 50.0));
        render.viewport_mut().observe_container(LogicalSize::new(120.0, 50.0));
        render.frame(input(RenderState::Idle));
        render.viewport_mut().observe_physical(PhysicalSize::new(240, 100));
        render.frame(input(RenderState::Idle));

        assert_eq!(log.borrow().resizes, vec![(200, 100), (240, 100)]);
    }

    #[test]
    fn surface_loss_skips_and_oom_stops() {
        let log = Rc::new(RefCell::new(Log::default()));
        let mut render = render_loop();
        let mut backend = FakeBackend::new(&log);
        backend.fail_with = Some(|| FrameError::SurfaceLost);
        render.mount(backend, pair());
        assert_eq!(render.frame(input(RenderState::Idle)), FrameOutcome::Skipped);
        assert!(render.is_running());

        if let Some(backend) = render.backend_mut() {
            backend.fail_with = Some(|| FrameError::OutOfMemory);
        }
        assert_eq!(render.frame(input(RenderState::Idle)), FrameOutcome::Stopped);
        assert!(!render.is_running());
        assert_eq!(log.borrow().dropped, 1);
    }
}
