//! Drives the comparison view through its enhancement sequence.
//!
//! `Sequencer` owns the [`RenderState`] the renderer reads every frame:
//! a trigger starts breathing while an [`Enhancer`] runs on a worker thread,
//! a successful result swaps the "new" source and starts crystallizing, and
//! the view settles into the interactive split once the sweep has had time to
//! finish. Timing is driven entirely by the `now` passed to `poll`.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, TryRecvError};
use inkconfig::SequenceSection;
use renderer::{ControlFrame, ImageSource, RenderState, SourcePair, StateController};

#[derive(Debug, thiserror::Error)]
pub enum SequencerError {
    #[error("enhancement failed: {0}")]
    Enhance(String),
    #[error("enhancement worker exited without a result")]
    WorkerLost,
    #[error("failed to spawn enhancement worker: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Produces the "after" image for a reference image. Runs on a worker thread.
pub trait Enhancer: Send + Sync + 'static {
    fn enhance(&self, reference: &ImageSource) -> Result<ImageSource, SequencerError>;
}

/// Stand-in enhancer: hands back a fixed replacement, or the reference itself,
/// after an optional delay.
#[derive(Debug, Clone, Default)]
pub struct PassthroughEnhancer {
    replacement: Option<ImageSource>,
    latency: Duration,
}

impl PassthroughEnhancer {
    pub fn new(replacement: Option<ImageSource>, latency: Duration) -> Self {
        Self {
            replacement,
            latency,
        }
    }
}

impl Enhancer for PassthroughEnhancer {
    fn enhance(&self, reference: &ImageSource) -> Result<ImageSource, SequencerError> {
        if !self.latency.is_zero() {
            thread::sleep(self.latency);
        }
        Ok(self
            .replacement
            .clone()
            .unwrap_or_else(|| reference.clone()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceTimings {
    /// Minimum time spent breathing, even when the enhancer is faster.
    pub breathing: Duration,
    /// Time given to the crystallize sweep before going interactive.
    pub crystallize: Duration,
}

impl Default for SequenceTimings {
    fn default() -> Self {
        Self::from(&SequenceSection::default())
    }
}

impl From<&SequenceSection> for SequenceTimings {
    fn from(section: &SequenceSection) -> Self {
        Self {
            breathing: section.breathing,
            crystallize: section.crystallize,
        }
    }
}

type EnhanceResult = Result<ImageSource, SequencerError>;

enum Phase {
    Idle,
    Breathing {
        since: Option<Instant>,
        pending: Option<Receiver<EnhanceResult>>,
        ready: Option<ImageSource>,
    },
    Crystallizing {
        since: Instant,
    },
    Interactive,
}

impl Phase {
    fn state(&self) -> RenderState {
        match self {
            Phase::Idle => RenderState::Idle,
            Phase::Breathing { .. } => RenderState::Breathing,
            Phase::Crystallizing { .. } => RenderState::Crystallizing,
            Phase::Interactive => RenderState::Interactive,
        }
    }
}

pub struct Sequencer {
    base: SourcePair,
    timings: SequenceTimings,
    enhancer: Arc<dyn Enhancer>,
    phase: Phase,
    last_error: Option<SequencerError>,
}

impl Sequencer {
    pub fn new<E: Enhancer>(base: SourcePair, timings: SequenceTimings, enhancer: E) -> Self {
        Self {
            base,
            timings,
            enhancer: Arc::new(enhancer),
            phase: Phase::Idle,
            last_error: None,
        }
    }

    pub fn state(&self) -> RenderState {
        self.phase.state()
    }

    pub fn base(&self) -> &SourcePair {
        &self.base
    }

    /// Most recent enhancement failure, cleared by the next trigger.
    pub fn last_error(&self) -> Option<&SequencerError> {
        self.last_error.as_ref()
    }

    fn start_enhancement(&mut self) -> Result<Receiver<EnhanceResult>, SequencerError> {
        let (sender, receiver) = crossbeam_channel::bounded(1);
        let enhancer = Arc::clone(&self.enhancer);
        let reference = self.base.old.clone();
        thread::Builder::new()
            .name("inkcrystal-enhance".into())
            .spawn(move || {
                let result = enhancer.enhance(&reference);
                // The sequencer may have been reset; nobody is listening then.
                let _ = sender.send(result);
            })?;
        Ok(receiver)
    }

    fn fail(&mut self, error: SequencerError) {
        tracing::warn!("enhancement sequence aborted: {error}");
        self.last_error = Some(error);
        self.phase = Phase::Idle;
    }
}

impl StateController for Sequencer {
    fn trigger(&mut self) {
        if matches!(
            self.phase,
            Phase::Breathing { .. } | Phase::Crystallizing { .. }
        ) {
            tracing::debug!(state = %self.state(), "ignoring trigger while sequence runs");
            return;
        }
        self.last_error = None;
        match self.start_enhancement() {
            Ok(receiver) => {
                tracing::info!(reference = %self.base.old, "enhancement started");
                self.phase = Phase::Breathing {
                    since: None,
                    pending: Some(receiver),
                    ready: None,
                };
            }
            Err(err) => self.fail(err),
        }
    }

    fn reset(&mut self) {
        if !matches!(self.phase, Phase::Idle) {
            tracing::info!(from = %self.state(), "sequence reset");
        }
        self.phase = Phase::Idle;
    }

    fn replace_sources(&mut self, sources: SourcePair) {
        tracing::info!(from = %self.state(), old = %sources.old, "sources replaced; back to idle");
        self.base = sources;
        self.last_error = None;
        self.phase = Phase::Idle;
    }

    fn poll(&mut self, now: Instant) -> ControlFrame {
        let mut failure = None;
        let mut next = None;
        let mut settled = false;

        match &mut self.phase {
            Phase::Idle | Phase::Interactive => {}
            Phase::Breathing {
                since,
                pending,
                ready,
            } => {
                let started = *since.get_or_insert(now);
                if let Some(receiver) = pending {
                    match receiver.try_recv() {
                        Ok(Ok(source)) => {
                            tracing::debug!(%source, "enhancement finished");
                            *ready = Some(source);
                            *pending = None;
                        }
                        Ok(Err(err)) => failure = Some(err),
                        Err(TryRecvError::Disconnected) => {
                            failure = Some(SequencerError::WorkerLost)
                        }
                        Err(TryRecvError::Empty) => {}
                    }
                }
                if ready.is_some() && now.saturating_duration_since(started) >= self.timings.breathing
                {
                    next = ready.take();
                }
            }
            Phase::Crystallizing { since } => {
                settled = now.saturating_duration_since(*since) >= self.timings.crystallize;
            }
        }

        if settled {
            self.phase = Phase::Interactive;
        }

        if let Some(err) = failure {
            self.fail(err);
            return ControlFrame::state(self.state());
        }

        if let Some(enhanced) = next {
            self.phase = Phase::Crystallizing { since: now };
            let sources = self.base.with_new(enhanced);
            tracing::info!(new = %sources.new, "crystallizing enhanced result");
            return ControlFrame {
                state: RenderState::Crystallizing,
                sources: Some(sources),
            };
        }

        ControlFrame::state(self.state())
    }
}
