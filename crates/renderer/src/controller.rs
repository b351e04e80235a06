use std::time::Instant;

use crate::types::{RenderState, SourcePair};

/// What the controller reports at the start of a frame.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlFrame {
    pub state: RenderState,
    /// Replacement sources; `Some` triggers a full remount.
    pub sources: Option<SourcePair>,
}

impl ControlFrame {
    pub fn state(state: RenderState) -> Self {
        Self {
            state,
            sources: None,
        }
    }
}

/// Owner of the [`RenderState`] machine. The window forwards user intents and
/// polls it once per frame; the renderer never changes state itself.
pub trait StateController {
    /// User asked for an enhanced result (Space or Enter).
    fn trigger(&mut self) {}
    /// User asked to return to the idle view.
    fn reset(&mut self) {}
    /// User brought in a new image pair. The window has already remounted
    /// with it; controllers that run sequences start over from IDLE.
    fn replace_sources(&mut self, _sources: SourcePair) {}
    /// Advances timers and reports the current state.
    fn poll(&mut self, now: Instant) -> ControlFrame;
}

/// Pins the view to one state.
#[derive(Debug, Clone, Copy)]
pub struct FixedState(pub RenderState);

impl StateController for FixedState {
    fn poll(&mut self, _now: Instant) -> ControlFrame {
        ControlFrame::state(self.0)
    }
}

impl<T: StateController + ?Sized> StateController for Box<T> {
    fn trigger(&mut self) {
        (**self).trigger();
    }

    fn reset(&mut self) {
        (**self).reset();
    }

    fn replace_sources(&mut self, sources: SourcePair) {
        (**self).replace_sources(sources);
    }

    fn poll(&mut self, now: Instant) -> ControlFrame {
        (**self).poll(now)
    }
}
