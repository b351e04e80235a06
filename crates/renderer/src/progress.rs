use crate::types::RenderState;

/// Progress added per frame while crystallizing (~1.1 s at 60 Hz to reach 1.0).
pub const DEFAULT_PROGRESS_STEP: f32 = 0.015;

/// Ceiling for the internal accumulator. The sweep keeps "running" a little
/// past 1.0 so the reported value sits at exactly 1.0 for a few frames.
pub const PROGRESS_OVERSHOOT: f32 = 1.2;

/// Crystallization sweep owned by a single render loop.
///
/// While the state stays `Crystallizing` the accumulator only ever grows (it
/// saturates at [`PROGRESS_OVERSHOOT`]); the value handed to the shader is
/// clamped into `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransitionProgress {
    step: f32,
    accumulator: f32,
}

impl TransitionProgress {
    pub fn new(step: f32) -> Self {
        Self {
            step: step.max(0.0),
            accumulator: 0.0,
        }
    }

    /// Advances one frame for the given state and returns the uniform value.
    pub fn advance(&mut self, state: RenderState) -> f32 {
        self.accumulator = match state {
            RenderState::Breathing => 0.0,
            RenderState::Crystallizing => (self.accumulator + self.step).min(PROGRESS_OVERSHOOT),
            RenderState::Idle | RenderState::Interactive => 1.0,
        };
        self.uniform()
    }

    /// Value reported to the shader.
    pub fn uniform(&self) -> f32 {
        self.accumulator.clamp(0.0, 1.0)
    }

    /// Raw accumulator, which may exceed 1.0 while crystallizing.
    pub fn raw(&self) -> f32 {
        self.accumulator
    }

    pub fn step(&self) -> f32 {
        self.step
    }
}

impl Default for TransitionProgress {
    fn default() -> Self {
        Self::new(DEFAULT_PROGRESS_STEP)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crystallizing_is_monotonic_and_clamped() {
        let mut progress = TransitionProgress::default();
        progress.advance(RenderState::Breathing);
        let mut last_raw = progress.raw();
        for _ in 0..200 {
            let uniform = progress.advance(RenderState::Crystallizing);
            assert!(progress.raw() >= last_raw);
            assert!(uniform <= 1.0);
            last_raw = progress.raw();
        }
        assert!((progress.raw() - PROGRESS_OVERSHOOT).abs() < 1e-6);
    }

    #[test]
    fn eighty_frames_reach_the_overshoot() {
        let mut progress = TransitionProgress::new(0.015);
        progress.advance(RenderState::Breathing);
        let mut uniform = 0.0;
        for _ in 0..80 {
            uniform = progress.advance(RenderState::Crystallizing);
        }
        assert!((progress.raw() - 1.2).abs() < 1e-3);
        assert_eq!(uniform, 1.0);
    }

    #[test]
    fn breathing_resets_from_any_state() {
        for state in RenderState::ALL {
            let mut progress = TransitionProgress::default();
            for _ in 0..10 {
                progress.advance(state);
            }
            assert_eq!(progress.advance(RenderState::Breathing), 0.0);
        }
    }

    #[test]
    fn settled_states_report_one() {
        for state in [RenderState::Idle, RenderState::Interactive] {
            let mut progress = TransitionProgress::default();
            progress.advance(RenderState::Breathing);
            assert_eq!(progress.advance(state), 1.0);
        }
    }

    #[test]
    fn crystallizing_resumes_after_idle_from_settled_value() {
        let mut progress = TransitionProgress::new(0.1);
        progress.advance(RenderState::Interactive);
        let uniform = progress.advance(RenderState::Crystallizing);
        assert_eq!(uniform, 1.0);
        assert!(progress.raw() > 1.0);
    }
}
