//! Clocks behind the `time` uniform. The window uses wall-clock time; tests
//! and offline rendering step a simulated clock so frames are reproducible.

use std::time::Instant;

/// Source of the animation time, in seconds since the last mount.
pub trait FrameClock: Send {
    /// Restarts the clock at zero. Called on every mount.
    fn reset(&mut self);
    /// Time for the frame about to be drawn. Never decreases between resets.
    fn seconds(&mut self) -> f32;
}

pub type BoxedClock = Box<dyn FrameClock>;

/// Monotonic wall clock.
#[derive(Debug, Clone, Copy)]
pub struct WallClock {
    origin: Instant,
}

impl WallClock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Default for WallClock {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl FrameClock for WallClock {
    fn reset(&mut self) {
        self.origin = Instant::now();
    }

    fn seconds(&mut self) -> f32 {
        self.origin.elapsed().as_secs_f32()
    }
}

/// Advances by a fixed delta on every read.
#[derive(Debug, Clone, Copy)]
pub struct SteppedClock {
    delta: f32,
    ticks: u32,
}

impl SteppedClock {
    pub fn new(delta: f32) -> Self {
        Self { delta, ticks: 0 }
    }

    pub fn sixty_hz() -> Self {
        Self::new(1.0 / 60.0)
    }
}

impl FrameClock for SteppedClock {
    fn reset(&mut self) {
        self.ticks = 0;
    }

    fn seconds(&mut self) -> f32 {
        let now = self.ticks as f32 * self.delta;
        self.ticks = self.ticks.saturating_add(1);
        now
    }
}
