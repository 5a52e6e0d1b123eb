//! Phase accumulator with click-free restart.
//!
//! Restarting an oscillator at phase 0 mid-cycle produces a step in the
//! waveform. [`Phase::trigger`] keeps the interrupted phase running as a
//! "ghost" and crossfades from it to the restarted phase over a short blend
//! window, so the value returned by [`Phase::next`] never jumps.
//!
//! Phase and increment are normalized: one cycle is `[0, 1)`, and the
//! increment for a frequency is `freq / sample_rate`.

/// Normalized phase accumulator.
#[derive(Debug, Clone, Default)]
pub struct Phase {
    phase: f32,
    ghost: f32,
    blend: u32,
    counter: u32,
    blending: bool,
}

impl Phase {
    /// Create a phase at 0 with no blend in progress.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restart at 0, crossfading from the current phase over `blend` samples
    /// (at least 1).
    pub fn trigger(&mut self, blend: u32) {
        self.ghost = self.phase;
        self.phase = 0.0;
        self.blend = blend.max(1);
        self.counter = 0;
        self.blending = true;
    }

    /// Jump to 0 with no crossfade.
    pub fn reset(&mut self) {
        self.phase = 0.0;
        self.ghost = 0.0;
        self.counter = 0;
        self.blending = false;
    }

    /// Return the current (blended) phase, then advance by `increment`.
    #[inline]
    pub fn next(&mut self, increment: f32) -> f32 {
        let out = self.get();
        self.step(increment);
        out
    }

    /// Advance by `increment` without reading.
    #[inline]
    pub fn step(&mut self, increment: f32) {
        self.phase = wrap(self.phase + increment);
        if self.blending {
            self.ghost = wrap(self.ghost + increment);
            self.counter += 1;
            if self.counter >= self.blend {
                self.blending = false;
            }
        }
    }

    /// Current phase in `[0, 1)`, blended while a restart is in progress.
    #[inline]
    pub fn get(&self) -> f32 {
        if self.blending {
            let a = self.counter as f32 / self.blend as f32;
            self.ghost * (1.0 - a) + self.phase * a
        } else {
            self.phase
        }
    }

    /// Whether a restart crossfade is in progress.
    pub fn is_blending(&self) -> bool {
        self.blending
    }
}

#[inline]
fn wrap(phase: f32) -> f32 {
    let wrapped = phase - libm::floorf(phase);
    // floorf can leave exactly 1.0 for tiny negative inputs
    if wrapped >= 1.0 { 0.0 } else { wrapped }
}
