//! Fixed-length linear smoothing for level targets.
//!
//! A [`Ramp`] moves from its current value to a new target in a constant
//! number of samples, then lands on the target exactly. Envelope segments
//! use a pair of ramps so that edits to start/end levels glide instead of
//! stepping.
//!
//! ```rust
//! use prism_core::Ramp;
//!
//! let mut ramp = Ramp::new(4);
//! ramp.set(1.0); // first set jumps
//! ramp.set(0.0);
//! let values: Vec<f32> = (0..4).map(|_| ramp.next()).collect();
//! assert_eq!(values, vec![0.75, 0.5, 0.25, 0.0]);
//! ```

/// A parameter that moves linearly to its target over a fixed sample count.
///
/// The very first [`set`](Self::set) jumps straight to the value so freshly
/// constructed ramps never glide in from zero.
#[derive(Debug, Clone)]
pub struct Ramp {
    /// Samples per transition, at least 1
    length: u32,
    /// `1 / length`
    inv_length: f32,
    /// Samples remaining in the current transition
    countdown: u32,
    current: f32,
    target: f32,
    /// Per-sample increment for the current transition
    step: f32,
    initialized: bool,
}

impl Ramp {
    /// Create a ramp that transitions over `length` samples (clamped to 1).
    pub fn new(length: u32) -> Self {
        let length = length.max(1);
        Self {
            length,
            inv_length: 1.0 / length as f32,
            countdown: 0,
            current: 0.0,
            target: 0.0,
            step: 0.0,
            initialized: false,
        }
    }

    /// Set a new target.
    ///
    /// - First call ever: jumps immediately.
    /// - While ramping: restarts a full-length ramp from the current value.
    /// - While idle: does nothing if the value is unchanged, otherwise starts
    ///   a ramp.
    pub fn set(&mut self, value: f32) {
        if self.countdown > 0 {
            self.target = value;
            self.countdown = self.length;
            self.step = (self.target - self.current) * self.inv_length;
            return;
        }

        if !self.initialized {
            self.reset(value);
        } else if self.current.to_bits() == value.to_bits() {
            self.target = value;
            self.step = 0.0;
        } else {
            self.target = value;
            self.countdown = self.length;
            self.step = (self.target - self.current) * self.inv_length;
        }
    }

    /// Advance one sample and return the new value.
    ///
    /// The final sample of a transition is exactly the target.
    #[inline]
    pub fn next(&mut self) -> f32 {
        if self.countdown > 0 {
            self.current += self.step;
            self.countdown -= 1;
            if self.countdown == 0 {
                self.current = self.target;
            }
        }
        self.current
    }

    /// Current value without advancing.
    #[inline]
    pub fn get(&self) -> f32 {
        self.current
    }

    /// Target of the current (or last) transition.
    #[inline]
    pub fn target(&self) -> f32 {
        self.target
    }

    /// Whether a transition is in progress.
    #[inline]
    pub fn is_ramping(&self) -> bool {
        self.countdown > 0
    }

    /// Snap to `value` with no transition.
    pub fn reset(&mut self, value: f32) {
        self.current = value;
        self.target = value;
        self.countdown = 0;
        self.step = 0.0;
        self.initialized = true;
    }

    /// Transition length in samples.
    #[inline]
    pub fn length(&self) -> u32 {
        self.length
    }

    /// Change the transition length (clamped to 1).
    ///
    /// Takes effect on the next [`set`](Self::set); a transition already in
    /// flight keeps its step.
    pub fn set_length(&mut self, length: u32) {
        self.length = length.max(1);
        self.inv_length = 1.0 / self.length as f32;
    }
}

impl Default for Ramp {
    fn default() -> Self {
        Self::new(1)
    }
}
