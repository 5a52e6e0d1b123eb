//! The real-time boundary.
//!
//! [`Realtime`] is implemented only by types whose block processing never
//! allocates, locks, logs or blocks. Their control-side counterparts
//! (publishing, coefficient computation, spec construction) live on separate
//! handles that do not implement it, so an audio callback written against
//! `Realtime` cannot reach them.
//!
//! ## Design Decisions
//!
//! - **In-place blocks**: processors transform caller-owned buffers; the
//!   audio thread owns every buffer and nothing is returned by value.
//! - **Active-sample count**: `process_block` reports how many leading
//!   samples carried signal. Gates (envelopes) use it to signal that a voice
//!   went idle; always-on processors return the buffer length.

/// A processor that is safe to run on the audio thread.
///
/// # Example
///
/// ```rust
/// use prism_core::Realtime;
///
/// struct Gain(f32);
///
/// impl Realtime for Gain {
///     fn process_block(&mut self, buffer: &mut [f32]) -> usize {
///         for s in buffer.iter_mut() {
///             *s *= self.0;
///         }
///         buffer.len()
///     }
///
///     fn reset(&mut self) {}
/// }
///
/// let mut gain = Gain(0.5);
/// let mut block = [1.0, 2.0];
/// assert_eq!(gain.process_block(&mut block), 2);
/// assert_eq!(block, [0.5, 1.0]);
/// ```
pub trait Realtime {
    /// Process a block in place.
    ///
    /// Returns the number of leading samples that carried signal. Samples
    /// after that count have been written as silence.
    fn process_block(&mut self, buffer: &mut [f32]) -> usize;

    /// Return to the initial audible state without touching parameters.
    fn reset(&mut self);
}

/// Extension trait for running processors in series.
pub trait RealtimeExt: Realtime + Sized {
    /// Feed the output of `self` into `next`.
    fn then<R: Realtime>(self, next: R) -> Series<Self, R> {
        Series {
            first: self,
            second: next,
        }
    }
}

impl<T: Realtime> RealtimeExt for T {}

/// Two processors in series, created by [`RealtimeExt::then`].
///
/// The active-sample count is the smaller of the two stages' counts.
#[derive(Debug)]
pub struct Series<A, B> {
    first: A,
    second: B,
}

impl<A: Realtime, B: Realtime> Realtime for Series<A, B> {
    fn process_block(&mut self, buffer: &mut [f32]) -> usize {
        let a = self.first.process_block(buffer);
        let b = self.second.process_block(buffer);
        a.min(b)
    }

    fn reset(&mut self) {
        self.first.reset();
        self.second.reset();
    }
}

impl<A, B> Series<A, B> {
    /// The first stage.
    pub fn first(&self) -> &A {
        &self.first
    }

    /// The first stage, mutably.
    pub fn first_mut(&mut self) -> &mut A {
        &mut self.first
    }

    /// The second stage.
    pub fn second(&self) -> &B {
        &self.second
    }

    /// The second stage, mutably.
    pub fn second_mut(&mut self) -> &mut B {
        &mut self.second
    }
}
