//! Real-time biquad with per-block coefficient interpolation.
//!
//! [`BiquadFilter::new`] returns the RT processor and a [`FilterControl`]
//! handle. The control handle validates settings, computes coefficients and
//! publishes them through a [`latest`](crate::latest) cell. At the start of
//! each block the processor picks up whatever was published last:
//!
//! - **Unchanged** (bit-identical to the committed set): plain Direct Form I
//!   with fixed coefficients.
//! - **Changed**: `a1 a2 b0 b1 b2` are interpolated linearly across the block.
//!   Sample `i` of an `n`-sample block uses fraction `(i + 1) / n`, so the
//!   last sample runs on exactly the new set, which is then committed.
//!
//! Recursive state is flushed to zero once per block when it falls below
//! [`DENORMAL_THRESHOLD`](crate::DENORMAL_THRESHOLD).
//!
//! ```rust
//! use prism_core::{BiquadFilter, FilterParams, FilterType};
//!
//! let params = FilterParams::new(FilterType::LowPass, 800.0);
//! let (mut filter, mut control) = BiquadFilter::new(params, 48000.0).unwrap();
//!
//! let mut block = [1.0_f32; 64];
//! filter.process(&mut block);
//!
//! control.set_frequency(2000.0).unwrap(); // glides over the next block
//! filter.process(&mut block);
//! ```

use crate::biquad::{Coeffs, df1};
use crate::math::{RESET_NUDGE, flush_denormal, lerp};
use crate::realtime::Realtime;

#[cfg(feature = "std")]
use crate::biquad::{FilterParams, FilterType, Width};
#[cfg(feature = "std")]
use crate::error::FilterError;
#[cfg(feature = "std")]
use crate::latest::{Publisher, Subscriber, latest};

/// Audio-thread half of a biquad filter.
///
/// Holds separate DF-I state for mono, left and right so one instance can
/// serve either layout.
pub struct BiquadFilter {
    /// Coefficients the last completed block ended on
    committed: Coeffs,
    /// Coefficients the next block should end on
    target: Coeffs,
    #[cfg(feature = "std")]
    updates: Option<Subscriber<Coeffs>>,
    /// x1, x2, y1, y2
    mono: [f32; 4],
    left: [f32; 4],
    right: [f32; 4],
}

impl BiquadFilter {
    /// Create a processor and its control handle.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError`] if `params` cannot be realized at
    /// `sample_rate`.
    #[cfg(feature = "std")]
    pub fn new(
        params: FilterParams,
        sample_rate: f32,
    ) -> Result<(BiquadFilter, FilterControl), FilterError> {
        let coeffs = Coeffs::compute(&params, sample_rate)?;
        let (publisher, subscriber) = latest(coeffs);
        let mut filter = Self::with_coeffs(coeffs);
        filter.updates = Some(subscriber);
        let control = FilterControl {
            params,
            sample_rate,
            coeffs,
            publisher,
        };
        Ok((filter, control))
    }

    /// Create a standalone processor with no control handle.
    ///
    /// Targets can still be changed from the audio thread with
    /// [`set_target`](Self::set_target).
    pub fn with_coeffs(coeffs: Coeffs) -> Self {
        Self {
            committed: coeffs,
            target: coeffs,
            #[cfg(feature = "std")]
            updates: None,
            mono: [0.0; 4],
            left: [0.0; 4],
            right: [0.0; 4],
        }
    }

    /// Set the coefficients the next block should glide to.
    ///
    /// Must be normalized (`a0 == 1`). Overridden by any value published
    /// through the control handle after this call.
    #[inline]
    pub fn set_target(&mut self, coeffs: Coeffs) {
        self.target = coeffs;
    }

    /// Coefficients the last processed block ended on.
    #[inline]
    pub fn committed(&self) -> Coeffs {
        self.committed
    }

    /// Coefficients the next block will end on.
    #[inline]
    pub fn target(&self) -> Coeffs {
        self.target
    }

    #[inline]
    fn poll_updates(&mut self) {
        #[cfg(feature = "std")]
        if let Some(updates) = self.updates.as_mut() {
            if let Some(coeffs) = updates.latest() {
                self.target = coeffs;
            }
        }
    }

    /// Filter a mono buffer in place.
    ///
    /// An empty buffer is a no-op and commits nothing.
    pub fn process(&mut self, buffer: &mut [f32]) {
        if buffer.is_empty() {
            return;
        }
        self.poll_updates();
        let from = self.committed;
        let to = self.target;
        if from.bits_eq(&to) {
            for s in buffer.iter_mut() {
                *s = df1(&to, &mut self.mono, *s);
            }
        } else {
            let n = buffer.len() as f32;
            for (i, s) in buffer.iter_mut().enumerate() {
                let c = interpolate(&from, &to, (i + 1) as f32 / n);
                *s = df1(&c, &mut self.mono, *s);
            }
            self.committed = to;
        }
        flush_state(&mut self.mono);
    }

    /// Filter a stereo pair in place.
    ///
    /// With `right == None` this is [`process`](Self::process) on `left`
    /// using the mono state. Both channels share one coefficient ramp; only
    /// the common length of the two buffers is processed.
    pub fn process_stereo(&mut self, left: &mut [f32], right: Option<&mut [f32]>) {
        let Some(right) = right else {
            self.process(left);
            return;
        };
        debug_assert_eq!(left.len(), right.len(), "stereo buffers differ in length");
        let len = left.len().min(right.len());
        if len == 0 {
            return;
        }
        self.poll_updates();
        let from = self.committed;
        let to = self.target;
        let frames = left[..len].iter_mut().zip(right[..len].iter_mut());
        if from.bits_eq(&to) {
            for (l, r) in frames {
                *l = df1(&to, &mut self.left, *l);
                *r = df1(&to, &mut self.right, *r);
            }
        } else {
            let n = len as f32;
            for (i, (l, r)) in frames.enumerate() {
                let c = interpolate(&from, &to, (i + 1) as f32 / n);
                *l = df1(&c, &mut self.left, *l);
                *r = df1(&c, &mut self.right, *r);
            }
            self.committed = to;
        }
        flush_state(&mut self.left);
        flush_state(&mut self.right);
    }

    /// Clear filter history.
    ///
    /// State is set to a tiny non-zero value rather than exact zero.
    /// Coefficients are kept.
    pub fn clear(&mut self) {
        self.mono = [RESET_NUDGE; 4];
        self.left = [RESET_NUDGE; 4];
        self.right = [RESET_NUDGE; 4];
    }
}

impl Realtime for BiquadFilter {
    fn process_block(&mut self, buffer: &mut [f32]) -> usize {
        self.process(buffer);
        buffer.len()
    }

    fn reset(&mut self) {
        self.clear();
    }
}

impl core::fmt::Debug for BiquadFilter {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BiquadFilter")
            .field("committed", &self.committed)
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

/// Coefficients at `frac` of the way from `from` to `to`.
///
/// `frac >= 1.0` yields `to` exactly.
#[inline]
fn interpolate(from: &Coeffs, to: &Coeffs, frac: f32) -> Coeffs {
    if frac >= 1.0 {
        return *to;
    }
    Coeffs {
        b0: lerp(from.b0, to.b0, frac),
        b1: lerp(from.b1, to.b1, frac),
        b2: lerp(from.b2, to.b2, frac),
        a0: 1.0,
        a1: lerp(from.a1, to.a1, frac),
        a2: lerp(from.a2, to.a2, frac),
    }
}

#[inline]
fn flush_state(state: &mut [f32; 4]) {
    for v in state.iter_mut() {
        *v = flush_denormal(*v);
    }
}

/// Control-thread half of a biquad filter.
///
/// Every setter recomputes and publishes coefficients. A setter whose new
/// value cannot be realized returns the error and leaves the previous
/// settings (and the published coefficients) unchanged.
#[cfg(feature = "std")]
#[derive(Debug)]
pub struct FilterControl {
    params: FilterParams,
    sample_rate: f32,
    coeffs: Coeffs,
    publisher: Publisher<Coeffs>,
}

#[cfg(feature = "std")]
impl FilterControl {
    /// Validate the current settings, publish their coefficients and return
    /// them.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError`] if the settings cannot be realized; nothing is
    /// published in that case.
    pub fn compute_coefficients(&mut self) -> Result<Coeffs, FilterError> {
        let coeffs = Coeffs::compute(&self.params, self.sample_rate)?;
        self.coeffs = coeffs;
        self.publisher.publish(coeffs);
        #[cfg(feature = "tracing")]
        tracing::debug!(params = ?self.params, "filter coefficients published");
        Ok(coeffs)
    }

    fn apply(&mut self, params: FilterParams) -> Result<(), FilterError> {
        if params == self.params {
            return Ok(());
        }
        let previous = core::mem::replace(&mut self.params, params);
        if let Err(e) = self.compute_coefficients() {
            self.params = previous;
            #[cfg(feature = "tracing")]
            tracing::warn!(error = %e, "filter setting rejected");
            return Err(e);
        }
        Ok(())
    }

    /// Replace all settings at once.
    ///
    /// # Errors
    ///
    /// See [`compute_coefficients`](Self::compute_coefficients).
    pub fn set_params(&mut self, params: FilterParams) -> Result<(), FilterError> {
        self.apply(params)
    }

    /// Set cutoff/center frequency in Hz.
    ///
    /// # Errors
    ///
    /// [`FilterError::Frequency`] outside `(0, nyquist)`.
    pub fn set_frequency(&mut self, hz: f32) -> Result<(), FilterError> {
        self.apply(FilterParams {
            frequency: hz,
            ..self.params
        })
    }

    /// Express width as a Q factor.
    ///
    /// # Errors
    ///
    /// [`FilterError::Q`] for non-positive Q.
    pub fn set_q(&mut self, q: f32) -> Result<(), FilterError> {
        self.apply(FilterParams {
            width: Width::Q(q),
            ..self.params
        })
    }

    /// Express width in octaves (clamped to 0.1..=4.0).
    ///
    /// # Errors
    ///
    /// [`FilterError::Bandwidth`] for non-positive bandwidth.
    pub fn set_bandwidth(&mut self, octaves: f32) -> Result<(), FilterError> {
        self.apply(FilterParams {
            width: Width::Octaves(octaves),
            ..self.params
        })
    }

    /// Set peaking gain in dB.
    ///
    /// # Errors
    ///
    /// [`FilterError::Gain`] for non-finite gain.
    pub fn set_gain_db(&mut self, db: f32) -> Result<(), FilterError> {
        self.apply(FilterParams {
            gain_db: db,
            ..self.params
        })
    }

    /// Change the response shape.
    ///
    /// # Errors
    ///
    /// Only if the other settings are already invalid for the new shape.
    pub fn set_filter_type(&mut self, filter_type: FilterType) -> Result<(), FilterError> {
        self.apply(FilterParams {
            filter_type,
            ..self.params
        })
    }

    /// Current settings.
    pub fn params(&self) -> FilterParams {
        self.params
    }

    /// Cutoff/center frequency in Hz.
    pub fn frequency(&self) -> f32 {
        self.params.frequency
    }

    /// Q, if the width is expressed as Q.
    pub fn q(&self) -> Option<f32> {
        match self.params.width {
            Width::Q(q) => Some(q),
            Width::Octaves(_) => None,
        }
    }

    /// Bandwidth in octaves, if the width is expressed that way.
    pub fn bandwidth(&self) -> Option<f32> {
        match self.params.width {
            Width::Octaves(bw) => Some(bw),
            Width::Q(_) => None,
        }
    }

    /// Peaking gain in dB.
    pub fn gain_db(&self) -> f32 {
        self.params.gain_db
    }

    /// Response shape.
    pub fn filter_type(&self) -> FilterType {
        self.params.filter_type
    }

    /// Sample rate the coefficients are computed for.
    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Last published coefficients.
    pub fn coefficients(&self) -> Coeffs {
        self.coeffs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::biquad::Biquad;

    const SR: f32 = 48000.0;

    fn signal(len: usize) -> alloc::vec::Vec<f32> {
        (0..len).map(|i| libm::sinf(i as f32 * 0.37) * 0.8).collect()
    }

    #[test]
    fn fast_path_matches_reference_bit_for_bit() {
        let params = FilterParams::new(FilterType::LowPass, 1200.0);
        let (mut filter, _control) = BiquadFilter::new(params, SR).unwrap();
        let mut reference = Biquad::with_coeffs(Coeffs::compute(&params, SR).unwrap());

        let input = signal(256);
        let mut block = input.clone();
        filter.process(&mut block[..128]);
        filter.process(&mut block[128..]);
        for (x, y) in input.iter().zip(&block) {
            let r = reference.process(*x);
            assert_eq!(r.to_bits(), y.to_bits());
        }
    }

    #[test]
    fn changed_coefficients_interpolate_over_one_block() {
        let from = Coeffs::compute(&FilterParams::new(FilterType::LowPass, 500.0), SR).unwrap();
        let to = Coeffs::compute(&FilterParams::new(FilterType::LowPass, 4000.0), SR).unwrap();
        let mut filter = BiquadFilter::with_coeffs(from);
        filter.set_target(to);

        let input = signal(64);
        let mut block = input.clone();
        filter.process(&mut block);
        assert!(filter.committed().bits_eq(&to));

        let mut state = [0.0f32; 4];
        let n = input.len() as f32;
        for (i, (x, y)) in input.iter().zip(&block).enumerate() {
            let t = (i + 1) as f32 / n;
            let c = Coeffs {
                b0: from.b0 + (to.b0 - from.b0) * t,
                b1: from.b1 + (to.b1 - from.b1) * t,
                b2: from.b2 + (to.b2 - from.b2) * t,
                a0: 1.0,
                a1: from.a1 + (to.a1 - from.a1) * t,
                a2: from.a2 + (to.a2 - from.a2) * t,
            };
            let r = df1(&c, &mut state, *x);
            assert!((r - y).abs() < 1e-5, "sample {i}: {r} vs {y}");
        }

        // Next block runs the fast path on the committed set
        let mut next = signal(8);
        let before = filter.committed();
        filter.process(&mut next);
        assert!(filter.committed().bits_eq(&before));
    }

    #[test]
    fn empty_block_commits_nothing() {
        let from = Coeffs::PASSTHROUGH;
        let to = Coeffs::compute(&FilterParams::default(), SR).unwrap();
        let mut filter = BiquadFilter::with_coeffs(from);
        filter.set_target(to);
        let mut left: [f32; 0] = [];
        let mut right: [f32; 0] = [];
        filter.process(&mut left);
        assert!(filter.committed().bits_eq(&from));
        filter.process_stereo(&mut left, Some(&mut right[..]));
        assert!(filter.committed().bits_eq(&from));
    }

    #[test]
    fn control_publish_reaches_filter() {
        let (mut filter, mut control) =
            BiquadFilter::new(FilterParams::new(FilterType::HighPass, 200.0), SR).unwrap();
        control.set_frequency(400.0).unwrap();
        let expected = control.coefficients();
        let mut block = [0.0f32; 32];
        filter.process(&mut block);
        assert!(filter.committed().bits_eq(&expected));
    }

    #[test]
    fn rejected_setting_keeps_previous() {
        let (_filter, mut control) = BiquadFilter::new(FilterParams::default(), SR).unwrap();
        let before = control.coefficients();
        assert!(control.set_frequency(SR).is_err());
        assert_eq!(control.frequency(), 1000.0);
        assert!(control.coefficients().bits_eq(&before));
        assert!(control.set_q(-1.0).is_err());
        assert!(control.q().is_some());
        control.set_bandwidth(2.0).unwrap();
        assert_eq!(control.bandwidth(), Some(2.0));
        assert_eq!(control.q(), None);
    }

    #[test]
    fn stereo_none_uses_mono_state() {
        let c = Coeffs::compute(&FilterParams::default(), SR).unwrap();
        let mut a = BiquadFilter::with_coeffs(c);
        let mut b = BiquadFilter::with_coeffs(c);
        let mut x = signal(32);
        let mut y = x.clone();
        a.process(&mut x);
        b.process_stereo(&mut y, None);
        assert_eq!(x, y);
        assert_eq!(a.mono, b.mono);
    }

    #[test]
    fn stereo_channels_are_independent() {
        let c = Coeffs::compute(&FilterParams::default(), SR).unwrap();
        let mut filter = BiquadFilter::with_coeffs(c);
        let mut left = signal(32);
        let mut right = [0.0f32; 32];
        filter.process_stereo(&mut left, Some(&mut right));
        assert!(right.iter().all(|&s| s == 0.0));
        assert!(left.iter().any(|&s| s != 0.0));
    }

    #[test]
    fn state_is_flushed_after_block() {
        let mut filter = BiquadFilter::with_coeffs(Coeffs::PASSTHROUGH);
        let mut block = [1e-30f32; 4];
        filter.process(&mut block);
        assert_eq!(filter.mono, [0.0; 4]);
    }

    #[test]
    fn reset_nudges_state() {
        let mut filter = BiquadFilter::with_coeffs(Coeffs::PASSTHROUGH);
        let mut block = [0.5f32; 4];
        filter.process(&mut block);
        Realtime::reset(&mut filter);
        assert_eq!(filter.mono, [RESET_NUDGE; 4]);
        assert_eq!(filter.left, [RESET_NUDGE; 4]);
    }
}
