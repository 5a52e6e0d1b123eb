//! Biquad (bi-quadratic) coefficients and the Direct Form I kernel.
//!
//! Coefficient calculation uses the RBJ Audio EQ Cookbook formulas and
//! always yields a set normalized so that `a0 == 1`. Computation is
//! fallible and belongs on a control thread; the per-sample kernel
//! [`df1`] is shared by [`Biquad`] and
//! [`BiquadFilter`](crate::BiquadFilter).

use core::f32::consts::{LN_2, PI};
use libm::{cosf, sinf, sinhf};

use crate::error::FilterError;
use crate::math::db_to_linear;

/// Smallest bandwidth accepted for [`Width::Octaves`], in octaves.
pub const MIN_BANDWIDTH: f32 = 0.1;
/// Largest bandwidth accepted for [`Width::Octaves`], in octaves.
pub const MAX_BANDWIDTH: f32 = 4.0;

/// Response shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterType {
    /// 12 dB/oct low-pass.
    #[default]
    LowPass,
    /// 12 dB/oct high-pass.
    HighPass,
    /// Bell boost/cut around the center frequency (uses gain).
    Peaking,
    /// Unity magnitude, frequency-dependent phase.
    AllPass,
    /// Band-pass with constant 0 dB peak gain.
    BandPass,
}

/// How the filter width is expressed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Width {
    /// Quality factor (0.707 is Butterworth for LP/HP).
    Q(f32),
    /// Bandwidth in octaves, clamped to
    /// [`MIN_BANDWIDTH`]..=[`MAX_BANDWIDTH`].
    Octaves(f32),
}

impl Default for Width {
    fn default() -> Self {
        Width::Q(core::f32::consts::FRAC_1_SQRT_2)
    }
}

/// User-facing filter settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterParams {
    /// Response shape
    pub filter_type: FilterType,
    /// Cutoff or center frequency in Hz
    pub frequency: f32,
    /// Q or bandwidth
    pub width: Width,
    /// Gain in dB (only [`FilterType::Peaking`] uses it)
    pub gain_db: f32,
}

impl FilterParams {
    /// Settings with the default width and 0 dB gain.
    pub fn new(filter_type: FilterType, frequency: f32) -> Self {
        Self {
            filter_type,
            frequency,
            ..Self::default()
        }
    }

    /// Replace the width.
    pub fn with_width(mut self, width: Width) -> Self {
        self.width = width;
        self
    }

    /// Replace the gain.
    pub fn with_gain_db(mut self, gain_db: f32) -> Self {
        self.gain_db = gain_db;
        self
    }
}

impl Default for FilterParams {
    fn default() -> Self {
        Self {
            filter_type: FilterType::LowPass,
            frequency: 1000.0,
            width: Width::default(),
            gain_db: 0.0,
        }
    }
}

/// Biquad coefficients.
///
/// Implements the Direct Form I structure:
/// ```text
/// y[n] = b0*x[n] + b1*x[n-1] + b2*x[n-2]
///                - a1*y[n-1] - a2*y[n-2]
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coeffs {
    /// Feedforward
    pub b0: f32,
    /// Feedforward
    pub b1: f32,
    /// Feedforward
    pub b2: f32,
    /// Feedback (1.0 once normalized)
    pub a0: f32,
    /// Feedback
    pub a1: f32,
    /// Feedback
    pub a2: f32,
}

impl Coeffs {
    /// `y[n] = x[n]`.
    pub const PASSTHROUGH: Coeffs = Coeffs {
        b0: 1.0,
        b1: 0.0,
        b2: 0.0,
        a0: 1.0,
        a1: 0.0,
        a2: 0.0,
    };

    /// Compute normalized coefficients for `params` at `sample_rate`.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError`] for a non-positive sample rate, a frequency
    /// outside `(0, sample_rate / 2)`, a non-positive Q or bandwidth, or a
    /// non-finite gain.
    pub fn compute(params: &FilterParams, sample_rate: f32) -> Result<Coeffs, FilterError> {
        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            return Err(FilterError::SampleRate(sample_rate));
        }
        let nyquist = sample_rate * 0.5;
        let frequency = params.frequency;
        if !(frequency.is_finite() && frequency > 0.0 && frequency < nyquist) {
            return Err(FilterError::Frequency { frequency, nyquist });
        }
        if !params.gain_db.is_finite() {
            return Err(FilterError::Gain(params.gain_db));
        }

        let w0 = 2.0 * PI * frequency / sample_rate;
        let sin_w0 = sinf(w0);
        let cos_w0 = cosf(w0);

        let alpha = match params.width {
            Width::Q(q) => {
                if !(q.is_finite() && q > 0.0) {
                    return Err(FilterError::Q(q));
                }
                sin_w0 / (2.0 * q)
            }
            Width::Octaves(bw) => {
                if !(bw.is_finite() && bw > 0.0) {
                    return Err(FilterError::Bandwidth(bw));
                }
                let bw = bw.clamp(MIN_BANDWIDTH, MAX_BANDWIDTH);
                sin_w0 * sinhf(LN_2 / 2.0 * bw * w0 / sin_w0)
            }
        };

        let mut coeffs = match params.filter_type {
            FilterType::LowPass => {
                let b1 = 1.0 - cos_w0;
                Coeffs {
                    b0: b1 / 2.0,
                    b1,
                    b2: b1 / 2.0,
                    a0: 1.0 + alpha,
                    a1: -2.0 * cos_w0,
                    a2: 1.0 - alpha,
                }
            }
            FilterType::HighPass => {
                let b0 = (1.0 + cos_w0) / 2.0;
                Coeffs {
                    b0,
                    b1: -(1.0 + cos_w0),
                    b2: b0,
                    a0: 1.0 + alpha,
                    a1: -2.0 * cos_w0,
                    a2: 1.0 - alpha,
                }
            }
            FilterType::Peaking => {
                let a = db_to_linear(params.gain_db / 2.0);
                Coeffs {
                    b0: 1.0 + alpha * a,
                    b1: -2.0 * cos_w0,
                    b2: 1.0 - alpha * a,
                    a0: 1.0 + alpha / a,
                    a1: -2.0 * cos_w0,
                    a2: 1.0 - alpha / a,
                }
            }
            FilterType::AllPass => {
                // Numerator is the denominator reversed
                let a0 = 1.0 + alpha;
                let a1 = -2.0 * cos_w0;
                let a2 = 1.0 - alpha;
                Coeffs {
                    b0: a2,
                    b1: a1,
                    b2: a0,
                    a0,
                    a1,
                    a2,
                }
            }
            FilterType::BandPass => Coeffs {
                b0: alpha,
                b1: 0.0,
                b2: -alpha,
                a0: 1.0 + alpha,
                a1: -2.0 * cos_w0,
                a2: 1.0 - alpha,
            },
        };
        coeffs.normalize();

        #[cfg(feature = "tracing")]
        tracing::debug!(?params, sample_rate, ?coeffs, "biquad coefficients computed");

        Ok(coeffs)
    }

    /// Divide every coefficient by `a0`, leaving `a0 == 1`.
    pub fn normalize(&mut self) {
        let a0_inv = 1.0 / self.a0;
        self.b0 *= a0_inv;
        self.b1 *= a0_inv;
        self.b2 *= a0_inv;
        self.a1 *= a0_inv;
        self.a2 *= a0_inv;
        self.a0 = 1.0;
    }

    /// Bitwise equality of every coefficient.
    ///
    /// Unlike `==` this distinguishes `0.0` from `-0.0` and treats identical
    /// NaN payloads as equal, which is what "nothing changed" means for the
    /// processing fast path.
    #[inline]
    pub fn bits_eq(&self, other: &Coeffs) -> bool {
        self.b0.to_bits() == other.b0.to_bits()
            && self.b1.to_bits() == other.b1.to_bits()
            && self.b2.to_bits() == other.b2.to_bits()
            && self.a0.to_bits() == other.a0.to_bits()
            && self.a1.to_bits() == other.a1.to_bits()
            && self.a2.to_bits() == other.a2.to_bits()
    }
}

impl Default for Coeffs {
    fn default() -> Self {
        Self::PASSTHROUGH
    }
}

/// One Direct Form I step.
///
/// `state` is `[x1, x2, y1, y2]`. Coefficients must be normalized.
#[allow(clippy::inline_always)]
#[inline(always)]
pub fn df1(c: &Coeffs, state: &mut [f32; 4], x: f32) -> f32 {
    let y = c.b0 * x + c.b1 * state[0] + c.b2 * state[1] - c.a1 * state[2] - c.a2 * state[3];
    state[1] = state[0];
    state[0] = x;
    state[3] = state[2];
    state[2] = y;
    y
}

/// Single-channel biquad with fixed coefficients.
///
/// The plain reference form: no coefficient interpolation, no cross-thread
/// updates. Useful for offline processing and as the ground truth that
/// [`BiquadFilter`](crate::BiquadFilter)'s fast path must match.
#[derive(Debug, Clone, Default)]
pub struct Biquad {
    coeffs: Coeffs,
    /// x[n-1], x[n-2], y[n-1], y[n-2]
    state: [f32; 4],
}

impl Biquad {
    /// Creates a passthrough biquad.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a biquad with the given coefficients (normalized internally).
    pub fn with_coeffs(mut coeffs: Coeffs) -> Self {
        coeffs.normalize();
        Self {
            coeffs,
            state: [0.0; 4],
        }
    }

    /// Replace the coefficients (normalized internally). State is kept.
    pub fn set_coeffs(&mut self, mut coeffs: Coeffs) {
        coeffs.normalize();
        self.coeffs = coeffs;
    }

    /// Current coefficients.
    pub fn coeffs(&self) -> Coeffs {
        self.coeffs
    }

    /// Processes a single sample.
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        df1(&self.coeffs, &mut self.state, input)
    }

    /// Clears the delay lines.
    pub fn clear(&mut self) {
        self.state = [0.0; 4];
    }
}
