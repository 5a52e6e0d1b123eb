//! Error types for construction and off-thread computation.
//!
//! Nothing on the real-time path returns these. They surface only when a
//! ring is built or when filter coefficients are computed on a control
//! thread.

use core::fmt;

/// Ring construction failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RingError {
    /// A ring needs at least one slot.
    ZeroCapacity,
    /// The requested capacity has no representable power-of-two size.
    CapacityOverflow(usize),
}

impl fmt::Display for RingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroCapacity => write!(f, "ring capacity must be at least 1"),
            Self::CapacityOverflow(n) => {
                write!(f, "ring capacity {n} has no power-of-two slot count")
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for RingError {}

/// Biquad coefficient computation failures.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FilterError {
    /// Frequency must be finite and strictly between 0 and Nyquist.
    Frequency {
        /// Requested center/cutoff frequency in Hz
        frequency: f32,
        /// Nyquist frequency for the sample rate in use
        nyquist: f32,
    },
    /// Q must be finite and positive.
    Q(f32),
    /// Bandwidth in octaves must be finite and positive.
    Bandwidth(f32),
    /// Gain in dB must be finite.
    Gain(f32),
    /// Sample rate must be finite and positive.
    SampleRate(f32),
}

impl fmt::Display for FilterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Frequency { frequency, nyquist } => {
                write!(f, "frequency {frequency} Hz outside (0, {nyquist}) Hz")
            }
            Self::Q(q) => write!(f, "Q must be positive, got {q}"),
            Self::Bandwidth(bw) => write!(f, "bandwidth must be positive, got {bw} octaves"),
            Self::Gain(g) => write!(f, "gain must be finite, got {g} dB"),
            Self::SampleRate(sr) => write!(f, "sample rate must be positive, got {sr} Hz"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for FilterError {}
