//! Mathematical utility functions for the real-time path.
//!
//! All functions are allocation-free and suitable for `no_std`.
//!
//! # Time Conversions
//!
//! - [`ms_to_samples`] / [`samples_to_ms`] - Rounded integer sample counts
//!
//! # Denormal Handling
//!
//! - [`flush_denormal`] - Snap tiny values to exactly zero
//! - [`DENORMAL_THRESHOLD`] / [`RESET_NUDGE`] - The constants behind it
//!
//! # Utilities
//!
//! - [`lerp`] - Linear interpolation
//! - [`db_to_linear`] - Decibel to amplitude

use libm::{expf, roundf};

/// Magnitude below which filter state is treated as denormal and flushed.
pub const DENORMAL_THRESHOLD: f32 = 1e-20;

/// Value written into cleared filter state instead of exact zero.
///
/// Sits above [`DENORMAL_THRESHOLD`] so the first block after a reset
/// does not start from the subnormal-prone region.
pub const RESET_NUDGE: f32 = 1e-18;

/// Convert decibels to linear gain.
///
/// # Example
/// ```rust
/// use prism_core::db_to_linear;
///
/// assert!((db_to_linear(0.0) - 1.0).abs() < 0.001);
/// assert!((db_to_linear(-6.02) - 0.5).abs() < 0.01);
/// ```
#[inline]
pub fn db_to_linear(db: f32) -> f32 {
    // 10^(dB/20) = e^(dB * ln(10)/20)
    const FACTOR: f32 = core::f32::consts::LN_10 / 20.0;
    expf(db * FACTOR)
}

/// Linear interpolation between two values.
///
/// # Arguments
/// * `a` - Start value (at t=0)
/// * `b` - End value (at t=1)
/// * `t` - Interpolation factor (0.0 to 1.0)
#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Convert milliseconds to a whole number of samples.
///
/// Rounds to the nearest sample. Negative and non-finite inputs give 0.
///
/// ```rust
/// use prism_core::ms_to_samples;
///
/// assert_eq!(ms_to_samples(10.0, 48000.0), 480);
/// assert_eq!(ms_to_samples(-3.0, 48000.0), 0);
/// ```
#[inline]
pub fn ms_to_samples(ms: f32, sample_rate: f32) -> u32 {
    let samples = roundf(ms * sample_rate / 1000.0);
    if samples.is_finite() && samples > 0.0 {
        // Saturating float->int cast
        samples as u32
    } else {
        0
    }
}

/// Convert a sample count back to milliseconds.
#[inline]
pub fn samples_to_ms(samples: u32, sample_rate: f32) -> f32 {
    if sample_rate <= 0.0 {
        return 0.0;
    }
    samples as f32 * 1000.0 / sample_rate
}

/// Flush subnormal (denormalized) floats to zero.
///
/// Subnormal floats cause severe CPU slowdowns on many architectures.
/// Values with magnitude below [`DENORMAL_THRESHOLD`] are replaced with
/// zero, leaving margin before the IEEE 754 subnormal range begins.
///
/// Used on recursive filter state once per block.
#[allow(clippy::inline_always)]
#[inline(always)]
pub fn flush_denormal(x: f32) -> f32 {
    if x.abs() < DENORMAL_THRESHOLD { 0.0 } else { x }
}
