//! Progress shapes for envelope segments.

use libm::expf;

/// Steepness of [`Curve::Exponential`].
///
/// Useful range is roughly 2.5 (slower) to 4.0 (faster).
pub const EXP_POLE: f32 = 3.0;

/// Maps segment progress in `[0, 1]` to a start-level weight.
///
/// A segment blends its levels as `c * start + (1 - c) * end` where
/// `c = curve.apply(progress)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Curve {
    /// `1 - progress`: straight line from start to end.
    #[default]
    Linear,
    /// `exp(-3 * progress)`: fast initial movement that slows toward the end.
    ///
    /// Does not reach the end level at progress 1.0 (`exp(-3) ≈ 0.05`);
    /// segment completion supplies the last step.
    Exponential,
    /// Always 1: holds the start level.
    Sustain,
}

impl Curve {
    /// Start-level weight for the given progress.
    #[inline]
    pub fn apply(self, progress: f32) -> f32 {
        match self {
            Curve::Linear => 1.0 - progress,
            Curve::Exponential => expf(-EXP_POLE * progress),
            Curve::Sustain => 1.0,
        }
    }
}
