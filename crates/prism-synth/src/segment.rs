//! One envelope phase driven by a [`Curve`].
//!
//! A [`Segment`] blends a start level into an end level over an integer
//! number of samples. Progress is `position / length` with an integer
//! position, so a segment of length `N` completes after exactly `N` samples
//! regardless of float rounding. Level edits glide through a pair of
//! [`Ramp`]s instead of stepping.
//!
//! A live length edit does not rewind. The curve restarts from the level
//! the segment last emitted and covers the rest of the new length, so the
//! output never jumps.

use prism_core::{Curve, Ramp};

/// Envelope stage tags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Stage {
    /// Envelope is inactive, output is zero. Also "built wholesale" for
    /// [`EnvelopeSpec::changed`](crate::EnvelopeSpec::changed).
    #[default]
    Idle = 0,
    /// Rising from the re-entry level to full scale.
    Attack = 1,
    /// Falling from full scale toward the sustain level.
    Decay = 2,
    /// Holding the sustain level while the gate is held.
    Sustain = 3,
    /// Falling from the audible level to zero after gate release.
    Release = 4,
}

impl Stage {
    /// Decode from the `u8` representation; unknown values map to `Idle`.
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => Stage::Attack,
            2 => Stage::Decay,
            3 => Stage::Sustain,
            4 => Stage::Release,
            _ => Stage::Idle,
        }
    }

    /// Short display name.
    pub fn name(self) -> &'static str {
        match self {
            Stage::Idle => "idle",
            Stage::Attack => "attack",
            Stage::Decay => "decay",
            Stage::Sustain => "sustain",
            Stage::Release => "release",
        }
    }
}

impl core::fmt::Display for Stage {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.pad(self.name())
    }
}

/// A reusable envelope segment.
///
/// States run `armed -> running -> complete`. Re-arming never allocates.
#[derive(Debug, Clone)]
pub struct Segment {
    stage: Stage,
    curve: Curve,
    /// Finite length in samples (ignored when infinite)
    total: u32,
    infinite: bool,
    /// Samples emitted since arming, `0..=total`
    pos: u32,
    /// Position the curve restarted from after a retune
    origin: u32,
    /// Last value returned by `next`
    last: f32,
    /// Logical levels, clamped to [0, 1]
    start: f32,
    end: f32,
    start_ramp: Ramp,
    end_ramp: Ramp,
    complete: bool,
}

impl Segment {
    /// Create a completed segment; arm it with [`set_length`](Self::set_length)
    /// or [`set_infinite`](Self::set_infinite).
    ///
    /// Levels are clamped to `[0, 1]`. `smoothing` is the ramp window for
    /// level edits in samples (at least 1).
    pub fn new(stage: Stage, curve: Curve, start: f32, end: f32, smoothing: u32) -> Self {
        let start = clamp_level(start);
        let end = clamp_level(end);
        let mut start_ramp = Ramp::new(smoothing);
        let mut end_ramp = Ramp::new(smoothing);
        start_ramp.reset(start);
        end_ramp.reset(end);
        Self {
            stage,
            curve,
            total: 0,
            infinite: false,
            pos: 0,
            origin: 0,
            last: start,
            start,
            end,
            start_ramp,
            end_ramp,
            complete: true,
        }
    }

    /// Arm a finite run of `length` samples. `0` completes immediately.
    ///
    /// Rewinds to position 0 and snaps both ramps to the logical levels.
    pub fn set_length(&mut self, length: u32) {
        self.total = length;
        self.infinite = false;
        self.pos = 0;
        self.origin = 0;
        self.complete = length == 0;
        self.sync_ramps();
    }

    /// Arm an open-ended run (sustain). Never completes on its own.
    pub fn set_infinite(&mut self) {
        self.infinite = true;
        self.pos = 0;
        self.origin = 0;
        self.complete = false;
        self.sync_ramps();
    }

    /// Change a running segment's length without rewinding.
    ///
    /// Returns the change in the number of samples this run will emit:
    ///
    /// - infinite or already complete: nothing changes, returns 0
    /// - new length at or below the current position: completes now
    /// - otherwise the run continues to the new length. A run that has
    ///   already started restarts its curve from the last emitted level.
    pub fn retune(&mut self, length: u32) -> i64 {
        if self.infinite || self.complete {
            return 0;
        }
        let old = i64::from(self.total);
        if length <= self.pos {
            self.total = self.pos;
            self.complete = true;
        } else {
            self.total = length;
            if self.pos > 0 {
                self.origin = self.pos;
                self.rebase(self.last);
            }
        }
        i64::from(self.total) - old
    }

    /// Rewind to position 0 and snap both ramps to the logical levels.
    pub fn reset(&mut self) {
        self.pos = 0;
        self.origin = 0;
        self.complete = !self.infinite && self.total == 0;
        self.sync_ramps();
    }

    /// Glide the start level to `level` over the smoothing window.
    pub fn set_start_level(&mut self, level: f32) {
        self.start = clamp_level(level);
        self.start_ramp.set(self.start);
    }

    /// Glide the end level to `level` over the smoothing window.
    pub fn set_end_level(&mut self, level: f32) {
        self.end = clamp_level(level);
        self.end_ramp.set(self.end);
    }

    /// Set the start level and jump to it with no glide.
    pub fn rebase(&mut self, level: f32) {
        self.start = clamp_level(level);
        self.start_ramp.reset(self.start);
    }

    /// Continue from `level` after the segment before this one was cut
    /// short.
    ///
    /// A finite segment starts its curve exactly at `level`. An infinite one
    /// glides from `level` to its level over the smoothing window.
    pub fn enter_from(&mut self, level: f32) {
        let level = clamp_level(level);
        if self.infinite {
            self.start_ramp.reset(level);
            self.start_ramp.set(self.start);
            self.end_ramp.reset(level);
            self.end_ramp.set(self.end);
        } else {
            self.rebase(level);
        }
    }

    /// Change the ramp window for subsequent level edits.
    pub fn set_smoothing(&mut self, samples: u32) {
        self.start_ramp.set_length(samples);
        self.end_ramp.set_length(samples);
    }

    /// Advance one sample.
    ///
    /// A complete segment returns its end level without advancing.
    #[inline]
    pub fn next(&mut self) -> f32 {
        if self.complete {
            return self.end;
        }
        let cur_start = self.start_ramp.next();
        let cur_end = self.end_ramp.next();
        if self.infinite {
            self.last = cur_end;
            return cur_end;
        }

        let progress = (self.pos - self.origin) as f32 / (self.total - self.origin) as f32;
        let c = self.curve.apply(progress);
        let out = c * cur_start + (1.0 - c) * cur_end;
        self.last = out;

        self.pos += 1;
        if self.pos >= self.total {
            self.pos = self.total;
            self.complete = true;
        }
        out
    }

    /// Whether a finite run has finished. Always false for infinite runs.
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.complete && !self.infinite
    }

    /// Whether the segment is armed as an open-ended run.
    #[inline]
    pub fn is_infinite(&self) -> bool {
        self.infinite
    }

    /// Samples emitted since the segment was armed.
    #[inline]
    pub fn position(&self) -> u32 {
        self.pos
    }

    /// Finite length in samples, `None` when infinite.
    #[inline]
    pub fn len(&self) -> Option<u32> {
        (!self.infinite).then_some(self.total)
    }

    /// Stage tag.
    #[inline]
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Logical start level.
    pub fn start_level(&self) -> f32 {
        self.start
    }

    /// Logical end level.
    pub fn end_level(&self) -> f32 {
        self.end
    }

    fn sync_ramps(&mut self) {
        self.start_ramp.reset(self.start);
        self.end_ramp.reset(self.end);
    }
}

/// Clamp to [0, 1]; NaN becomes 0.
#[inline]
pub(crate) fn clamp_level(level: f32) -> f32 {
    if level.is_nan() { 0.0 } else { level.clamp(0.0, 1.0) }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear(length: u32) -> Segment {
        let mut seg = Segment::new(Stage::Attack, Curve::Linear, 0.0, 1.0, 4);
        seg.set_length(length);
        seg
    }

    #[test]
    fn new_segment_is_complete() {
        let mut seg = Segment::new(Stage::Decay, Curve::Exponential, 1.0, 0.3, 4);
        assert!(seg.is_complete());
        assert_eq!(seg.next(), 0.3);
    }

    #[test]
    fn completes_after_exactly_length_samples() {
        let mut seg = linear(10);
        let values: Vec<f32> = (0..10).map(|_| seg.next()).collect();
        assert!(seg.is_complete());
        assert_eq!(seg.position(), 10);
        for (i, v) in values.iter().enumerate() {
            assert!((v - i as f32 / 10.0).abs() < 1e-6);
        }
    }

    #[test]
    fn zero_length_completes_immediately() {
        let mut seg = linear(5);
        seg.set_length(0);
        assert!(seg.is_complete());
        seg.reset();
        assert!(seg.is_complete());
    }

    #[test]
    fn infinite_returns_end_level_forever() {
        let mut seg = Segment::new(Stage::Sustain, Curve::Sustain, 0.5, 0.5, 4);
        seg.set_infinite();
        for _ in 0..1000 {
            assert_eq!(seg.next(), 0.5);
        }
        assert!(!seg.is_complete());
        assert_eq!(seg.len(), None);
    }

    #[test]
    fn levels_are_clamped() {
        let seg = Segment::new(Stage::Decay, Curve::Linear, 3.0, -1.0, 1);
        assert_eq!(seg.start_level(), 1.0);
        assert_eq!(seg.end_level(), 0.0);
        assert_eq!(clamp_level(f32::NAN), 0.0);
    }

    #[test]
    fn end_level_edits_glide() {
        let mut seg = Segment::new(Stage::Sustain, Curve::Sustain, 0.5, 0.5, 4);
        seg.set_infinite();
        seg.set_end_level(1.0);
        let values: Vec<f32> = (0..5).map(|_| seg.next()).collect();
        assert_eq!(values, vec![0.625, 0.75, 0.875, 1.0, 1.0]);
    }

    #[test]
    fn rebase_snaps_start() {
        let mut seg = linear(4);
        seg.rebase(0.8);
        assert_eq!(seg.next(), 0.8);
    }

    #[test]
    fn retune_extends_and_shortens() {
        let mut seg = linear(10);
        for _ in 0..4 {
            seg.next();
        }
        assert_eq!(seg.retune(20), 10);
        assert_eq!(seg.len(), Some(20));
        assert_eq!(seg.position(), 4);

        // Shorter than the position: completes now at the position
        assert_eq!(seg.retune(2), -16);
        assert!(seg.is_complete());
        assert_eq!(seg.len(), Some(4));

        // Completed runs are not re-armed
        assert_eq!(seg.retune(50), 0);
        assert!(seg.is_complete());
    }

    #[test]
    fn retune_restarts_curve_from_last_level() {
        let mut seg = linear(10);
        let mut last = 0.0;
        for _ in 0..5 {
            last = seg.next();
        }
        assert_eq!(seg.retune(15), 5);
        assert_eq!(seg.next(), last);
        // Remaining ten samples climb to the end level
        let rest: Vec<f32> = (0..9).map(|_| seg.next()).collect();
        assert!(rest.windows(2).all(|w| w[1] > w[0]));
        assert!(seg.is_complete());
        assert_eq!(seg.position(), 15);
    }

    #[test]
    fn retune_before_start_keeps_levels() {
        let mut seg = linear(10);
        assert_eq!(seg.retune(4), -6);
        assert_eq!(seg.next(), 0.0);
    }

    #[test]
    fn enter_from_finite_starts_at_level() {
        let mut seg = Segment::new(Stage::Decay, Curve::Exponential, 1.0, 0.5, 4);
        seg.set_length(10);
        seg.enter_from(0.3);
        assert_eq!(seg.next(), 0.3);
    }

    #[test]
    fn enter_from_infinite_glides_to_level() {
        let mut seg = Segment::new(Stage::Sustain, Curve::Sustain, 0.5, 0.5, 4);
        seg.set_infinite();
        seg.enter_from(0.9);
        let values: Vec<f32> = (0..5).map(|_| seg.next()).collect();
        for (got, want) in values.iter().zip([0.8, 0.7, 0.6, 0.5, 0.5]) {
            assert!((got - want).abs() < 1e-6, "{got} vs {want}");
        }
        assert_eq!(values[4], 0.5);
    }

    #[test]
    fn retune_to_position_completes() {
        let mut seg = linear(10);
        for _ in 0..3 {
            seg.next();
        }
        assert_eq!(seg.retune(3), -7);
        assert!(seg.is_complete());
    }

    #[test]
    fn retune_infinite_is_noop() {
        let mut seg = Segment::new(Stage::Sustain, Curve::Sustain, 0.5, 0.5, 4);
        seg.set_infinite();
        assert_eq!(seg.retune(3), 0);
        assert!(seg.is_infinite());
    }

    #[test]
    fn stage_roundtrip() {
        for stage in [
            Stage::Idle,
            Stage::Attack,
            Stage::Decay,
            Stage::Sustain,
            Stage::Release,
        ] {
            assert_eq!(Stage::from_u8(stage as u8), stage);
        }
        assert_eq!(Stage::from_u8(200), Stage::Idle);
        assert_eq!(Stage::Release.to_string(), "release");
    }
}
