//! Immutable envelope timing descriptions.
//!
//! An [`EnvelopeSpec`] is the unit of exchange between the control thread
//! and the audio thread: every edit builds a new spec and publishes it
//! wholesale. Sample counts are the source of truth; percent and
//! millisecond views are derived from them.
//!
//! ## Units
//!
//! | Input | Conversion |
//! |-------|-----------|
//! | Percent | `0` maps to 0 samples; otherwise `round(pct/100 * max_ms * sr/1000)`, at least 1 |
//! | Milliseconds | `round(ms * sr / 1000)`, negatives map to 0 |
//! | Samples | taken as-is |
//!
//! Percent ranges are relative to [`MAX_ATTACK_MS`], [`MAX_DECAY_MS`] and
//! [`MAX_RELEASE_MS`]. All inputs clamp rather than fail.

use libm::roundf;
use prism_core::{ms_to_samples, samples_to_ms};

use crate::segment::{Stage, clamp_level};

/// Attack time at 100 %.
pub const MAX_ATTACK_MS: f32 = 127.0;
/// Decay time at 100 %.
pub const MAX_DECAY_MS: f32 = 888.0;
/// Release time at 100 %.
pub const MAX_RELEASE_MS: f32 = 999.0;

/// Default attack, in percent of [`MAX_ATTACK_MS`].
pub const DEFAULT_ATTACK_PCT: f32 = 5.0;
/// Default decay, in percent of [`MAX_DECAY_MS`].
pub const DEFAULT_DECAY_PCT: f32 = 100.0;
/// Default window for level glides and retrigger smoothing.
pub const DEFAULT_SMOOTHING_MS: f32 = 7.0;

/// Convert a 0..=100 percent of `max_ms` to samples.
///
/// `0` (and anything that clamps to it) is instant; any other percent is at
/// least one sample.
pub fn percent_to_samples(pct: f32, max_ms: f32, sample_rate: f32) -> u32 {
    let pct = clamp_percent(pct);
    if pct == 0.0 {
        return 0;
    }
    ms_to_samples(pct / 100.0 * max_ms, sample_rate).max(1)
}

/// Convert samples back to a whole 0..=100 percent of `max_ms`.
pub fn samples_to_percent(samples: u32, max_ms: f32, sample_rate: f32) -> f32 {
    let max_samples = max_ms * sample_rate / 1000.0;
    if !(max_samples > 0.0) {
        return 0.0;
    }
    roundf(samples as f32 / max_samples * 100.0).clamp(0.0, 100.0)
}

fn clamp_percent(pct: f32) -> f32 {
    if pct.is_nan() { 0.0 } else { pct.clamp(0.0, 100.0) }
}

/// Percent-based envelope settings, as a UI presents them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stamp {
    /// Attack, percent of [`MAX_ATTACK_MS`]
    pub attack: f32,
    /// Decay, percent of [`MAX_DECAY_MS`]
    pub decay: f32,
    /// Sustain level, percent of full scale
    pub sustain: f32,
    /// Release, percent of [`MAX_RELEASE_MS`]
    pub release: f32,
}

/// Millisecond-based envelope settings, the canonical stored form.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Millis {
    /// Attack time
    pub attack_ms: f32,
    /// Decay time
    pub decay_ms: f32,
    /// Sustain level, 0..=1
    pub sustain: f32,
    /// Release time
    pub release_ms: f32,
}

impl Millis {
    /// Attack/decay only.
    pub fn percussive(attack_ms: f32, decay_ms: f32) -> Self {
        Self {
            attack_ms,
            decay_ms,
            sustain: 0.0,
            release_ms: 0.0,
        }
    }
}

/// Immutable envelope timing.
///
/// Sustain is always within `[0, 1]` (NaN becomes 0). `changed` names the
/// field edited last, or [`Stage::Idle`] when the spec was built wholesale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnvelopeSpec {
    attack_samples: u32,
    decay_samples: u32,
    sustain_level: f32,
    release_samples: u32,
    changed: Stage,
}

impl EnvelopeSpec {
    /// Build from sample counts.
    pub fn new(
        attack_samples: u32,
        decay_samples: u32,
        sustain_level: f32,
        release_samples: u32,
    ) -> Self {
        Self {
            attack_samples,
            decay_samples,
            sustain_level: clamp_level(sustain_level),
            release_samples,
            changed: Stage::Idle,
        }
    }

    /// Attack/decay envelope from percents (no sustain, no release).
    pub fn percussive(attack_pct: f32, decay_pct: f32, sample_rate: f32) -> Self {
        Self::new(
            percent_to_samples(attack_pct, MAX_ATTACK_MS, sample_rate),
            percent_to_samples(decay_pct, MAX_DECAY_MS, sample_rate),
            0.0,
            0,
        )
    }

    /// The default envelope: 5 % attack, 100 % decay, no sustain or release.
    pub fn default_at(sample_rate: f32) -> Self {
        Self::percussive(DEFAULT_ATTACK_PCT, DEFAULT_DECAY_PCT, sample_rate)
    }

    /// Build from UI percents.
    pub fn from_percent(stamp: Stamp, sample_rate: f32) -> Self {
        Self::new(
            percent_to_samples(stamp.attack, MAX_ATTACK_MS, sample_rate),
            percent_to_samples(stamp.decay, MAX_DECAY_MS, sample_rate),
            clamp_percent(stamp.sustain) / 100.0,
            percent_to_samples(stamp.release, MAX_RELEASE_MS, sample_rate),
        )
    }

    /// Build from milliseconds.
    pub fn from_millis(millis: Millis, sample_rate: f32) -> Self {
        Self::new(
            ms_to_samples(millis.attack_ms, sample_rate),
            ms_to_samples(millis.decay_ms, sample_rate),
            millis.sustain,
            ms_to_samples(millis.release_ms, sample_rate),
        )
    }

    /// Percent view (whole percents).
    pub fn to_percent(&self, sample_rate: f32) -> Stamp {
        Stamp {
            attack: samples_to_percent(self.attack_samples, MAX_ATTACK_MS, sample_rate),
            decay: samples_to_percent(self.decay_samples, MAX_DECAY_MS, sample_rate),
            sustain: roundf(self.sustain_level * 100.0),
            release: samples_to_percent(self.release_samples, MAX_RELEASE_MS, sample_rate),
        }
    }

    /// Millisecond view.
    pub fn to_millis(&self, sample_rate: f32) -> Millis {
        Millis {
            attack_ms: samples_to_ms(self.attack_samples, sample_rate),
            decay_ms: samples_to_ms(self.decay_samples, sample_rate),
            sustain: self.sustain_level,
            release_ms: samples_to_ms(self.release_samples, sample_rate),
        }
    }

    /// Replace the attack length.
    pub fn with_attack_samples(self, samples: u32) -> Self {
        Self {
            attack_samples: samples,
            ..self
        }
    }

    /// Replace the decay length.
    pub fn with_decay_samples(self, samples: u32) -> Self {
        Self {
            decay_samples: samples,
            ..self
        }
    }

    /// Replace the sustain level (clamped).
    pub fn with_sustain(self, level: f32) -> Self {
        Self {
            sustain_level: clamp_level(level),
            ..self
        }
    }

    /// Replace the release length.
    pub fn with_release_samples(self, samples: u32) -> Self {
        Self {
            release_samples: samples,
            ..self
        }
    }

    /// Tag the spec with the stage whose field was edited.
    pub fn with_changed(self, changed: Stage) -> Self {
        Self { changed, ..self }
    }

    /// Attack from percent; tags [`Stage::Attack`].
    pub fn with_attack_percent(self, pct: f32, sample_rate: f32) -> Self {
        self.with_attack_samples(percent_to_samples(pct, MAX_ATTACK_MS, sample_rate))
            .with_changed(Stage::Attack)
    }

    /// Decay from percent; tags [`Stage::Decay`].
    pub fn with_decay_percent(self, pct: f32, sample_rate: f32) -> Self {
        self.with_decay_samples(percent_to_samples(pct, MAX_DECAY_MS, sample_rate))
            .with_changed(Stage::Decay)
    }

    /// Sustain from percent of full scale; tags [`Stage::Sustain`].
    pub fn with_sustain_percent(self, pct: f32) -> Self {
        self.with_sustain(clamp_percent(pct) / 100.0)
            .with_changed(Stage::Sustain)
    }

    /// Release from percent; tags [`Stage::Release`].
    pub fn with_release_percent(self, pct: f32, sample_rate: f32) -> Self {
        self.with_release_samples(percent_to_samples(pct, MAX_RELEASE_MS, sample_rate))
            .with_changed(Stage::Release)
    }

    /// Attack from milliseconds; tags [`Stage::Attack`].
    pub fn with_attack_ms(self, ms: f32, sample_rate: f32) -> Self {
        self.with_attack_samples(ms_to_samples(ms, sample_rate))
            .with_changed(Stage::Attack)
    }

    /// Decay from milliseconds; tags [`Stage::Decay`].
    pub fn with_decay_ms(self, ms: f32, sample_rate: f32) -> Self {
        self.with_decay_samples(ms_to_samples(ms, sample_rate))
            .with_changed(Stage::Decay)
    }

    /// Release from milliseconds; tags [`Stage::Release`].
    pub fn with_release_ms(self, ms: f32, sample_rate: f32) -> Self {
        self.with_release_samples(ms_to_samples(ms, sample_rate))
            .with_changed(Stage::Release)
    }

    /// Attack length in samples.
    #[inline]
    pub fn attack_samples(&self) -> u32 {
        self.attack_samples
    }

    /// Decay length in samples.
    #[inline]
    pub fn decay_samples(&self) -> u32 {
        self.decay_samples
    }

    /// Sustain level, 0..=1.
    #[inline]
    pub fn sustain_level(&self) -> f32 {
        self.sustain_level
    }

    /// Release length in samples.
    #[inline]
    pub fn release_samples(&self) -> u32 {
        self.release_samples
    }

    /// Stage whose field was edited last.
    #[inline]
    pub fn changed(&self) -> Stage {
        self.changed
    }

    /// Whether this spec holds a sustain stage.
    #[inline]
    pub fn has_sustain(&self) -> bool {
        self.sustain_level > 0.0
    }

    /// Whether this spec has a release stage. Requires sustain.
    #[inline]
    pub fn has_release(&self) -> bool {
        self.has_sustain() && self.release_samples > 0
    }

    /// Attack plus decay, in samples.
    #[inline]
    pub fn sum(&self) -> u64 {
        u64::from(self.attack_samples) + u64::from(self.decay_samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f32 = 48000.0;

    #[test]
    fn percent_conversion_bounds() {
        assert_eq!(percent_to_samples(0.0, MAX_ATTACK_MS, SR), 0);
        assert_eq!(percent_to_samples(-5.0, MAX_ATTACK_MS, SR), 0);
        assert_eq!(percent_to_samples(f32::NAN, MAX_ATTACK_MS, SR), 0);
        assert_eq!(percent_to_samples(100.0, MAX_ATTACK_MS, SR), 6096);
        assert_eq!(percent_to_samples(250.0, MAX_ATTACK_MS, SR), 6096);
        // Tiny but non-zero percent is never instant
        assert_eq!(percent_to_samples(0.0001, MAX_ATTACK_MS, SR), 1);
    }

    #[test]
    fn percent_roundtrip_whole_values() {
        for pct in [1.0, 5.0, 33.0, 50.0, 99.0, 100.0] {
            let samples = percent_to_samples(pct, MAX_DECAY_MS, SR);
            assert_eq!(samples_to_percent(samples, MAX_DECAY_MS, SR), pct);
        }
        assert_eq!(samples_to_percent(u32::MAX, MAX_DECAY_MS, SR), 100.0);
        assert_eq!(samples_to_percent(10, MAX_DECAY_MS, 0.0), 0.0);
    }

    #[test]
    fn default_is_percussive() {
        let spec = EnvelopeSpec::default_at(SR);
        assert_eq!(spec.attack_samples(), 305); // 6.35 ms
        assert_eq!(spec.decay_samples(), 42624); // 888 ms
        assert_eq!(spec.sustain_level(), 0.0);
        assert_eq!(spec.release_samples(), 0);
        assert!(!spec.has_sustain());
        assert!(!spec.has_release());
    }

    #[test]
    fn sustain_is_clamped_everywhere() {
        assert_eq!(EnvelopeSpec::new(1, 1, 2.0, 1).sustain_level(), 1.0);
        assert_eq!(EnvelopeSpec::new(1, 1, f32::NAN, 1).sustain_level(), 0.0);
        let spec = EnvelopeSpec::new(1, 1, 0.5, 1);
        assert_eq!(spec.with_sustain(-1.0).sustain_level(), 0.0);
        assert_eq!(spec.with_sustain_percent(150.0).sustain_level(), 1.0);
        let millis = Millis {
            attack_ms: 1.0,
            decay_ms: 1.0,
            sustain: 7.0,
            release_ms: 1.0,
        };
        assert_eq!(EnvelopeSpec::from_millis(millis, SR).sustain_level(), 1.0);
    }

    #[test]
    fn millis_conversion() {
        let spec = EnvelopeSpec::from_millis(
            Millis {
                attack_ms: 10.0,
                decay_ms: 120.0,
                sustain: 0.5,
                release_ms: -20.0,
            },
            SR,
        );
        assert_eq!(spec.attack_samples(), 480);
        assert_eq!(spec.decay_samples(), 5760);
        assert_eq!(spec.release_samples(), 0);
        let back = spec.to_millis(SR);
        assert!((back.attack_ms - 10.0).abs() < 1e-4);
        assert!((back.decay_ms - 120.0).abs() < 1e-3);
    }

    #[test]
    fn edits_tag_changed_stage() {
        let spec = EnvelopeSpec::new(10, 20, 0.5, 5);
        assert_eq!(spec.changed(), Stage::Idle);
        assert_eq!(spec.with_attack_ms(3.0, SR).changed(), Stage::Attack);
        assert_eq!(spec.with_decay_percent(3.0, SR).changed(), Stage::Decay);
        assert_eq!(spec.with_sustain_percent(30.0).changed(), Stage::Sustain);
        assert_eq!(spec.with_release_ms(3.0, SR).changed(), Stage::Release);
        // Sample-level builders keep the existing tag
        let tagged = spec.with_changed(Stage::Decay);
        assert_eq!(tagged.with_attack_samples(4).changed(), Stage::Decay);
    }

    #[test]
    fn release_requires_sustain() {
        assert!(!EnvelopeSpec::new(1, 1, 0.0, 100).has_release());
        assert!(EnvelopeSpec::new(1, 1, 0.1, 100).has_release());
        assert!(!EnvelopeSpec::new(1, 1, 0.1, 0).has_release());
    }

    #[test]
    fn percent_view() {
        let stamp = Stamp {
            attack: 10.0,
            decay: 90.0,
            sustain: 90.0,
            release: 20.0,
        };
        let spec = EnvelopeSpec::from_percent(stamp, SR);
        assert_eq!(spec.to_percent(SR), stamp);
        assert_eq!(spec.sum(), u64::from(spec.attack_samples() + spec.decay_samples()));
    }
}
