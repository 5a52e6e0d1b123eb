//! Patch file format and operations.

use serde::{Deserialize, Serialize};
use std::path::Path;

use prism_core::{Coeffs, FilterParams, FilterType, Width};
use prism_synth::{
    DEFAULT_ATTACK_PCT, DEFAULT_DECAY_PCT, DEFAULT_SMOOTHING_MS, EnvelopeSpec, MAX_ATTACK_MS,
    MAX_DECAY_MS, MAX_RELEASE_MS, percent_to_samples,
};

use crate::error::ConfigError;

/// Largest sample rate a patch may request.
pub const MAX_SAMPLE_RATE: u32 = 384_000;
/// Largest block size a patch may request.
pub const MAX_BLOCK_SIZE: usize = 8192;

/// An instrument patch: engine settings, one envelope, an optional filter.
///
/// # TOML Format
///
/// ```toml
/// name = "Pluck"
/// sample_rate = 48000
/// block_size = 256
/// smoothing_ms = 7.0
///
/// [envelope]          # either *_ms or *_pct per stage
/// attack_ms = 10.0
/// decay_ms = 120.0
/// sustain = 0.5
/// release_ms = 200.0
///
/// [filter]
/// type = "lowpass"    # lowpass | highpass | peaking | allpass | bandpass
/// frequency = 1200.0
/// q = 0.707
/// gain_db = 0.0
/// ```
///
/// Missing keys take their defaults. Envelope values clamp when converted;
/// engine and filter settings are checked by [`Patch::validate`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Patch {
    /// Name of the patch.
    #[serde(default = "default_name")]
    pub name: String,

    /// Engine sample rate in Hz.
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Samples per processing block.
    #[serde(default = "default_block_size")]
    pub block_size: usize,

    /// Glide window for envelope level edits and retrigger.
    #[serde(default = "default_smoothing_ms")]
    pub smoothing_ms: f32,

    /// Envelope timing.
    #[serde(default)]
    pub envelope: EnvelopeConfig,

    /// Optional filter after the envelope.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<FilterConfig>,
}

fn default_name() -> String {
    "Untitled".to_string()
}

fn default_sample_rate() -> u32 {
    48000
}

fn default_block_size() -> usize {
    256
}

fn default_smoothing_ms() -> f32 {
    DEFAULT_SMOOTHING_MS
}

/// Envelope section. Each timed stage may be given in milliseconds or in
/// percent of its maximum time, not both.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct EnvelopeConfig {
    /// Attack time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attack_ms: Option<f32>,
    /// Attack, percent of the maximum attack time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attack_pct: Option<f32>,
    /// Decay time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decay_ms: Option<f32>,
    /// Decay, percent of the maximum decay time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decay_pct: Option<f32>,
    /// Sustain level, 0..=1. Absent or 0 gives an attack/decay envelope.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sustain: Option<f32>,
    /// Release time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_ms: Option<f32>,
    /// Release, percent of the maximum release time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_pct: Option<f32>,
}

impl EnvelopeConfig {
    /// Settings in milliseconds.
    pub fn millis(attack_ms: f32, decay_ms: f32, sustain: f32, release_ms: f32) -> Self {
        Self {
            attack_ms: Some(attack_ms),
            decay_ms: Some(decay_ms),
            sustain: Some(sustain),
            release_ms: Some(release_ms),
            ..Self::default()
        }
    }

    /// Reject stages given in both units.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let pairs = [
            ("envelope.attack", self.attack_ms, self.attack_pct),
            ("envelope.decay", self.decay_ms, self.decay_pct),
            ("envelope.release", self.release_ms, self.release_pct),
        ];
        for (field, ms, pct) in pairs {
            if ms.is_some() && pct.is_some() {
                return Err(ConfigError::invalid(field, "give either *_ms or *_pct, not both"));
            }
        }
        Ok(())
    }

    /// Convert to an [`EnvelopeSpec`] at `sample_rate`.
    pub fn to_spec(&self, sample_rate: f32) -> Result<EnvelopeSpec, ConfigError> {
        self.validate()?;
        let samples = |ms: Option<f32>, pct: Option<f32>, max_ms: f32, default_pct: f32| match ms {
            Some(ms) => prism_core::ms_to_samples(ms, sample_rate),
            None => percent_to_samples(pct.unwrap_or(default_pct), max_ms, sample_rate),
        };
        Ok(EnvelopeSpec::new(
            samples(self.attack_ms, self.attack_pct, MAX_ATTACK_MS, DEFAULT_ATTACK_PCT),
            samples(self.decay_ms, self.decay_pct, MAX_DECAY_MS, DEFAULT_DECAY_PCT),
            self.sustain.unwrap_or(0.0),
            samples(self.release_ms, self.release_pct, MAX_RELEASE_MS, 0.0),
        ))
    }
}

/// Filter response names as written in patch files.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FilterKind {
    /// Low-pass
    #[default]
    LowPass,
    /// High-pass
    HighPass,
    /// Peaking bell
    Peaking,
    /// All-pass
    AllPass,
    /// Band-pass
    BandPass,
}

impl From<FilterKind> for FilterType {
    fn from(kind: FilterKind) -> Self {
        match kind {
            FilterKind::LowPass => FilterType::LowPass,
            FilterKind::HighPass => FilterType::HighPass,
            FilterKind::Peaking => FilterType::Peaking,
            FilterKind::AllPass => FilterType::AllPass,
            FilterKind::BandPass => FilterType::BandPass,
        }
    }
}

/// Filter section. Width is a Q or a bandwidth in octaves, not both;
/// neither gives a Butterworth Q.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FilterConfig {
    /// Response shape.
    #[serde(rename = "type", default)]
    pub kind: FilterKind,
    /// Cutoff or center frequency in Hz.
    #[serde(default = "default_frequency")]
    pub frequency: f32,
    /// Quality factor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub q: Option<f32>,
    /// Bandwidth in octaves.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bandwidth: Option<f32>,
    /// Gain in dB (peaking only).
    #[serde(default)]
    pub gain_db: f32,
}

fn default_frequency() -> f32 {
    1000.0
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            kind: FilterKind::default(),
            frequency: default_frequency(),
            q: None,
            bandwidth: None,
            gain_db: 0.0,
        }
    }
}

impl FilterConfig {
    /// Convert to [`FilterParams`] without checking ranges.
    pub fn to_params(&self) -> Result<FilterParams, ConfigError> {
        let width = match (self.q, self.bandwidth) {
            (Some(_), Some(_)) => {
                return Err(ConfigError::invalid("filter.q", "give either q or bandwidth, not both"));
            }
            (Some(q), None) => Width::Q(q),
            (None, Some(octaves)) => Width::Octaves(octaves),
            (None, None) => Width::default(),
        };
        Ok(FilterParams::new(self.kind.into(), self.frequency)
            .with_width(width)
            .with_gain_db(self.gain_db))
    }
}

impl Patch {
    /// Create a patch with default settings.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sample_rate: default_sample_rate(),
            block_size: default_block_size(),
            smoothing_ms: default_smoothing_ms(),
            envelope: EnvelopeConfig::default(),
            filter: None,
        }
    }

    /// Set the sample rate.
    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    /// Set the block size.
    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    /// Set the envelope section.
    pub fn with_envelope(mut self, envelope: EnvelopeConfig) -> Self {
        self.envelope = envelope;
        self
    }

    /// Set the filter section.
    pub fn with_filter(mut self, filter: FilterConfig) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Load and validate a patch from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
        Self::from_toml(&content)
    }

    /// Parse and validate a patch from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let patch: Patch = toml::from_str(toml_str)?;
        patch.validate()?;
        Ok(patch)
    }

    /// Save the patch to a TOML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = self.to_toml()?;
        std::fs::write(path, content).map_err(|e| ConfigError::write_file(path, e))?;
        Ok(())
    }

    /// Convert the patch to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Sample rate as used by the DSP code.
    pub fn sample_rate_hz(&self) -> f32 {
        self.sample_rate as f32
    }

    /// Envelope spec at the patch sample rate.
    pub fn envelope_spec(&self) -> Result<EnvelopeSpec, ConfigError> {
        self.envelope.to_spec(self.sample_rate_hz())
    }

    /// Filter settings, checked against the patch sample rate.
    pub fn filter_params(&self) -> Result<Option<FilterParams>, ConfigError> {
        let Some(filter) = &self.filter else {
            return Ok(None);
        };
        let params = filter.to_params()?;
        Coeffs::compute(&params, self.sample_rate_hz())?;
        Ok(Some(params))
    }

    /// Check engine settings, envelope units and filter ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_rate == 0 || self.sample_rate > MAX_SAMPLE_RATE {
            return Err(ConfigError::invalid(
                "sample_rate",
                format!("{} Hz outside 1..={MAX_SAMPLE_RATE}", self.sample_rate),
            ));
        }
        if self.block_size == 0 || self.block_size > MAX_BLOCK_SIZE {
            return Err(ConfigError::invalid(
                "block_size",
                format!("{} outside 1..={MAX_BLOCK_SIZE}", self.block_size),
            ));
        }
        if !self.smoothing_ms.is_finite() || self.smoothing_ms < 0.0 {
            return Err(ConfigError::invalid(
                "smoothing_ms",
                format!("must be finite and non-negative, got {}", self.smoothing_ms),
            ));
        }
        self.envelope.validate()?;
        self.filter_params()?;
        Ok(())
    }
}

impl Default for Patch {
    fn default() -> Self {
        Self::new(default_name())
    }
}
