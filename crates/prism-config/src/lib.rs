//! Patch loading and validation for the prism real-time core.
//!
//! A patch is a small TOML file holding the engine settings (sample rate,
//! block size, glide window), one envelope and an optional filter. This
//! crate parses it, checks it, and turns it into the types the audio code
//! consumes: an [`EnvelopeSpec`](prism_synth::EnvelopeSpec) and
//! [`FilterParams`](prism_core::FilterParams).
//!
//! # Example
//!
//! ```rust
//! use prism_config::Patch;
//!
//! let patch = Patch::from_toml(r#"
//!     name = "Pad"
//!     [envelope]
//!     attack_ms = 40.0
//!     decay_ms = 300.0
//!     sustain = 0.6
//!     release_ms = 500.0
//!     [filter]
//!     type = "lowpass"
//!     frequency = 1800.0
//! "#).unwrap();
//!
//! let spec = patch.envelope_spec().unwrap();
//! assert_eq!(spec.attack_samples(), 1920);
//! assert!(patch.filter_params().unwrap().is_some());
//! ```

mod error;
mod patch;

pub use error::ConfigError;
pub use patch::{
    EnvelopeConfig, FilterConfig, FilterKind, MAX_BLOCK_SIZE, MAX_SAMPLE_RATE, Patch,
};
