//! Prism Synth - envelopes and phases for the prism real-time core
//!
//! This crate builds note-shaped gain on top of the primitives in
//! `prism-core`.
//!
//! # Core Components
//!
//! ## Envelopes
//!
//! - [`Envelope`] - Segment-based ADSR/AD envelope (audio thread, `std` only)
//! - [`EnvelopeControl`] - Control-thread handle that publishes edits (`std` only)
//! - [`EnvelopeSpec`] - Immutable timing description exchanged between them
//! - [`Segment`] / [`Stage`] - One curve-driven envelope phase and its tag
//!
//! ```rust
//! use prism_synth::{Envelope, EnvelopeSpec, Stage};
//!
//! let spec = EnvelopeSpec::default_at(48000.0);
//! let (mut env, mut control) = Envelope::new(spec, 48000.0);
//!
//! control.set_attack_ms(2.0);
//! env.trigger();
//!
//! let mut block = [1.0f32; 64];
//! env.process(&mut block);
//! assert_eq!(env.stage(), Stage::Attack);
//! ```
//!
//! ## Phases
//!
//! - [`Phase`] - Normalized phase accumulator with crossfaded restart
//!
//! # no_std Support
//!
//! Disable the default `std` feature for [`Segment`], [`EnvelopeSpec`] and
//! [`Phase`] alone. The two-halves [`Envelope`] needs the latest-value cell
//! from `prism-core`, which requires `std`.
//!
//! # Logging
//!
//! The optional `tracing` feature logs envelope construction and every
//! published spec. The audio path never logs.

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "std")]
pub mod envelope;
pub mod phase;
pub mod segment;
pub mod spec;

#[cfg(feature = "std")]
pub use envelope::{Envelope, EnvelopeControl, PhaseId};
pub use phase::Phase;
pub use segment::{Segment, Stage};
pub use spec::{
    DEFAULT_ATTACK_PCT, DEFAULT_DECAY_PCT, DEFAULT_SMOOTHING_MS, EnvelopeSpec, MAX_ATTACK_MS,
    MAX_DECAY_MS, MAX_RELEASE_MS, Millis, Stamp, percent_to_samples, samples_to_percent,
};
