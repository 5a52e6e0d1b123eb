//! Prism Core - real-time primitives for a live instrument engine
//!
//! This crate provides the pieces that sit on the audio thread or on the
//! boundary between the audio thread and a control (UI/MIDI) thread. Nothing
//! on the audio path allocates, locks or blocks.
//!
//! # Core Abstractions
//!
//! ## Thread Boundary
//!
//! - [`RingBuffer`] - Generic SPSC ring split into [`Producer`] / [`Consumer`]
//! - [`IntRing`] - `u32` SPSC ring built from atomics only
//! - [`Command`] - 4 x 8-bit note/control packets for [`IntRing`]
//! - [`latest`] - Single-slot latest-value cell (`std` only)
//! - [`Realtime`] - Marker of audio-thread-safe processors
//!
//! ## Smoothing and Shapes
//!
//! - [`Ramp`] - Fixed-length linear smoother
//! - [`Curve`] - Linear / exponential / sustain progress shapes
//!
//! ## Filters
//!
//! - [`Coeffs`] - RBJ cookbook biquad coefficients
//! - [`Biquad`] - Fixed-coefficient reference biquad
//! - [`BiquadFilter`] - Biquad with per-block coefficient interpolation
//! - [`FilterControl`] - Control-thread handle for a [`BiquadFilter`] (`std` only)
//!
//! # no_std Support
//!
//! Disable the default `std` feature to build without the standard library.
//! Rings, ramps, curves and the biquad kernel remain available; the
//! latest-value cell and the control handles that use it do not.
//!
//! ```toml
//! [dependencies]
//! prism-core = { version = "0.1", default-features = false }
//! ```
//!
//! # Logging
//!
//! The optional `tracing` feature emits events from construction and
//! control-thread paths only. The audio path never logs.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod biquad;
pub mod biquad_filter;
pub mod command;
pub mod curve;
pub mod error;
pub mod int_ring;
#[cfg(feature = "std")]
pub mod latest;
pub mod math;
pub mod ramp;
pub mod realtime;
pub mod ring;

// Re-export main types at crate root
pub use biquad::{
    Biquad, Coeffs, FilterParams, FilterType, MAX_BANDWIDTH, MIN_BANDWIDTH, Width, df1,
};
#[cfg(feature = "std")]
pub use biquad_filter::FilterControl;
pub use biquad_filter::BiquadFilter;
pub use command::{Command, CommandKind};
pub use curve::Curve;
pub use error::{FilterError, RingError};
pub use int_ring::{IntConsumer, IntProducer, IntRing};
#[cfg(feature = "std")]
pub use latest::{Publisher, Subscriber, latest};
pub use math::{
    DENORMAL_THRESHOLD, RESET_NUDGE, db_to_linear, flush_denormal, lerp, ms_to_samples,
    samples_to_ms,
};
pub use ramp::Ramp;
pub use realtime::{Realtime, RealtimeExt, Series};
pub use ring::{Consumer, Producer, RingBuffer};
