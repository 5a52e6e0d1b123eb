//! Segment-based ADSR/AD envelope with a control-thread handle.
//!
//! [`Envelope::new`] returns two halves. The [`Envelope`] lives on the audio
//! thread and implements [`Realtime`]; the [`EnvelopeControl`] lives on the
//! control thread and publishes [`EnvelopeSpec`] edits through a
//! latest-value cell. The envelope reads the cell at most once per block.
//!
//! # Composition
//!
//! | Segment | Curve | Levels | Present |
//! |---------|-------|--------|---------|
//! | Attack | linear | re-entry -> 1 | always |
//! | Decay | exponential | 1 -> sustain | always |
//! | Sustain | flat | sustain | `sustain > 0` |
//! | Release | exponential | audible -> 0 | sustain present and `release > 0` |
//!
//! Which segments are present is decided when the envelope is triggered.
//! Later spec edits change lengths and levels of the running note but do not
//! add or remove segments until the next trigger.
//!
//! # Sample Budget
//!
//! Finite segments (attack, decay, release) may emit at most
//! `attack + decay (+ release once released)` samples per note. The envelope
//! counts them and goes idle if the count would exceed that budget. Live
//! length edits adjust the budget by exactly the change they make to the
//! running segment, so the segments themselves always finish first.
//!
//! # Example
//!
//! ```rust
//! use prism_synth::{Envelope, EnvelopeSpec};
//!
//! let (mut env, mut control) = Envelope::new(EnvelopeSpec::new(10, 20, 0.5, 5), 48000.0);
//! env.trigger();
//!
//! let mut block = [1.0f32; 40];
//! assert_eq!(env.process(&mut block), 40);
//! assert_eq!(block[39], 0.5);
//!
//! control.set_sustain(0.25);
//! env.release();
//! let mut tail = [1.0f32; 10];
//! assert_eq!(env.process(&mut tail), 5);
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use prism_core::{Curve, Publisher, Realtime, Subscriber, latest, ms_to_samples};

use crate::phase::Phase;
use crate::segment::{Segment, Stage, clamp_level};
use crate::spec::{
    DEFAULT_SMOOTHING_MS, EnvelopeSpec, MAX_ATTACK_MS, MAX_DECAY_MS, MAX_RELEASE_MS,
    samples_to_percent,
};

const ATK: usize = 0;
const DK: usize = 1;
const SUS: usize = 2;
const RLS: usize = 3;

/// Handle to a [`Phase`] owned by an [`Envelope`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PhaseId(usize);

/// Audio-thread half of an envelope.
#[derive(Debug)]
pub struct Envelope {
    /// Attack, decay, sustain, release; allocated once
    segments: Vec<Segment>,
    /// Composition latched at trigger
    has_sustain: bool,
    has_release: bool,
    triggered: bool,
    releasing: bool,
    /// Finite samples emitted since trigger
    elapsed: u64,
    /// Finite samples allowed since trigger
    budget: u64,
    last_sample: f32,
    /// Ramp window for level glides, in samples
    smoothing: u32,
    spec: EnvelopeSpec,
    sample_rate: f32,
    updates: Subscriber<EnvelopeSpec>,
    stage: Stage,
    stage_mirror: Arc<AtomicU8>,
    /// Attached phases with their restart blend in samples
    phases: Vec<(Phase, u32)>,
}

impl Envelope {
    /// Create both halves of an envelope, initially idle.
    pub fn new(spec: EnvelopeSpec, sample_rate: f32) -> (Envelope, EnvelopeControl) {
        let (publisher, updates) = latest(spec);
        let stage_mirror = Arc::new(AtomicU8::new(Stage::Idle as u8));
        let smoothing = ms_to_samples(DEFAULT_SMOOTHING_MS, sample_rate).max(1);
        let sustain = spec.sustain_level();

        let segments = vec![
            Segment::new(Stage::Attack, Curve::Linear, 0.0, 1.0, smoothing),
            Segment::new(Stage::Decay, Curve::Exponential, 1.0, sustain, smoothing),
            Segment::new(Stage::Sustain, Curve::Sustain, sustain, sustain, smoothing),
            Segment::new(Stage::Release, Curve::Exponential, sustain, 0.0, smoothing),
        ];

        #[cfg(feature = "tracing")]
        tracing::debug!(?spec, sample_rate, smoothing, "envelope created");

        let envelope = Envelope {
            segments,
            has_sustain: false,
            has_release: false,
            triggered: false,
            releasing: false,
            elapsed: 0,
            budget: 0,
            last_sample: 0.0,
            smoothing,
            spec,
            sample_rate,
            updates,
            stage: Stage::Idle,
            stage_mirror: Arc::clone(&stage_mirror),
            phases: Vec::new(),
        };
        let control = EnvelopeControl {
            spec,
            sample_rate,
            publisher,
            stage_mirror,
        };
        (envelope, control)
    }

    /// Start (or restart) the envelope from the current output level.
    ///
    /// The first sample after a trigger equals the last sample before it,
    /// so retriggering a sounding note does not click.
    pub fn trigger(&mut self) {
        if let Some(spec) = self.updates.latest() {
            self.spec = spec;
        }
        let spec = self.spec;
        let sustain = spec.sustain_level();
        let reentry = clamp_level(self.last_sample);

        self.has_sustain = spec.has_sustain();
        self.has_release = spec.has_release();

        self.segments[ATK].set_length(spec.attack_samples());
        self.segments[ATK].rebase(reentry);

        // A live retune may have moved the decay start
        self.segments[DK].rebase(1.0);
        self.segments[DK].set_end_level(sustain);
        self.segments[DK].set_length(spec.decay_samples());

        self.segments[SUS].set_start_level(sustain);
        self.segments[SUS].set_end_level(sustain);
        if self.has_sustain {
            self.segments[SUS].set_infinite();
        } else {
            self.segments[SUS].set_length(0);
        }

        // Armed by release()
        self.segments[RLS].set_length(0);

        self.triggered = true;
        self.releasing = false;
        self.elapsed = 0;
        self.budget = spec.sum();

        for (phase, blend) in &mut self.phases {
            phase.trigger(*blend);
        }
        let stage = self.select().map_or(Stage::Idle, |i| self.segments[i].stage());
        self.set_stage(stage);
    }

    /// Change the glide window, then [`trigger`](Self::trigger).
    pub fn trigger_with_smoothing(&mut self, smoothing_ms: f32) {
        self.smoothing = ms_to_samples(smoothing_ms, self.sample_rate).max(1);
        for segment in &mut self.segments {
            segment.set_smoothing(self.smoothing);
        }
        self.trigger();
    }

    /// Enter the release segment, or go idle when the note has none.
    ///
    /// Idempotent while releasing. No effect when idle.
    pub fn release(&mut self) {
        if !self.triggered || self.releasing {
            return;
        }
        if !self.has_release {
            self.go_idle();
            return;
        }
        let length = self.spec.release_samples();
        self.segments[RLS].set_length(length);
        self.budget += u64::from(length);
        self.releasing = true;
        if self.stage == Stage::Sustain {
            self.set_stage(Stage::Release);
        }
    }

    /// Cut to silence immediately. Idempotent.
    pub fn stop(&mut self) {
        for segment in &mut self.segments {
            segment.set_length(0);
        }
        self.go_idle();
    }

    /// Pick up a published spec, if any. Call once per block when driving
    /// the envelope with [`process_sample`](Self::process_sample).
    pub fn begin_block(&mut self) {
        if let Some(spec) = self.updates.latest() {
            self.apply_spec(spec);
        }
    }

    /// Multiply `buffer` by the envelope in place.
    ///
    /// Returns the number of samples that were shaped before the envelope
    /// went idle; the rest of the buffer is zeroed. `0` means the envelope
    /// was already idle, `buffer.len()` means it is still playing.
    ///
    /// An empty buffer returns `0` whether or not a note is playing; check
    /// [`is_playing`](Self::is_playing) to tell the two apart. Pending spec
    /// edits are still applied.
    pub fn process(&mut self, buffer: &mut [f32]) -> usize {
        self.begin_block();
        if buffer.is_empty() {
            return 0;
        }
        if !self.triggered {
            buffer.fill(0.0);
            return 0;
        }
        for i in 0..buffer.len() {
            let level = self.process_sample();
            if !self.triggered {
                buffer[i..].fill(0.0);
                return i;
            }
            buffer[i] *= level;
        }
        buffer.len()
    }

    /// Next envelope value, `0.0` when idle. Does not poll for spec updates.
    #[inline]
    pub fn process_sample(&mut self) -> f32 {
        if !self.triggered {
            return 0.0;
        }
        let Some(index) = self.select() else {
            self.go_idle();
            return 0.0;
        };

        if index != SUS {
            if self.elapsed >= self.budget {
                debug_assert!(false, "envelope exceeded its finite sample budget");
                self.go_idle();
                return 0.0;
            }
            self.elapsed += 1;
        }
        if index == RLS && self.segments[RLS].position() == 0 {
            self.segments[RLS].rebase(self.last_sample);
        }

        let segment = &mut self.segments[index];
        let stage = segment.stage();
        let value = segment.next();
        self.set_stage(stage);
        self.last_sample = value;
        value
    }

    /// Current stage.
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Whether a note is sounding.
    pub fn is_playing(&self) -> bool {
        self.triggered
    }

    /// Whether the note is in its release phase.
    pub fn is_releasing(&self) -> bool {
        self.releasing
    }

    /// Last emitted value.
    pub fn last_sample(&self) -> f32 {
        self.last_sample
    }

    /// Spec currently applied.
    pub fn spec(&self) -> EnvelopeSpec {
        self.spec
    }

    /// Sample rate this envelope converts times with.
    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Attach a phase that restarts with each trigger, crossfading over
    /// `blend_samples`. Allocates; call before audio starts.
    pub fn attach_phase(&mut self, blend_samples: u32) -> PhaseId {
        self.phases.push((Phase::new(), blend_samples));
        PhaseId(self.phases.len() - 1)
    }

    /// Mutable access to an attached phase.
    pub fn phase_mut(&mut self, id: PhaseId) -> Option<&mut Phase> {
        self.phases.get_mut(id.0).map(|(phase, _)| phase)
    }

    /// First unfinished segment the current gate state allows.
    fn select(&self) -> Option<usize> {
        (ATK..=RLS).find(|&i| {
            let eligible = match i {
                SUS => !self.releasing,
                RLS => self.releasing,
                _ => true,
            };
            eligible && !self.segments[i].is_complete()
        })
    }

    fn apply_spec(&mut self, spec: EnvelopeSpec) {
        self.spec = spec;
        if !self.triggered {
            return;
        }
        let sustain = spec.sustain_level();
        let current = self.select();

        let delta = self.segments[ATK].retune(spec.attack_samples());
        self.budget = self.budget.saturating_add_signed(delta);

        let delta = self.segments[DK].retune(spec.decay_samples());
        self.budget = self.budget.saturating_add_signed(delta);
        self.segments[DK].set_end_level(sustain);

        if self.has_sustain {
            self.segments[SUS].set_start_level(sustain);
            self.segments[SUS].set_end_level(sustain);
        }
        if self.releasing {
            let delta = self.segments[RLS].retune(spec.release_samples());
            self.budget = self.budget.saturating_add_signed(delta);
        }

        // A segment cut short hands over at the audible level, not at the
        // next segment's own start
        if let Some(cut) = current
            && self.segments[cut].is_complete()
            && let Some(next) = self.select()
        {
            self.segments[next].enter_from(self.last_sample);
        }
    }

    fn go_idle(&mut self) {
        self.triggered = false;
        self.releasing = false;
        self.last_sample = 0.0;
        for (phase, _) in &mut self.phases {
            phase.reset();
        }
        self.set_stage(Stage::Idle);
    }

    #[inline]
    fn set_stage(&mut self, stage: Stage) {
        if stage != self.stage {
            self.stage = stage;
            self.stage_mirror.store(stage as u8, Ordering::Relaxed);
        }
    }
}

impl Realtime for Envelope {
    fn process_block(&mut self, buffer: &mut [f32]) -> usize {
        self.process(buffer)
    }

    fn reset(&mut self) {
        self.stop();
    }
}

/// Control-thread half of an envelope.
///
/// Every setter derives a new [`EnvelopeSpec`] from the last one published
/// and publishes it. Values clamp rather than fail.
#[derive(Debug)]
pub struct EnvelopeControl {
    spec: EnvelopeSpec,
    sample_rate: f32,
    publisher: Publisher<EnvelopeSpec>,
    stage_mirror: Arc<AtomicU8>,
}

impl EnvelopeControl {
    /// Publish a whole spec.
    pub fn set_spec(&mut self, spec: EnvelopeSpec) {
        self.spec = spec;
        self.publisher.publish(spec);

        #[cfg(feature = "tracing")]
        tracing::debug!(
            attack = spec.attack_samples(),
            decay = spec.decay_samples(),
            sustain = spec.sustain_level(),
            release = spec.release_samples(),
            changed = %spec.changed(),
            "envelope spec published"
        );
    }

    /// Attack as a percent of the maximum attack time.
    pub fn set_attack_percent(&mut self, pct: f32) {
        self.set_spec(self.spec.with_attack_percent(pct, self.sample_rate));
    }

    /// Decay as a percent of the maximum decay time.
    pub fn set_decay_percent(&mut self, pct: f32) {
        self.set_spec(self.spec.with_decay_percent(pct, self.sample_rate));
    }

    /// Release as a percent of the maximum release time.
    pub fn set_release_percent(&mut self, pct: f32) {
        self.set_spec(self.spec.with_release_percent(pct, self.sample_rate));
    }

    /// Sustain as a percent of full scale.
    pub fn set_sustain_percent(&mut self, pct: f32) {
        self.set_spec(self.spec.with_sustain_percent(pct));
    }

    /// Attack time in milliseconds.
    pub fn set_attack_ms(&mut self, ms: f32) {
        self.set_spec(self.spec.with_attack_ms(ms, self.sample_rate));
    }

    /// Decay time in milliseconds.
    pub fn set_decay_ms(&mut self, ms: f32) {
        self.set_spec(self.spec.with_decay_ms(ms, self.sample_rate));
    }

    /// Release time in milliseconds.
    pub fn set_release_ms(&mut self, ms: f32) {
        self.set_spec(self.spec.with_release_ms(ms, self.sample_rate));
    }

    /// Sustain level, 0..=1.
    pub fn set_sustain(&mut self, level: f32) {
        self.set_spec(self.spec.with_sustain(level).with_changed(Stage::Sustain));
    }

    /// Last published spec.
    pub fn spec(&self) -> EnvelopeSpec {
        self.spec
    }

    /// Attack length in samples.
    pub fn attack_samples(&self) -> u32 {
        self.spec.attack_samples()
    }

    /// Decay length in samples.
    pub fn decay_samples(&self) -> u32 {
        self.spec.decay_samples()
    }

    /// Release length in samples.
    pub fn release_samples(&self) -> u32 {
        self.spec.release_samples()
    }

    /// Attack time in milliseconds.
    pub fn attack_ms(&self) -> f32 {
        self.spec.to_millis(self.sample_rate).attack_ms
    }

    /// Decay time in milliseconds.
    pub fn decay_ms(&self) -> f32 {
        self.spec.to_millis(self.sample_rate).decay_ms
    }

    /// Release time in milliseconds.
    pub fn release_ms(&self) -> f32 {
        self.spec.to_millis(self.sample_rate).release_ms
    }

    /// Attack as a whole percent of the maximum attack time.
    pub fn attack_percent(&self) -> f32 {
        samples_to_percent(self.spec.attack_samples(), MAX_ATTACK_MS, self.sample_rate)
    }

    /// Decay as a whole percent of the maximum decay time.
    pub fn decay_percent(&self) -> f32 {
        samples_to_percent(self.spec.decay_samples(), MAX_DECAY_MS, self.sample_rate)
    }

    /// Release as a whole percent of the maximum release time.
    pub fn release_percent(&self) -> f32 {
        samples_to_percent(self.spec.release_samples(), MAX_RELEASE_MS, self.sample_rate)
    }

    /// Sustain level, 0..=1.
    pub fn sustain(&self) -> f32 {
        self.spec.sustain_level()
    }

    /// Attack plus decay, in samples.
    pub fn sum(&self) -> u64 {
        self.spec.sum()
    }

    /// Stage of the audio-thread half as of its last change.
    pub fn stage(&self) -> Stage {
        Stage::from_u8(self.stage_mirror.load(Ordering::Relaxed))
    }

    /// Sample rate used for time conversions.
    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f32 = 48000.0;

    fn adsr() -> (Envelope, EnvelopeControl) {
        Envelope::new(EnvelopeSpec::new(10, 20, 0.5, 5), SR)
    }

    #[test]
    fn idle_envelope_zeroes_buffer() {
        let (mut env, _control) = adsr();
        let mut block = [1.0f32; 8];
        assert_eq!(env.process(&mut block), 0);
        assert_eq!(block, [0.0; 8]);
        assert_eq!(env.process_sample(), 0.0);
        assert_eq!(env.stage(), Stage::Idle);
    }

    #[test]
    fn attack_is_linear_from_zero() {
        let (mut env, _control) = adsr();
        env.trigger();
        for i in 0..10 {
            let v = env.process_sample();
            assert!((v - i as f32 / 10.0).abs() < 1e-6, "sample {i}: {v}");
        }
        assert_eq!(env.stage(), Stage::Attack);
        assert_eq!(env.process_sample(), 1.0);
        assert_eq!(env.stage(), Stage::Decay);
    }

    #[test]
    fn decay_lands_on_sustain() {
        let (mut env, _control) = adsr();
        env.trigger();
        let values: Vec<f32> = (0..40).map(|_| env.process_sample()).collect();
        // Last decay sample is still above sustain (exponential tail)
        assert!((values[29] - 0.529).abs() < 1e-3);
        assert!(values[10..30].windows(2).all(|w| w[1] < w[0]));
        assert!(values[30..].iter().all(|&v| v == 0.5));
        assert_eq!(env.stage(), Stage::Sustain);
    }

    #[test]
    fn release_starts_from_audible_level() {
        let (mut env, _control) = adsr();
        env.trigger();
        for _ in 0..15 {
            env.process_sample();
        }
        let before = env.last_sample();
        env.release();
        assert!(env.is_releasing());
        // Attack and decay still run before release takes over
        for _ in 15..30 {
            env.process_sample();
        }
        let decay_end = env.last_sample();
        assert!(decay_end < before);
        assert_eq!(env.process_sample(), decay_end);
        assert_eq!(env.stage(), Stage::Release);
    }

    #[test]
    fn percussive_release_goes_idle() {
        let (mut env, _control) = Envelope::new(EnvelopeSpec::new(4, 4, 0.0, 100), SR);
        env.trigger();
        env.process_sample();
        env.release();
        assert!(!env.is_playing());
        assert_eq!(env.last_sample(), 0.0);
    }

    #[test]
    fn release_is_idempotent() {
        let (mut env, _control) = adsr();
        env.trigger();
        let mut block = [1.0f32; 40];
        env.process(&mut block);
        env.release();
        env.process_sample();
        env.release();
        let mut tail = [1.0f32; 10];
        assert_eq!(env.process(&mut tail), 4);
    }

    #[test]
    fn release_when_idle_is_noop() {
        let (mut env, _control) = adsr();
        env.release();
        assert!(!env.is_playing());
        assert!(!env.is_releasing());
    }

    #[test]
    fn empty_buffer_leaves_note_playing() {
        let (mut env, mut control) = adsr();
        env.trigger();
        control.set_sustain(0.25);
        assert_eq!(env.process(&mut []), 0);
        assert!(env.is_playing());
        assert_eq!(env.stage(), Stage::Attack);
        // The edit was still picked up
        assert_eq!(env.spec().sustain_level(), 0.25);
    }

    #[test]
    fn stop_cuts_immediately() {
        let (mut env, _control) = adsr();
        env.trigger();
        env.process_sample();
        env.stop();
        env.stop();
        assert!(!env.is_playing());
        let mut block = [1.0f32; 4];
        assert_eq!(env.process(&mut block), 0);
        assert_eq!(block, [0.0; 4]);
    }

    #[test]
    fn zero_length_envelope_is_silent() {
        let (mut env, _control) = Envelope::new(EnvelopeSpec::new(0, 0, 0.0, 0), SR);
        env.trigger();
        let mut block = [1.0f32; 4];
        assert_eq!(env.process(&mut block), 0);
        assert!(!env.is_playing());
    }

    #[test]
    fn retrigger_continues_from_last_sample() {
        let (mut env, _control) = adsr();
        env.trigger();
        for _ in 0..20 {
            env.process_sample();
        }
        let last = env.last_sample();
        env.trigger();
        assert_eq!(env.process_sample(), last);
    }

    #[test]
    fn control_edits_apply_at_block_start() {
        let (mut env, mut control) = Envelope::new(EnvelopeSpec::new(100, 100, 0.5, 50), SR);
        env.trigger();
        let mut block = [1.0f32; 10];
        env.process(&mut block);

        control.set_attack_ms(0.0);
        // Per-sample API sees nothing until begin_block
        assert_eq!(env.spec().attack_samples(), 100);
        env.begin_block();
        assert_eq!(env.spec().attack_samples(), 0);
        // Attack shortened below its position: decay starts at once, from
        // where the attack left off
        let last = env.last_sample();
        assert_eq!(env.process_sample(), last);
        assert_eq!(env.stage(), Stage::Decay);
        // Heading for the 0.5 sustain level
        let next = env.process_sample();
        assert!(next > last && next < 0.5);
    }

    #[test]
    fn stage_is_mirrored_to_control() {
        let (mut env, control) = adsr();
        assert_eq!(control.stage(), Stage::Idle);
        env.trigger();
        assert_eq!(control.stage(), Stage::Attack);
        let mut block = [1.0f32; 35];
        env.process(&mut block);
        assert_eq!(control.stage(), Stage::Sustain);
        env.release();
        assert_eq!(control.stage(), Stage::Release);
        env.stop();
        assert_eq!(control.stage(), Stage::Idle);
    }

    #[test]
    fn control_queries() {
        let (_env, mut control) = Envelope::new(EnvelopeSpec::default_at(SR), SR);
        assert_eq!(control.attack_percent(), 5.0);
        assert_eq!(control.decay_percent(), 100.0);
        control.set_release_ms(100.0);
        assert_eq!(control.release_samples(), 4800);
        assert!((control.release_ms() - 100.0).abs() < 1e-3);
        control.set_sustain_percent(40.0);
        assert!((control.sustain() - 0.4).abs() < 1e-6);
        assert_eq!(control.spec().changed(), Stage::Sustain);
        assert_eq!(
            control.sum(),
            u64::from(control.attack_samples()) + u64::from(control.decay_samples())
        );
    }

    #[test]
    fn attached_phase_restarts_on_trigger() {
        let (mut env, _control) = adsr();
        let id = env.attach_phase(4);
        let phase = env.phase_mut(id).unwrap();
        phase.step(0.3);
        env.trigger();
        assert!(env.phase_mut(id).unwrap().is_blending());
        env.stop();
        let phase = env.phase_mut(id).unwrap();
        assert!(!phase.is_blending());
        assert_eq!(phase.get(), 0.0);
        assert!(env.phase_mut(PhaseId(7)).is_none());
    }
}
