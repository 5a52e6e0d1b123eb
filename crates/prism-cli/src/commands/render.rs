//! Render a note offline with a live control thread.
//!
//! The main thread plays the audio callback: it drains packed note commands
//! from an [`IntRing`], fills a block with a sine tone, and runs it through
//! the envelope and filter. It paces itself at the audio rate so a second
//! thread can act as the UI, sending note events and parameter edits against
//! a shared sample clock.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use clap::Args;
use prism_core::{
    BiquadFilter, Coeffs, Command, CommandKind, FilterControl, IntProducer, IntRing, Realtime,
    RealtimeExt,
};
use prism_synth::{Envelope, EnvelopeControl};

use super::common::{load_patch, note_to_hz};

/// Capacity of the command ring.
const COMMAND_RING: usize = 64;
/// Interval between filter sweep steps, in milliseconds of audio.
const SWEEP_STEP_MS: f32 = 5.0;

/// Render a note through the patch envelope and filter.
#[derive(Args)]
pub struct RenderArgs {
    /// Patch file (TOML); the default patch when omitted
    #[arg(short, long)]
    pub patch: Option<PathBuf>,

    /// Total render length in seconds
    #[arg(long, default_value = "1.0")]
    pub seconds: f32,

    /// Time from note-on to note-off in seconds
    #[arg(long, default_value = "0.5")]
    pub gate: f32,

    /// MIDI note number of the tone
    #[arg(long, default_value = "57")]
    pub note: u8,

    /// Note velocity (1-127)
    #[arg(long, default_value = "100")]
    pub velocity: u8,

    /// Retrigger the note after this many seconds
    #[arg(long)]
    pub retrigger: Option<f32>,

    /// Sweep the filter cutoff to this frequency over the gate
    #[arg(long)]
    pub sweep: Option<f32>,

    /// Move the sustain level to this value halfway through the gate
    #[arg(long)]
    pub sustain_to: Option<f32>,

    /// Print a status line every N blocks (0 disables)
    #[arg(long, default_value = "16")]
    pub every: usize,

    /// Run as fast as possible instead of at the audio rate
    #[arg(long)]
    pub no_pace: bool,
}

/// What the control thread reports back when it finishes.
struct ControlReport {
    sent: u32,
    dropped: u32,
    filter_edits: u32,
    filter_rejected: u32,
}

/// Tone state the audio loop keeps between note commands.
struct Voice {
    freq: f32,
    gain: f32,
}

/// Control-thread schedule, in samples.
struct Schedule {
    note: u8,
    velocity: u8,
    gate_at: u64,
    retrigger_at: Option<u64>,
    sustain_at: u64,
    sustain_to: Option<f32>,
    sweep: Option<(f32, f32)>,
    sweep_step: u64,
    sample_rate: f32,
}

/// Run the render command.
pub fn run(args: RenderArgs) -> anyhow::Result<()> {
    anyhow::ensure!(
        args.seconds.is_finite() && args.seconds > 0.0,
        "--seconds must be positive"
    );
    anyhow::ensure!(args.gate.is_finite() && args.gate >= 0.0, "--gate must be non-negative");
    anyhow::ensure!(args.note < 128, "--note must be a MIDI note (0-127)");

    let patch = load_patch(args.patch.as_deref())?;
    let sr = patch.sample_rate_hz();
    let block_size = patch.block_size;
    let spec = patch.envelope_spec()?;

    let (mut envelope, env_control) = Envelope::new(spec, sr);
    let blend = prism_core::ms_to_samples(patch.smoothing_ms, sr);
    let phase_id = envelope.attach_phase(blend);

    let filter_params = patch.filter_params()?;
    let (filter, filter_control) = match filter_params {
        Some(params) => {
            let (filter, control) = BiquadFilter::new(params, sr)?;
            (filter, Some(control))
        }
        None => (BiquadFilter::with_coeffs(Coeffs::PASSTHROUGH), None),
    };
    let mut chain = envelope.then(filter);

    let (tx, mut rx) = IntRing::new(COMMAND_RING)?;
    let clock = Arc::new(AtomicU64::new(0));
    let finished = Arc::new(AtomicBool::new(false));

    let schedule = Schedule {
        note: args.note,
        velocity: args.velocity.clamp(1, 127),
        gate_at: seconds_to_samples(args.gate, sr),
        retrigger_at: args.retrigger.map(|s| seconds_to_samples(s, sr)),
        sustain_at: seconds_to_samples(args.gate * 0.5, sr),
        sustain_to: args.sustain_to,
        sweep: match (args.sweep, filter_params) {
            (Some(to), Some(params)) => Some((params.frequency, to)),
            _ => None,
        },
        sweep_step: seconds_to_samples(SWEEP_STEP_MS / 1000.0, sr).max(1),
        sample_rate: sr,
    };

    tracing::info!(
        patch = %patch.name,
        sample_rate = patch.sample_rate,
        block_size,
        seconds = args.seconds,
        "render started"
    );

    let control = {
        let clock = Arc::clone(&clock);
        let finished = Arc::clone(&finished);
        thread::Builder::new()
            .name("prism-control".into())
            .spawn(move || {
                control_thread(schedule, tx, env_control, filter_control, &clock, &finished)
            })?
    };

    // Audio side
    let total = seconds_to_samples(args.seconds, sr);
    let block_period = Duration::from_secs_f64(block_size as f64 / f64::from(patch.sample_rate));
    let start = Instant::now();
    let mut block = vec![0.0f32; block_size];
    let mut rendered: u64 = 0;
    let mut voiced: u64 = 0;
    let mut peak = 0.0f32;
    let mut blocks: usize = 0;
    let mut voice = Voice {
        freq: note_to_hz(args.note),
        gain: 0.0,
    };
    let mut unknown = 0u32;
    let mut ignored = 0u32;

    while rendered < total {
        while let Some(word) = rx.poll() {
            let Some(cmd) = Command::unpack(word) else {
                unknown += 1;
                continue;
            };
            if !apply_command(chain.first_mut(), &mut voice, cmd, patch.smoothing_ms) {
                ignored += 1;
            }
        }

        let len = block_size.min((total - rendered) as usize);
        let buf = &mut block[..len];
        let increment = voice.freq / sr;
        match chain.first_mut().phase_mut(phase_id) {
            Some(phase) => {
                for s in buf.iter_mut() {
                    *s = voice.gain
                        * libm::sinf(core::f32::consts::TAU * phase.next(increment));
                }
            }
            None => buf.fill(0.0),
        }

        let active = chain.process_block(buf);
        let block_peak = buf.iter().fold(0.0f32, |m, s| m.max(s.abs()));
        peak = peak.max(block_peak);
        voiced += active as u64;
        rendered += len as u64;
        clock.store(rendered, Ordering::Release);

        if args.every > 0 && blocks % args.every == 0 {
            println!(
                "block {:>5}  {:<8} active {:>5}  peak {:.3}",
                blocks,
                chain.first().stage(),
                active,
                block_peak
            );
        }
        blocks += 1;

        if !args.no_pace {
            let due = block_period * blocks as u32;
            if let Some(wait) = due.checked_sub(start.elapsed()) {
                thread::sleep(wait);
            }
        }
    }

    finished.store(true, Ordering::Release);
    let report = control
        .join()
        .map_err(|_| anyhow::anyhow!("control thread panicked"))?;

    tracing::info!(blocks, voiced, "render finished");

    println!();
    println!(
        "Rendered:  {} samples ({:.3} s) in {} blocks",
        rendered,
        rendered as f32 / sr,
        blocks
    );
    println!("Voiced:    {voiced} samples");
    println!("Peak:      {peak:.3}");
    println!(
        "Commands:  {} sent, {} dropped, {} unknown, {} ignored",
        report.sent, report.dropped, unknown, ignored
    );
    if let Some(params) = filter_params {
        println!(
            "Filter:    {:.1} Hz, {} edits, {} rejected",
            params.frequency, report.filter_edits, report.filter_rejected
        );
    }
    println!("Final:     {}", chain.first().stage());

    Ok(())
}

/// Play one note command on the envelope. Returns `false` for commands the
/// render loop has no use for (parameter sets travel through the control
/// handles instead).
fn apply_command(
    envelope: &mut Envelope,
    voice: &mut Voice,
    cmd: Command,
    smoothing_ms: f32,
) -> bool {
    match cmd.kind {
        CommandKind::Add => {
            voice.freq = note_to_hz(cmd.data1);
            voice.gain = f32::from(cmd.data2) / 127.0;
            envelope.trigger_with_smoothing(smoothing_ms);
        }
        CommandKind::Retrigger => {
            voice.gain = f32::from(cmd.data2) / 127.0;
            envelope.trigger();
        }
        CommandKind::NoteOff => envelope.release(),
        CommandKind::Remove => envelope.stop(),
        CommandKind::Set => return false,
    }
    true
}

fn control_thread(
    schedule: Schedule,
    mut tx: IntProducer,
    mut envelope: EnvelopeControl,
    mut filter: Option<FilterControl>,
    clock: &AtomicU64,
    finished: &AtomicBool,
) -> ControlReport {
    let mut report = ControlReport {
        sent: 0,
        dropped: 0,
        filter_edits: 0,
        filter_rejected: 0,
    };
    let mut send = |cmd: Command, report: &mut ControlReport| {
        if tx.offer(cmd.pack()) {
            report.sent += 1;
        } else {
            report.dropped += 1;
            tracing::warn!(%cmd, "command ring full, dropped");
        }
    };

    send(Command::note_on(0, schedule.note, schedule.velocity), &mut report);

    let mut retrigger_at = schedule.retrigger_at;
    let mut sustain_pending = schedule.sustain_to.is_some();
    let mut gate_open = true;
    let mut next_sweep = schedule.sweep_step;

    while !finished.load(Ordering::Acquire) {
        let now = clock.load(Ordering::Acquire);

        if let Some(at) = retrigger_at
            && now >= at
        {
            send(
                Command::retrigger(0, schedule.note, schedule.velocity),
                &mut report,
            );
            retrigger_at = None;
        }

        if sustain_pending && now >= schedule.sustain_at {
            if let Some(level) = schedule.sustain_to {
                envelope.set_sustain(level);
            }
            sustain_pending = false;
        }

        if let (Some((from, to)), Some(control)) = (schedule.sweep, filter.as_mut())
            && gate_open
            && now >= next_sweep
        {
            let progress = if schedule.gate_at == 0 {
                1.0
            } else {
                (now as f32 / schedule.gate_at as f32).min(1.0)
            };
            let hz = from + (to - from) * progress;
            match control.set_frequency(hz) {
                Ok(()) => report.filter_edits += 1,
                Err(err) => {
                    report.filter_rejected += 1;
                    tracing::warn!(%err, hz, "filter edit rejected");
                }
            }
            next_sweep = now + schedule.sweep_step;
        }

        if gate_open && now >= schedule.gate_at {
            send(Command::note_off(0, schedule.note), &mut report);
            gate_open = false;
        }

        thread::sleep(Duration::from_micros(500));
    }

    tracing::debug!(
        stage = %envelope.stage(),
        release_ms = envelope.release_ms(),
        sample_rate = schedule.sample_rate,
        "control thread done"
    );
    report
}

fn seconds_to_samples(seconds: f32, sample_rate: f32) -> u64 {
    if seconds.is_finite() && seconds > 0.0 {
        (f64::from(seconds) * f64::from(sample_rate)).round() as u64
    } else {
        0
    }
}
