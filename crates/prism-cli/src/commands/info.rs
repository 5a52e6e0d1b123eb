//! Display what a patch resolves to.

use std::path::PathBuf;

use clap::Args;
use prism_core::{Coeffs, Width};
use prism_synth::{EnvelopeSpec, Stage};

use super::common::{filter_type_name, load_patch};

/// Show the derived envelope spec and filter coefficients.
#[derive(Args)]
pub struct InfoArgs {
    /// Patch file (TOML); the default patch when omitted
    #[arg(short, long)]
    pub patch: Option<PathBuf>,
}

/// Run the info command.
pub fn run(args: InfoArgs) -> anyhow::Result<()> {
    let patch = load_patch(args.patch.as_deref())?;
    let sr = patch.sample_rate_hz();
    let spec = patch.envelope_spec()?;

    println!("Patch:       {}", patch.name);
    println!("Sample Rate: {} Hz", patch.sample_rate);
    println!("Block Size:  {} samples", patch.block_size);
    println!("Smoothing:   {:.1} ms", patch.smoothing_ms);
    println!();
    print_envelope(&spec, sr);

    match patch.filter_params()? {
        Some(params) => {
            let coeffs = Coeffs::compute(&params, sr)?;
            let width = match params.width {
                Width::Q(q) => format!("Q {q:.3}"),
                Width::Octaves(bw) => format!("{bw:.2} oct"),
            };
            println!();
            println!(
                "Filter:      {} {:.1} Hz, {}, {:+.1} dB",
                filter_type_name(params.filter_type),
                params.frequency,
                width,
                params.gain_db
            );
            println!(
                "  b0 {:+.6}  b1 {:+.6}  b2 {:+.6}",
                coeffs.b0, coeffs.b1, coeffs.b2
            );
            println!("  a1 {:+.6}  a2 {:+.6}", coeffs.a1, coeffs.a2);
        }
        None => {
            println!();
            println!("Filter:      none");
        }
    }

    Ok(())
}

fn print_envelope(spec: &EnvelopeSpec, sr: f32) {
    let millis = spec.to_millis(sr);
    let percent = spec.to_percent(sr);
    let shape = match (spec.has_sustain(), spec.has_release()) {
        (false, _) => "AD",
        (true, false) => "ADS",
        (true, true) => "ADSR",
    };

    println!("Envelope:    {shape}");
    println!(
        "  {:<8} {:>7} samples {:>9.2} ms {:>4.0} %",
        Stage::Attack,
        spec.attack_samples(),
        millis.attack_ms,
        percent.attack
    );
    println!(
        "  {:<8} {:>7} samples {:>9.2} ms {:>4.0} %",
        Stage::Decay,
        spec.decay_samples(),
        millis.decay_ms,
        percent.decay
    );
    println!(
        "  {:<8} {:>7.3} level   {:>12} {:>4.0} %",
        Stage::Sustain,
        spec.sustain_level(),
        "",
        percent.sustain
    );
    println!(
        "  {:<8} {:>7} samples {:>9.2} ms {:>4.0} %",
        Stage::Release,
        spec.release_samples(),
        millis.release_ms,
        percent.release
    );
    println!("  Attack + decay: {} samples", spec.sum());
}
