//! Helpers shared by commands.

use std::path::Path;

use anyhow::Context;
use prism_config::Patch;
use prism_core::FilterType;

/// Load the patch at `path`, or the default patch when none is given.
pub fn load_patch(path: Option<&Path>) -> anyhow::Result<Patch> {
    match path {
        Some(path) => {
            let patch = Patch::load(path)
                .with_context(|| format!("loading patch {}", path.display()))?;
            tracing::info!(name = %patch.name, path = %path.display(), "patch loaded");
            Ok(patch)
        }
        None => Ok(Patch::default()),
    }
}

/// Lower-case name of a filter response, as written in patch files.
pub fn filter_type_name(filter_type: FilterType) -> &'static str {
    match filter_type {
        FilterType::LowPass => "lowpass",
        FilterType::HighPass => "highpass",
        FilterType::Peaking => "peaking",
        FilterType::AllPass => "allpass",
        FilterType::BandPass => "bandpass",
    }
}

/// Equal-tempered frequency of a MIDI note number.
pub fn note_to_hz(note: u8) -> f32 {
    440.0 * libm::exp2f((f32::from(note) - 69.0) / 12.0)
}
