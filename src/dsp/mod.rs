//! DSP Effects Library
//!
//! Stateful, block-oriented effect units. Every single-input, single-output unit
//! implements the `Effect` trait; the crossover has two outputs and exposes the
//! same operations inherently.

mod biquad;
mod crossover;
mod crybaby;
mod delay_line;
mod effect;
mod first_order;
mod lfo;
mod overdrive;
mod soft_clipper;
mod tremolo;
mod vibrato;

pub use biquad::{BiquadFilter, CoefficientSet, BUTTERWORTH_Q};
pub use crossover::{Crossover, CrossoverParams, DEFAULT_CASCADE_ORDER, MAX_CASCADE_ORDER};
pub use crybaby::{Crybaby, CrybabyMode, CrybabyParams, PEDAL_MAX, PEDAL_MIN};
pub use delay_line::{DelayLineParams, IntegerSampleDelayLine};
pub use effect::{
    block_frames, Effect, ProcessConfig, DEFAULT_BLOCK_SIZE, DEFAULT_SAMPLE_RATE, MAX_BLOCK_SIZE,
};
pub use first_order::FirstOrderIir;
pub use lfo::{
    LfoMode, LfoParams, LowFrequencyOscillator, SawDirection, WaveShape, WaveformGenerator,
};
pub use overdrive::{
    DynamicsMode, GainComputer, GainCurve, GainFunction, GainLookupTable, Overdrive,
    OverdriveParams, VadPolarity, LUT_SIZE, MAX_CORRECTION_STEPS,
};
pub use soft_clipper::{ClipCurve, SoftClipper, SoftClipperParams};
pub use tremolo::{Tremolo, TremoloParams};
pub use vibrato::{Vibrato, VibratoParams};

use crate::error::{DafxError, Result};

/// Names accepted by `create_effect`
pub const EFFECT_NAMES: &[&str] = &[
    "crybaby",
    "delay",
    "overdrive",
    "softclip",
    "tremolo",
    "vibrato",
];

/// Create a single-input, single-output effect by name with default parameters
///
/// `dynamics` is accepted as an alias for `overdrive`, `wah` for `crybaby`.
pub fn create_effect(name: &str, config: ProcessConfig) -> Result<Box<dyn Effect>> {
    let effect: Box<dyn Effect> = match name.to_lowercase().as_str() {
        "crybaby" | "wah" => Box::new(Crybaby::new(config)?),
        "delay" => Box::new(IntegerSampleDelayLine::new(config)?),
        "overdrive" | "dynamics" => Box::new(Overdrive::new(config)?),
        "softclip" | "soft_clipper" => Box::new(SoftClipper::new(config)?),
        "tremolo" => Box::new(Tremolo::new(config)?),
        "vibrato" => Box::new(Vibrato::new(config)?),
        _ => {
            return Err(DafxError::UnknownEffect {
                name: name.to_string(),
            })
        }
    };
    log::debug!("created {} ({})", effect.display_name(), effect.effect_type());
    Ok(effect)
}
