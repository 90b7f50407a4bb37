//! CLI Command Implementations
//!
//! Implements the actual logic for each CLI command.

use std::fs;
use std::path::Path;

use log::info;
use serde_json::{json, Value};

use crate::dsp::{
    create_effect, Crossover, CrossoverParams, Effect, Overdrive, ProcessConfig, SoftClipper,
    EFFECT_NAMES,
};
use crate::engine::{read_wav, render_crossover, render_effect, write_wav, WavAudio};
use crate::error::{DafxError, Result};

/// Load an optional JSON parameter file
pub fn load_params(path: Option<&Path>) -> Result<Option<Value>> {
    let Some(path) = path else {
        return Ok(None);
    };
    if !path.exists() {
        return Err(DafxError::FileNotFound {
            path: path.display().to_string(),
        });
    }
    let text = fs::read_to_string(path)?;
    Ok(Some(serde_json::from_str(&text)?))
}

/// Render a WAV file through one effect
///
/// Each channel gets its own instance so no state leaks between channels.
pub fn render(
    effect_name: &str,
    input: &Path,
    output: &Path,
    params: Option<&Path>,
    block_size: usize,
    bit_depth: u16,
) -> Result<()> {
    let params = load_params(params)?;
    let audio = read_wav(input)?;
    let config = ProcessConfig::new(audio.sample_rate as f32, block_size)?;

    info!(
        "Rendering {} through {} ({} channel(s), {} frames)",
        input.display(),
        effect_name,
        audio.num_channels(),
        audio.num_frames()
    );

    let mut channels = Vec::with_capacity(audio.num_channels());
    for samples in &audio.channels {
        let mut effect = create_effect(effect_name, config)?;
        if let Some(params) = &params {
            effect.apply_params(params)?;
        }
        channels.push(render_effect(effect.as_mut(), samples));
    }

    write_wav(
        &WavAudio {
            sample_rate: audio.sample_rate,
            channels,
        },
        output,
        bit_depth,
    )?;
    info!("Wrote {}", output.display());
    Ok(())
}

/// Split a WAV file into low and high band files
pub fn split(
    input: &Path,
    low: &Path,
    high: &Path,
    cutoff_hz: f32,
    cascade_order: usize,
    block_size: usize,
    bit_depth: u16,
) -> Result<()> {
    let audio = read_wav(input)?;
    let config = ProcessConfig::new(audio.sample_rate as f32, block_size)?;
    let params = CrossoverParams {
        cutoff_hz,
        cascade_order,
    };

    info!(
        "Splitting {} at {} Hz with {} stage(s) per band",
        input.display(),
        cutoff_hz,
        cascade_order
    );

    let mut low_channels = Vec::with_capacity(audio.num_channels());
    let mut high_channels = Vec::with_capacity(audio.num_channels());
    for samples in &audio.channels {
        let mut crossover = Crossover::with_params(config, params.clone())?;
        let (l, h) = render_crossover(&mut crossover, samples);
        low_channels.push(l);
        high_channels.push(h);
    }

    for (path, channels) in [(low, low_channels), (high, high_channels)] {
        write_wav(
            &WavAudio {
                sample_rate: audio.sample_rate,
                channels,
            },
            path,
            bit_depth,
        )?;
        info!("Wrote {}", path.display());
    }
    Ok(())
}

/// Build the display curve of a waveshaping effect as JSON
pub fn curve_json(
    effect_name: &str,
    params: Option<&Value>,
    block_size: usize,
    sample_rate: f32,
) -> Result<Value> {
    let config = ProcessConfig::new(sample_rate, block_size)?;
    let (effect_type, points) = match effect_name.to_lowercase().as_str() {
        "dynamics" | "overdrive" => {
            let mut overdrive = Overdrive::new(config)?;
            if let Some(params) = params {
                overdrive.apply_params(params)?;
            }
            (overdrive.effect_type(), overdrive.display_curve().to_vec())
        }
        "softclip" | "soft_clipper" => {
            let mut clipper = SoftClipper::new(config)?;
            if let Some(params) = params {
                clipper.apply_params(params)?;
            }
            (clipper.effect_type(), clipper.display_curve().to_vec())
        }
        _ => {
            return Err(DafxError::UnknownEffect {
                name: effect_name.to_string(),
            })
        }
    };

    Ok(json!({
        "effect": effect_type,
        "points": points,
    }))
}

/// Print a display curve to stdout
pub fn curve(
    effect_name: &str,
    params: Option<&Path>,
    block_size: usize,
    sample_rate: f32,
) -> Result<()> {
    let params = load_params(params)?;
    let curve = curve_json(effect_name, params.as_ref(), block_size, sample_rate)?;
    println!("{}", serde_json::to_string_pretty(&curve)?);
    Ok(())
}

/// Print the available effects
pub fn list() -> Result<()> {
    println!("Effects (render):");
    for name in EFFECT_NAMES {
        let effect = create_effect(name, ProcessConfig::default())?;
        println!("  {:<10} {}", name, effect.display_name());
    }
    println!("Band splitter (split):");
    println!("  {:<10} Crossover", "crossover");
    Ok(())
}
