//! Integration Tests
//!
//! End-to-end tests for the DAFX effect units through the public API.

use dafx::dsp::{
    create_effect, BiquadFilter, CoefficientSet, Crossover, CrossoverParams, Crybaby,
    CrybabyMode, IntegerSampleDelayLine, LfoMode, LfoParams, LowFrequencyOscillator,
    Overdrive, ProcessConfig, Tremolo, Vibrato, EFFECT_NAMES,
};
use dafx::engine::{read_wav, render_crossover, render_effect, write_wav, WavAudio};
use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::tempdir;

const SAMPLE_RATE: f32 = 48000.0;

/// Reported by `get_params` but derived from other state
const READ_ONLY_PARAMS: &[&str] = &["delay_samples", "vad_label"];

/// Helper to create a test sine wave
fn create_sine(frequency: f32, num_samples: usize) -> Vec<f32> {
    (0..num_samples)
        .map(|i| {
            let t = i as f64 / SAMPLE_RATE as f64;
            (0.8 * (2.0 * std::f64::consts::PI * frequency as f64 * t).sin()) as f32
        })
        .collect()
}

fn calculate_rms(samples: &[f32]) -> f32 {
    let sum: f32 = samples.iter().map(|s| s * s).sum();
    (sum / samples.len() as f32).sqrt()
}

fn to_db(amplitude: f32) -> f32 {
    20.0 * amplitude.abs().max(1e-6).log10()
}

fn config(block_size: usize) -> ProcessConfig {
    ProcessConfig::new(SAMPLE_RATE, block_size).unwrap()
}

// === Primitive Scenarios ===

#[test]
fn test_identity_biquad_passes_sample() {
    let mut filter = BiquadFilter::with_coefficients(CoefficientSet::identity());
    assert_eq!(filter.process_sample(0.37), 0.37);
}

#[test]
fn test_delay_line_impulse_after_five_ms() {
    let mut line = IntegerSampleDelayLine::new(config(16)).unwrap();
    line.set_delay_ms(5.0);
    assert_eq!(line.delay_samples(), 240);

    let mut impulse = vec![0.0; 480];
    impulse[0] = 1.0;
    let output = render_effect(&mut line, &impulse);

    let peak = output
        .iter()
        .position(|&y| y == 1.0)
        .expect("impulse never arrived");
    assert_eq!(peak, 240);
    assert_eq!(output.iter().filter(|&&y| y != 0.0).count(), 1);
}

#[test]
fn test_lfo_returns_after_one_period() {
    let mut lfo = LowFrequencyOscillator::with_params(
        config(16),
        LfoParams {
            mode: LfoMode::Sine,
            frequency_hz: 1.0,
            amplitude: 1.0,
            offset: 0.0,
            ..Default::default()
        },
    )
    .unwrap();

    let mut output = vec![0.0; 48001];
    lfo.generate_block(&mut output);
    assert!(
        (output[48000] - output[0]).abs() < 1e-3,
        "Expected {} after 48000 samples, got {}",
        output[0],
        output[48000]
    );
}

#[test]
fn test_overdrive_settles_at_compressed_level() {
    let mut od = Overdrive::new(config(64)).unwrap();
    od.set_knee_db(0.0);
    od.set_comp_threshold_db(-20.0);
    od.set_comp_ratio(4.0);

    let input = vec![10f32.powf(-10.0 / 20.0); SAMPLE_RATE as usize];
    let output = render_effect(&mut od, &input);
    let out_db = to_db(output[output.len() - 1]);
    assert!(
        (out_db - (-17.5)).abs() < 0.05,
        "Expected about -17.5 dB, got {:.3} dB",
        out_db
    );
}

// === Composite Units ===

#[test]
fn test_crossover_bands_sum_to_input_level() {
    let mut crossover = Crossover::with_params(
        config(128),
        CrossoverParams {
            cutoff_hz: 1000.0,
            cascade_order: 2,
        },
    )
    .unwrap();

    let input = create_sine(1000.0, 19200);
    let (low, high) = render_crossover(&mut crossover, &input);
    let sum: Vec<f32> = low.iter().zip(&high).map(|(l, h)| l + h).collect();

    let ratio = calculate_rms(&sum[9600..]) / calculate_rms(&input[9600..]);
    assert!((ratio - 1.0).abs() < 0.01, "Summed level ratio {}", ratio);

    // At the cutoff each band sits near -6 dB
    let low_db = to_db(calculate_rms(&low[9600..]) / calculate_rms(&input[9600..]));
    assert!((low_db + 6.0).abs() < 0.5, "Low band at cutoff: {:.2} dB", low_db);
}

#[test]
fn test_crybaby_auto_sweeps_spectrum() {
    let mut wah = Crybaby::new(config(64)).unwrap();
    wah.set_wah_balance(1.0);
    wah.set_mode(CrybabyMode::Auto);
    wah.set_lfo_rate_bpm(60.0);

    let input = create_sine(600.0, 48000);
    let output = render_effect(&mut wah, &input);

    let block_levels: Vec<f32> = output[4800..]
        .chunks(2400)
        .map(calculate_rms)
        .collect();
    let max = block_levels.iter().cloned().fold(f32::MIN, f32::max);
    let min = block_levels.iter().cloned().fold(f32::MAX, f32::min);
    assert!(
        max > 2.0 * min,
        "Expected the sweep to modulate a 600 Hz tone, levels {:?}",
        block_levels
    );
}

#[test]
fn test_tremolo_modulates_amplitude() {
    let mut tremolo = Tremolo::new(config(32)).unwrap();
    tremolo.set_depth(100.0);

    let input = vec![0.5; 48000];
    let output = render_effect(&mut tremolo, &input);

    let max = output.iter().cloned().fold(f32::MIN, f32::max);
    let min = output.iter().cloned().fold(f32::MAX, f32::min);
    assert!(max > 0.49 && max <= 0.5 + 1e-6, "max {}", max);
    assert!(min < 0.01 && min >= -1e-6, "min {}", min);
}

#[test]
fn test_vibrato_preserves_level() {
    let mut vibrato = Vibrato::new(config(64)).unwrap();
    let input = create_sine(440.0, 48000);
    let output = render_effect(&mut vibrato, &input);

    let ratio = calculate_rms(&output[4800..]) / calculate_rms(&input[4800..]);
    assert!((ratio - 1.0).abs() < 0.05, "Level ratio {}", ratio);
    assert_ne!(output, input);
}

// === Parameters and Files ===

#[test]
fn test_effects_by_name_accept_their_own_params() {
    for name in EFFECT_NAMES {
        let mut effect = create_effect(name, config(64)).unwrap();
        let params = effect.get_params();
        let mut writable = params.clone();
        if let Some(map) = writable.as_object_mut() {
            map.retain(|key, _| !READ_ONLY_PARAMS.contains(&key.as_str()));
        }
        effect.apply_params(&writable).unwrap();
        assert_eq!(effect.get_params(), params, "{} params changed", name);
    }
}

#[test]
fn test_apply_params_rejects_unknown_name() {
    let mut effect = create_effect("tremolo", config(64)).unwrap();
    let err = effect
        .apply_params(&json!({"depth": 40, "flange": 1}))
        .unwrap_err();
    assert_eq!(err.error_code(), "UNKNOWN_PARAMETER");
}

#[test]
fn test_render_through_wav_files() {
    let dir = tempdir().unwrap();
    let input_path = dir.path().join("in.wav");
    let output_path = dir.path().join("out.wav");

    let audio = WavAudio {
        sample_rate: 48000,
        channels: vec![create_sine(220.0, 4800), create_sine(330.0, 4800)],
    };
    write_wav(&audio, &input_path, 32).unwrap();

    let loaded = read_wav(&input_path).unwrap();
    let mut channels = Vec::new();
    for samples in &loaded.channels {
        let mut effect = create_effect("delay", config(64)).unwrap();
        effect.apply_params(&json!({"delay_ms": 1.0})).unwrap();
        channels.push(render_effect(effect.as_mut(), samples));
    }
    write_wav(
        &WavAudio {
            sample_rate: loaded.sample_rate,
            channels,
        },
        &output_path,
        32,
    )
    .unwrap();

    let rendered = read_wav(&output_path).unwrap();
    assert_eq!(rendered.num_channels(), 2);
    assert_eq!(rendered.num_frames(), 4800);
    for (orig, delayed) in audio.channels.iter().zip(&rendered.channels) {
        assert_eq!(&delayed[48..], &orig[..4800 - 48]);
    }
}
