//! Crybaby auto-wah
//!
//! Model of the classic wah pedal: one resonant biquad whose denominator is an
//! affine function of the pedal position. The circuit-derived parts are computed
//! once; moving the pedal costs a handful of multiply-adds and one division, so
//! auto mode can sweep the filter at sample rate from an LFO.

use crate::dsp::biquad::{BiquadFilter, CoefficientSet};
use crate::dsp::effect::{
    block_frames, param_bool, param_f32, param_str, unknown_param, Effect, ProcessConfig,
};
use crate::dsp::lfo::{LfoMode, LfoParams, LowFrequencyOscillator};
use crate::error::{DafxError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::f64::consts::PI;

// ============================================================================
// Circuit Constants
// ============================================================================

/// Forward gain of the transistor stage
const GAIN_FORWARD: f64 = -36.0;

/// Resonance frequency of the inductor network in Hz
const RESONANCE_HZ: f64 = 2250.7907903927653;

/// Quality factor of the resonance
const RESONANCE_Q: f64 = 2.748152194338287;

/// Input gain
const GAIN_INPUT: f64 = 0.02158273381294964;

/// Band-pass gain
const GAIN_BANDPASS: f64 = 0.10398629135096286;

/// Slight trim on the pedal travel to match measured curves
const PEDAL_TRIM: f32 = -0.15;

/// Lowest pedal position
pub const PEDAL_MIN: f32 = 0.01;

/// Highest pedal position
pub const PEDAL_MAX: f32 = 0.99;

/// Default wet/dry balance
pub const DEFAULT_WAH_BALANCE: f32 = 0.75;

/// Default pedal position
pub const DEFAULT_PEDAL_POSITION: f32 = 0.5;

/// Default LFO rate in beats per minute
pub const DEFAULT_LFO_RATE_BPM: f32 = 120.0;

// ============================================================================
// Mode
// ============================================================================

/// How the pedal position is driven
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CrybabyMode {
    /// Dry signal passes unchanged
    Bypass,
    /// Fixed pedal position
    #[default]
    Manual,
    /// Pedal swept by the internal LFO
    Auto,
}

impl CrybabyMode {
    /// Parse mode from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "bypass" => Some(CrybabyMode::Bypass),
            "manual" => Some(CrybabyMode::Manual),
            "auto" => Some(CrybabyMode::Auto),
            _ => None,
        }
    }

    /// Get string identifier
    pub fn to_str(&self) -> &'static str {
        match self {
            CrybabyMode::Bypass => "bypass",
            CrybabyMode::Manual => "manual",
            CrybabyMode::Auto => "auto",
        }
    }
}

// ============================================================================
// Parameters
// ============================================================================

/// Crybaby parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrybabyParams {
    /// Processing mode
    pub mode: CrybabyMode,
    /// Manual pedal position (0.01 to 0.99)
    pub pedal_position: f32,
    /// Wet share of the output (0 to 1)
    pub wah_balance: f32,
    /// Oscillator driving the pedal in auto mode
    pub lfo: LfoParams,
}

impl Default for CrybabyParams {
    fn default() -> Self {
        Self {
            mode: CrybabyMode::Manual,
            pedal_position: DEFAULT_PEDAL_POSITION,
            wah_balance: DEFAULT_WAH_BALANCE,
            lfo: LfoParams {
                mode: LfoMode::Sine,
                frequency_hz: DEFAULT_LFO_RATE_BPM / 60.0,
                amplitude: 0.5,
                offset: 0.5,
                clip_high: 1.0,
                clip_low: 0.0,
                balance: 0.5,
            },
        }
    }
}

impl CrybabyParams {
    /// Clamp parameters to valid ranges
    pub fn clamp(&mut self, sample_rate: f32) {
        self.pedal_position = clamp_pedal(self.pedal_position);
        self.wah_balance = clamp_unit(self.wah_balance);
        self.lfo.clamp(sample_rate);
    }
}

fn clamp_pedal(pos: f32) -> f32 {
    if pos.is_nan() {
        return DEFAULT_PEDAL_POSITION;
    }
    pos.clamp(PEDAL_MIN, PEDAL_MAX)
}

fn clamp_unit(x: f32) -> f32 {
    if x.is_nan() {
        return 0.0;
    }
    x.clamp(0.0, 1.0)
}

// ============================================================================
// Crybaby
// ============================================================================

/// Wah filter with manual and LFO-driven pedal
#[derive(Debug, Clone)]
pub struct Crybaby {
    config: ProcessConfig,
    mode: CrybabyMode,
    pedal_position: f32,
    wah_balance: f32,
    /// Rescaled pedal position currently applied
    gp: f32,
    // Fixed numerator
    b0: f32,
    b1: f32,
    b2: f32,
    // Pedal-independent part of the denominator
    a0b: f32,
    a1b: f32,
    a2b: f32,
    // Pedal-dependent slope of the denominator
    a0c: f32,
    a1c: f32,
    a2c: f32,
    filter: BiquadFilter,
    lfo: LowFrequencyOscillator,
    lfo_block: Vec<f32>,
}

impl Crybaby {
    /// Create a wah in manual mode with the pedal half way
    pub fn new(config: ProcessConfig) -> Result<Self> {
        Self::with_params(config, CrybabyParams::default())
    }

    /// Create a wah with the given parameters
    pub fn with_params(config: ProcessConfig, params: CrybabyParams) -> Result<Self> {
        config.validate()?;
        let mut params = params;
        params.clamp(config.sample_rate);

        let w0 = 2.0 * PI * RESONANCE_HZ / config.sample_rate as f64;
        let (s, c) = w0.sin_cos();
        let alpha = s / (2.0 * RESONANCE_Q);

        // High-pass numerator of the feedback network
        let b0h = (1.0 + c) * 0.5;
        let b1h = -(1.0 + c);
        let b2h = (1.0 + c) * 0.5;

        // Band-pass section
        let b0b = RESONANCE_Q * alpha;
        let b2b = -RESONANCE_Q * alpha;
        let a0b = 1.0 + alpha;
        let a1b = -2.0 * c;
        let a2b = 1.0 - alpha;

        let mut crybaby = Self {
            config,
            mode: params.mode,
            pedal_position: params.pedal_position,
            wah_balance: params.wah_balance,
            gp: 0.0,
            b0: (GAIN_BANDPASS * b0b + GAIN_INPUT * a0b) as f32,
            b1: (GAIN_INPUT * a1b) as f32,
            b2: (GAIN_BANDPASS * b2b + GAIN_INPUT * a2b) as f32,
            a0b: a0b as f32,
            a1b: a1b as f32,
            a2b: a2b as f32,
            a0c: (-GAIN_FORWARD * b0h) as f32,
            a1c: (-GAIN_FORWARD * b1h) as f32,
            a2c: (-GAIN_FORWARD * b2h) as f32,
            filter: BiquadFilter::new(),
            lfo: LowFrequencyOscillator::with_params(config, params.lfo)?,
            lfo_block: vec![0.0; config.block_size],
        };
        crybaby.update_control(params.pedal_position);

        log::debug!(
            "crybaby: mode {}, pedal {:.2}, balance {:.2}",
            crybaby.mode.to_str(),
            crybaby.pedal_position,
            crybaby.wah_balance
        );
        Ok(crybaby)
    }

    /// Current parameters
    pub fn params(&self) -> CrybabyParams {
        CrybabyParams {
            mode: self.mode,
            pedal_position: self.pedal_position,
            wah_balance: self.wah_balance,
            lfo: self.lfo.params().clone(),
        }
    }

    /// Apply parameters; the LFO phase is kept
    pub fn set_params(&mut self, params: CrybabyParams) {
        self.lfo.set_params(params.lfo);
        self.set_wah_balance(params.wah_balance);
        self.set_pedal_position(params.pedal_position);
        self.set_mode(params.mode);
    }

    /// Select the processing mode
    ///
    /// Returning to manual restores the manual pedal position.
    pub fn set_mode(&mut self, mode: CrybabyMode) {
        self.mode = mode;
        if mode == CrybabyMode::Manual {
            self.update_control(self.pedal_position);
        }
    }

    /// Current processing mode
    pub fn mode(&self) -> CrybabyMode {
        self.mode
    }

    /// Set the manual pedal position (clamped to 0.01..=0.99)
    pub fn set_pedal_position(&mut self, pos: f32) {
        self.pedal_position = clamp_pedal(pos);
        if self.mode != CrybabyMode::Auto {
            self.update_control(self.pedal_position);
        }
    }

    /// Manual pedal position
    pub fn pedal_position(&self) -> f32 {
        self.pedal_position
    }

    /// Set the wet share of the output (clamped to 0..=1)
    pub fn set_wah_balance(&mut self, balance: f32) {
        self.wah_balance = clamp_unit(balance);
    }

    /// Wet share of the output
    pub fn wah_balance(&self) -> f32 {
        self.wah_balance
    }

    /// Rescaled pedal value currently driving the filter
    pub fn control(&self) -> f32 {
        self.gp
    }

    /// Coefficients currently loaded in the filter
    pub fn coefficients(&self) -> CoefficientSet {
        self.filter.coefficients()
    }

    /// Move the pedal: recompute the denominator and load the filter
    ///
    /// `pos` is clamped to `PEDAL_MIN..=PEDAL_MAX` and trimmed before use.
    #[inline]
    pub fn update_control(&mut self, pos: f32) {
        let gx = if pos.is_nan() {
            DEFAULT_PEDAL_POSITION
        } else {
            pos.clamp(PEDAL_MIN, PEDAL_MAX)
        };
        self.gp = gx * (1.0 + PEDAL_TRIM);

        let a0 = self.a0b + self.gp * self.a0c;
        let ax = 1.0 / a0;
        let a1 = (self.a1b + self.gp * self.a1c) * ax;
        let a2 = (self.a2b + self.gp * self.a2c) * ax;

        self.filter
            .set_coefficients(CoefficientSet::new(self.b0, self.b1, self.b2, 1.0, a1, a2));
    }

    // ------------------------------------------------------------------
    // LFO pass-through
    // ------------------------------------------------------------------

    /// Set the sweep rate in beats per minute
    pub fn set_lfo_rate_bpm(&mut self, bpm: f32) {
        self.lfo.set_rate_bpm(bpm);
    }

    /// Select the sweep waveform
    pub fn set_lfo_mode(&mut self, mode: LfoMode) {
        self.lfo.set_mode(mode);
    }

    /// Set the sweep amplitude
    pub fn set_lfo_amplitude(&mut self, amplitude: f32) {
        self.lfo.set_amplitude(amplitude);
    }

    /// Set the sweep offset
    pub fn set_lfo_offset(&mut self, offset: f32) {
        self.lfo.set_offset(offset);
    }

    /// Set the sawtooth rise/fall balance
    pub fn set_lfo_balance(&mut self, balance: f32) {
        self.lfo.set_balance(balance);
    }

    /// Set the sweep's upper clip bound
    pub fn set_lfo_clip_high(&mut self, clip_high: f32) {
        self.lfo.set_clip_high(clip_high);
    }

    /// Set the sweep's lower clip bound
    pub fn set_lfo_clip_low(&mut self, clip_low: f32) {
        self.lfo.set_clip_low(clip_low);
    }

    /// Restart the sweep
    pub fn reset_lfo_phase(&mut self) {
        self.lfo.reset_phase();
    }

    /// Sweep oscillator
    pub fn lfo(&self) -> &LowFrequencyOscillator {
        &self.lfo
    }

    // ------------------------------------------------------------------
    // Processing
    // ------------------------------------------------------------------

    /// Filter the block at the fixed pedal position and blend with the dry signal
    pub fn process_manual(&mut self, input: &[f32], output: &mut [f32]) {
        let n = block_frames(self.config.block_size, input, output);
        let balance = self.wah_balance;
        let dry_share = 1.0 - balance;

        self.filter.process_block(&input[..n], &mut output[..n]);
        for (out, &dry) in output[..n].iter_mut().zip(&input[..n]) {
            *out = balance * *out + dry_share * dry;
        }
    }

    /// Sweep the pedal from the LFO, recomputing the filter every sample
    ///
    /// LFO output is clamped to `0..=1` and inverted, so a rising LFO closes
    /// the pedal toward the bright end.
    pub fn process_auto(&mut self, input: &[f32], output: &mut [f32]) {
        let n = block_frames(self.config.block_size, input, output);
        let balance = self.wah_balance;
        let dry_share = 1.0 - balance;

        self.lfo.generate_block(&mut self.lfo_block[..n]);
        for i in 0..n {
            let pos = 1.0 - self.lfo_block[i].clamp(0.0, 1.0);
            self.update_control(pos);
            let dry = input[i];
            let wet = self.filter.process_sample(dry);
            output[i] = balance * wet + dry_share * dry;
        }
    }
}

impl Effect for Crybaby {
    fn effect_type(&self) -> &'static str {
        "crybaby"
    }

    fn display_name(&self) -> &'static str {
        "Crybaby Wah"
    }

    fn config(&self) -> ProcessConfig {
        self.config
    }

    fn process(&mut self, input: &[f32], output: &mut [f32]) {
        match self.mode {
            CrybabyMode::Bypass => self.bypass(input, output),
            CrybabyMode::Manual => self.process_manual(input, output),
            CrybabyMode::Auto => self.process_auto(input, output),
        }
    }

    fn reset(&mut self) {
        self.filter.reset();
        self.lfo.reset_phase();
    }

    fn get_params(&self) -> Value {
        let lfo = self.lfo.params();
        json!({
            "mode": self.mode.to_str(),
            "pedal": self.pedal_position,
            "balance": self.wah_balance,
            "lfo_rate_bpm": lfo.frequency_hz * 60.0,
            "lfo_mode": lfo.mode.to_str(),
            "lfo_amplitude": lfo.amplitude,
            "lfo_offset": lfo.offset,
            "lfo_balance": lfo.balance,
            "lfo_clip_high": lfo.clip_high,
            "lfo_clip_low": lfo.clip_low,
        })
    }

    fn set_param(&mut self, name: &str, value: &Value) -> Result<()> {
        match name {
            "mode" => {
                let s = param_str(name, value)?;
                let mode = CrybabyMode::from_str(s).ok_or_else(|| {
                    DafxError::invalid_param(name, value, "bypass, manual or auto")
                })?;
                self.set_mode(mode);
            }
            "pedal" => self.set_pedal_position(param_f32(name, value)?),
            "balance" => self.set_wah_balance(param_f32(name, value)?),
            "lfo_rate_bpm" => self.set_lfo_rate_bpm(param_f32(name, value)?),
            "lfo_mode" => {
                let s = param_str(name, value)?;
                let mode = LfoMode::from_str(s)
                    .ok_or_else(|| DafxError::invalid_param(name, value, "sine or sawtooth"))?;
                self.set_lfo_mode(mode);
            }
            "lfo_amplitude" => self.set_lfo_amplitude(param_f32(name, value)?),
            "lfo_offset" => self.set_lfo_offset(param_f32(name, value)?),
            "lfo_balance" => self.set_lfo_balance(param_f32(name, value)?),
            "lfo_clip_high" => self.set_lfo_clip_high(param_f32(name, value)?),
            "lfo_clip_low" => self.set_lfo_clip_low(param_f32(name, value)?),
            "lfo_reset_phase" => {
                if param_bool(name, value)? {
                    self.reset_lfo_phase();
                }
            }
            _ => return Err(unknown_param(self.effect_type(), name)),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SAMPLE_RATE: f32 = 48000.0;
    const BLOCK: usize = 32;

    fn create_sine(frequency: f32, num_samples: usize) -> Vec<f32> {
        (0..num_samples)
            .map(|i| (2.0 * std::f32::consts::PI * frequency * i as f32 / SAMPLE_RATE).sin())
            .collect()
    }

    fn calculate_rms(samples: &[f32]) -> f32 {
        let sum_sq: f32 = samples.iter().map(|s| s * s).sum();
        (sum_sq / samples.len() as f32).sqrt()
    }

    fn wet_only(pedal: f32) -> Crybaby {
        Crybaby::with_params(
            ProcessConfig::new(SAMPLE_RATE, BLOCK).unwrap(),
            CrybabyParams {
                pedal_position: pedal,
                wah_balance: 1.0,
                ..Default::default()
            },
        )
        .unwrap()
    }

    fn run(effect: &mut Crybaby, input: &[f32]) -> Vec<f32> {
        let mut output = vec![0.0; input.len()];
        for (inp, out) in input.chunks(BLOCK).zip(output.chunks_mut(BLOCK)) {
            effect.process(inp, out);
        }
        output
    }

    fn steady_gain(pedal: f32, frequency: f32) -> f32 {
        let mut wah = wet_only(pedal);
        let input = create_sine(frequency, 9600);
        let output = run(&mut wah, &input);
        calculate_rms(&output[4800..]) / calculate_rms(&input[4800..])
    }

    #[test]
    fn test_pedal_moves_resonance() {
        // Near the heel the resonance sits around 1.1 kHz, near the toe around 400 Hz
        let heel_1k = steady_gain(0.1, 1000.0);
        let heel_500 = steady_gain(0.1, 500.0);
        assert!(heel_1k > 3.0 * heel_500, "{} vs {}", heel_1k, heel_500);

        let toe_1k = steady_gain(0.9, 1000.0);
        let toe_500 = steady_gain(0.9, 500.0);
        assert!(toe_500 > 3.0 * toe_1k, "{} vs {}", toe_500, toe_1k);
    }

    #[test]
    fn test_update_control_clamps_and_trims() {
        let mut wah = wet_only(0.5);
        wah.update_control(2.0);
        assert!((wah.control() - PEDAL_MAX * 0.85).abs() < 1e-6);
        wah.update_control(-1.0);
        assert!((wah.control() - PEDAL_MIN * 0.85).abs() < 1e-6);
        assert_eq!(wah.coefficients().a0, 1.0);
    }

    #[test]
    fn test_balance_zero_is_dry() {
        let mut wah = wet_only(0.5);
        wah.set_wah_balance(0.0);
        let input = create_sine(700.0, 256);
        let output = run(&mut wah, &input);
        assert_eq!(input, output);
    }

    #[test]
    fn test_bypass_mode_is_bit_identical() {
        let mut wah = wet_only(0.5);
        wah.set_mode(CrybabyMode::Bypass);
        let input = create_sine(700.0, 256);
        assert_eq!(run(&mut wah, &input), input);
    }

    #[test]
    fn test_auto_with_constant_lfo_matches_manual() {
        let config = ProcessConfig::new(SAMPLE_RATE, BLOCK).unwrap();
        let mut auto = Crybaby::new(config).unwrap();
        auto.set_mode(CrybabyMode::Auto);
        auto.set_lfo_amplitude(0.0);
        auto.set_lfo_offset(0.2);

        let mut manual = Crybaby::new(config).unwrap();
        manual.set_pedal_position(1.0 - 0.2_f32);

        let input = create_sine(600.0, 512);
        assert_eq!(run(&mut auto, &input), run(&mut manual, &input));
    }

    #[test]
    fn test_auto_mode_sweeps_control() {
        let mut wah = wet_only(0.5);
        wah.set_mode(CrybabyMode::Auto);
        wah.set_lfo_rate_bpm(600.0);

        let input = create_sine(600.0, 4800);
        let mut controls = Vec::new();
        for (inp, mut out) in input.chunks(BLOCK).zip(vec![vec![0.0; BLOCK]; 150]) {
            wah.process(inp, &mut out);
            assert!(out.iter().all(|s| s.is_finite()));
            controls.push(wah.control());
        }

        let max = controls.iter().cloned().fold(f32::MIN, f32::max);
        let min = controls.iter().cloned().fold(f32::MAX, f32::min);
        assert!(max - min > 0.5, "control range {}..{}", min, max);
    }

    #[test]
    fn test_switching_back_to_manual_restores_pedal() {
        let mut wah = wet_only(0.3);
        let manual_coeffs = wah.coefficients();
        wah.set_mode(CrybabyMode::Auto);
        let input = create_sine(600.0, 256);
        run(&mut wah, &input);
        wah.set_mode(CrybabyMode::Manual);
        assert_eq!(wah.coefficients(), manual_coeffs);
    }

    #[test]
    fn test_params_by_name() {
        let mut wah = wet_only(0.5);
        wah.set_param("mode", &json!("auto")).unwrap();
        wah.set_param("lfo_rate_bpm", &json!(90)).unwrap();
        wah.set_param("lfo_mode", &json!("saw")).unwrap();
        wah.set_param("balance", &json!(1.5)).unwrap();

        let params = wah.get_params();
        assert_eq!(params["mode"], json!("auto"));
        assert_eq!(params["lfo_mode"], json!("sawtooth"));
        assert_eq!(params["balance"], json!(1.0));
        assert!((wah.lfo().frequency() - 1.5).abs() < 1e-6);

        assert!(wah.set_param("mode", &json!("stomp")).is_err());
        assert!(wah.set_param("fuzz", &json!(1)).is_err());
    }
}
