//! Tremolo
//!
//! Amplitude modulation by an LFO. Depth and sharpness set the LFO's amplitude,
//! offset and clip range so the modulator always stays inside `[1 - depth, 1]`:
//! a larger sharpness overdrives the waveform into its clip bounds, squaring it
//! off.

use crate::dsp::effect::{
    block_frames, param_f32, param_str, unknown_param, Effect, ProcessConfig,
};
use crate::dsp::lfo::{LfoMode, LfoParams, LowFrequencyOscillator};
use crate::error::{DafxError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

// ============================================================================
// Constants
// ============================================================================

/// Default rate in beats per minute
pub const DEFAULT_RATE_BPM: f32 = 300.0;

/// Default depth in percent
pub const DEFAULT_DEPTH_PERCENT: f32 = 50.0;

const MAX_SHARPNESS: f32 = 1.0;
const MAX_POST_GAIN: f32 = 4.0;

// ============================================================================
// Parameters
// ============================================================================

/// Tremolo parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TremoloParams {
    /// Modulation rate in beats per minute
    pub rate_bpm: f32,
    /// Modulation depth in percent (0 to 100)
    pub depth_percent: f32,
    /// Waveform squaring (0 to 1)
    pub sharpness: f32,
    /// Linear gain after modulation (0 to 4)
    pub post_gain: f32,
    /// Modulator waveform
    pub waveform: LfoMode,
}

impl Default for TremoloParams {
    fn default() -> Self {
        Self {
            rate_bpm: DEFAULT_RATE_BPM,
            depth_percent: DEFAULT_DEPTH_PERCENT,
            sharpness: 0.0,
            post_gain: 1.0,
            waveform: LfoMode::Sine,
        }
    }
}

impl TremoloParams {
    /// Clamp parameters to valid ranges
    pub fn clamp(&mut self) {
        self.rate_bpm = if self.rate_bpm.is_nan() { 0.0 } else { self.rate_bpm.max(0.0) };
        self.depth_percent = if self.depth_percent.is_nan() {
            0.0
        } else {
            self.depth_percent.clamp(0.0, 100.0)
        };
        self.sharpness = if self.sharpness.is_nan() {
            0.0
        } else {
            self.sharpness.clamp(0.0, MAX_SHARPNESS)
        };
        self.post_gain = if self.post_gain.is_nan() {
            1.0
        } else {
            self.post_gain.clamp(0.0, MAX_POST_GAIN)
        };
    }

    /// LFO settings for this depth and sharpness
    pub fn lfo_params(&self) -> LfoParams {
        let depth = self.depth_percent / 100.0;
        let amplification = 1.0 + 4.0 * self.sharpness;
        LfoParams {
            mode: self.waveform,
            frequency_hz: self.rate_bpm / 60.0,
            amplitude: 0.5 * depth * amplification,
            offset: 1.0 - 0.5 * depth,
            clip_high: 1.0,
            clip_low: 1.0 - depth,
            ..Default::default()
        }
    }
}

// ============================================================================
// Tremolo
// ============================================================================

/// LFO-driven amplitude modulation
#[derive(Debug, Clone)]
pub struct Tremolo {
    config: ProcessConfig,
    params: TremoloParams,
    lfo: LowFrequencyOscillator,
    lfo_block: Vec<f32>,
}

impl Tremolo {
    /// Create a tremolo with default parameters
    pub fn new(config: ProcessConfig) -> Result<Self> {
        Self::with_params(config, TremoloParams::default())
    }

    /// Create a tremolo with the given parameters
    pub fn with_params(config: ProcessConfig, params: TremoloParams) -> Result<Self> {
        config.validate()?;
        let mut params = params;
        params.clamp();
        Ok(Self {
            config,
            lfo: LowFrequencyOscillator::with_params(config, params.lfo_params())?,
            params,
            lfo_block: vec![0.0; config.block_size],
        })
    }

    /// Current parameters
    pub fn params(&self) -> &TremoloParams {
        &self.params
    }

    /// Apply parameters; the modulator phase is kept
    pub fn set_params(&mut self, params: TremoloParams) {
        self.params = params;
        self.update_lfo();
    }

    /// Set the rate in beats per minute
    pub fn set_rate_bpm(&mut self, bpm: f32) {
        self.params.rate_bpm = bpm;
        self.update_lfo();
    }

    /// Set the depth in percent
    pub fn set_depth(&mut self, depth_percent: f32) {
        self.params.depth_percent = depth_percent;
        self.update_lfo();
    }

    /// Set the waveform squaring
    pub fn set_sharpness(&mut self, sharpness: f32) {
        self.params.sharpness = sharpness;
        self.update_lfo();
    }

    /// Set the linear post gain
    pub fn set_post_gain(&mut self, gain: f32) {
        self.params.post_gain = gain;
        self.params.clamp();
    }

    /// Select the modulator waveform
    pub fn set_waveform(&mut self, waveform: LfoMode) {
        self.params.waveform = waveform;
        self.update_lfo();
    }

    /// Modulator
    pub fn lfo(&self) -> &LowFrequencyOscillator {
        &self.lfo
    }

    fn update_lfo(&mut self) {
        self.params.clamp();
        self.lfo.set_params(self.params.lfo_params());
    }
}

impl Effect for Tremolo {
    fn effect_type(&self) -> &'static str {
        "tremolo"
    }

    fn display_name(&self) -> &'static str {
        "Tremolo"
    }

    fn config(&self) -> ProcessConfig {
        self.config
    }

    fn process(&mut self, input: &[f32], output: &mut [f32]) {
        let n = block_frames(self.config.block_size, input, output);
        let post_gain = self.params.post_gain;

        self.lfo.generate_block(&mut self.lfo_block[..n]);
        for i in 0..n {
            output[i] = input[i] * self.lfo_block[i] * post_gain;
        }
    }

    fn reset(&mut self) {
        self.lfo.reset_phase();
    }

    fn get_params(&self) -> Value {
        json!({
            "rate_bpm": self.params.rate_bpm,
            "depth": self.params.depth_percent,
            "sharpness": self.params.sharpness,
            "post_gain": self.params.post_gain,
            "waveform": self.params.waveform.to_str(),
        })
    }

    fn set_param(&mut self, name: &str, value: &Value) -> Result<()> {
        match name {
            "rate_bpm" => self.set_rate_bpm(param_f32(name, value)?),
            "depth" => self.set_depth(param_f32(name, value)?),
            "sharpness" => self.set_sharpness(param_f32(name, value)?),
            "post_gain" => self.set_post_gain(param_f32(name, value)?),
            "waveform" => {
                let s = param_str(name, value)?;
                let waveform = LfoMode::from_str(s)
                    .ok_or_else(|| DafxError::invalid_param(name, value, "sine or sawtooth"))?;
                self.set_waveform(waveform);
            }
            _ => return Err(unknown_param(self.effect_type(), name)),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use test_case::test_case;

    const SAMPLE_RATE: f32 = 48000.0;
    const BLOCK: usize = 64;

    fn tremolo() -> Tremolo {
        Tremolo::new(ProcessConfig::new(SAMPLE_RATE, BLOCK).unwrap()).unwrap()
    }

    /// Modulator range seen by a constant unit input over one second
    fn modulation_range(tremolo: &mut Tremolo) -> (f32, f32) {
        let input = vec![1.0; BLOCK];
        let mut output = vec![0.0; BLOCK];
        let mut min = f32::MAX;
        let mut max = f32::MIN;
        for _ in 0..(SAMPLE_RATE as usize / BLOCK) {
            tremolo.process(&input, &mut output);
            for &y in &output {
                min = min.min(y);
                max = max.max(y);
            }
        }
        (min, max)
    }

    #[test]
    fn test_full_depth_spans_unit_range() {
        let mut tremolo = tremolo();
        tremolo.set_depth(100.0);
        let (min, max) = modulation_range(&mut tremolo);
        assert!(min >= 0.0 && min < 0.01, "min {}", min);
        assert!(max <= 1.0 && max > 0.99, "max {}", max);
    }

    #[test_case(0.0 ; "smooth")]
    #[test_case(1.0 ; "sharp")]
    fn test_half_depth_stays_in_upper_half(sharpness: f32) {
        let mut tremolo = tremolo();
        tremolo.set_sharpness(sharpness);
        let (min, max) = modulation_range(&mut tremolo);
        assert!(min >= 0.5 - 1e-6, "min {}", min);
        assert!(max <= 1.0 + 1e-6, "max {}", max);
    }

    #[test]
    fn test_sharpness_squares_the_modulator() {
        let count_at_bounds = |sharpness: f32| {
            let mut tremolo = tremolo();
            tremolo.set_depth(100.0);
            tremolo.set_sharpness(sharpness);
            let input = vec![1.0; BLOCK];
            let mut output = vec![0.0; BLOCK];
            let mut count = 0;
            for _ in 0..(SAMPLE_RATE as usize / BLOCK) {
                tremolo.process(&input, &mut output);
                count += output.iter().filter(|&&y| y == 0.0 || y == 1.0).count();
            }
            count
        };
        assert!(count_at_bounds(1.0) > 10 * count_at_bounds(0.0).max(1));
    }

    #[test]
    fn test_zero_depth_is_unity() {
        let mut tremolo = tremolo();
        tremolo.set_depth(0.0);
        let input: Vec<f32> = (0..BLOCK).map(|i| (i as f32 * 0.2).sin()).collect();
        let mut output = vec![0.0; BLOCK];
        tremolo.process(&input, &mut output);
        assert_eq!(input, output);
    }

    #[test]
    fn test_post_gain_scales_output() {
        let mut tremolo = tremolo();
        tremolo.set_depth(0.0);
        tremolo.set_post_gain(0.5);
        let input = vec![0.8; BLOCK];
        let mut output = vec![0.0; BLOCK];
        tremolo.process(&input, &mut output);
        for &y in &output {
            assert_abs_diff_eq!(y, 0.4, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_lfo_mapping() {
        let params = TremoloParams {
            depth_percent: 60.0,
            sharpness: 0.5,
            ..Default::default()
        };
        let lfo = params.lfo_params();
        assert_abs_diff_eq!(lfo.frequency_hz, 5.0);
        assert_abs_diff_eq!(lfo.amplitude, 0.9, epsilon = 1e-6);
        assert_abs_diff_eq!(lfo.offset, 0.7, epsilon = 1e-6);
        assert_abs_diff_eq!(lfo.clip_low, 0.4, epsilon = 1e-6);
        assert_eq!(lfo.clip_high, 1.0);
    }

    #[test]
    fn test_params_by_name() {
        let mut tremolo = tremolo();
        tremolo.set_param("depth", &json!(150)).unwrap();
        tremolo.set_param("rate_bpm", &json!(120)).unwrap();
        tremolo.set_param("waveform", &json!("saw")).unwrap();
        assert_eq!(
            tremolo.get_params(),
            json!({
                "rate_bpm": 120.0,
                "depth": 100.0,
                "sharpness": 0.0,
                "post_gain": 1.0,
                "waveform": "sawtooth",
            })
        );
        assert!((tremolo.lfo().frequency() - 2.0).abs() < 1e-6);
        assert!(tremolo.set_param("speed", &json!(1)).is_err());
    }
}
