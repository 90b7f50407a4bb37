//! Vibrato
//!
//! Pitch modulation by sweeping the delay of an integer-sample delay line. An
//! LFO swings the delay between 0 and the excursion set by the depth, and the
//! delay is updated before every sample is read.

use crate::dsp::delay_line::{DelayLineParams, IntegerSampleDelayLine};
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

/// Delay swing at 100% depth, in milliseconds
pub const MAX_EXCURSION_MS: f32 = 5.0;

// ============================================================================
// Parameters
// ============================================================================

/// Vibrato parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VibratoParams {
    /// Modulation rate in beats per minute
    pub rate_bpm: f32,
    /// Modulation depth in percent (0 to 100)
    pub depth_percent: f32,
    /// Modulator waveform
    pub waveform: LfoMode,
    /// Fixed delay used while the depth is zero, in milliseconds
    pub delay_ms: f32,
    /// Delay line capacity in milliseconds
    pub max_delay_ms: f32,
}

impl Default for VibratoParams {
    fn default() -> Self {
        let line = DelayLineParams::default();
        Self {
            rate_bpm: DEFAULT_RATE_BPM,
            depth_percent: DEFAULT_DEPTH_PERCENT,
            waveform: LfoMode::Sine,
            delay_ms: 0.0,
            max_delay_ms: line.max_delay_ms,
        }
    }
}

impl VibratoParams {
    /// Clamp parameters to valid ranges
    pub fn clamp(&mut self) {
        let mut line = DelayLineParams {
            delay_ms: self.delay_ms,
            max_delay_ms: self.max_delay_ms,
        };
        line.clamp();
        self.delay_ms = line.delay_ms;
        self.max_delay_ms = line.max_delay_ms;
        self.rate_bpm = if self.rate_bpm.is_nan() { 0.0 } else { self.rate_bpm.max(0.0) };
        self.depth_percent = if self.depth_percent.is_nan() {
            0.0
        } else {
            self.depth_percent.clamp(0.0, 100.0)
        };
    }

    /// Peak delay swing in milliseconds, limited by the capacity
    pub fn excursion_ms(&self) -> f32 {
        self.depth_percent / 100.0 * MAX_EXCURSION_MS.min(self.max_delay_ms)
    }

    /// LFO settings sweeping the delay over `[0, excursion]`
    pub fn lfo_params(&self) -> LfoParams {
        let excursion = self.excursion_ms();
        LfoParams {
            mode: self.waveform,
            frequency_hz: self.rate_bpm / 60.0,
            amplitude: 0.5 * excursion,
            offset: 0.5 * excursion,
            clip_high: excursion,
            clip_low: 0.0,
            ..Default::default()
        }
    }
}

// ============================================================================
// Vibrato
// ============================================================================

/// LFO-modulated delay line
#[derive(Debug, Clone)]
pub struct Vibrato {
    config: ProcessConfig,
    params: VibratoParams,
    delay: IntegerSampleDelayLine,
    lfo: LowFrequencyOscillator,
    /// Delay in ms applied to each sample of the last block
    delay_trace: Vec<f32>,
}

impl Vibrato {
    /// Create a vibrato with default parameters
    pub fn new(config: ProcessConfig) -> Result<Self> {
        Self::with_params(config, VibratoParams::default())
    }

    /// Create a vibrato with the given parameters
    pub fn with_params(config: ProcessConfig, params: VibratoParams) -> Result<Self> {
        let mut params = params;
        params.clamp();
        let delay = IntegerSampleDelayLine::with_params(
            config,
            DelayLineParams {
                delay_ms: params.delay_ms,
                max_delay_ms: params.max_delay_ms,
            },
        )?;
        Ok(Self {
            config,
            lfo: LowFrequencyOscillator::with_params(config, params.lfo_params())?,
            params,
            delay,
            delay_trace: vec![0.0; config.block_size],
        })
    }

    /// Current parameters
    pub fn params(&self) -> &VibratoParams {
        &self.params
    }

    /// Apply parameters; the capacity changes only if it differs
    pub fn set_params(&mut self, params: VibratoParams) {
        let mut params = params;
        params.clamp();
        if params.max_delay_ms != self.params.max_delay_ms {
            self.set_max_delay_ms(params.max_delay_ms);
        }
        self.params.rate_bpm = params.rate_bpm;
        self.params.depth_percent = params.depth_percent;
        self.params.waveform = params.waveform;
        self.update_lfo();
        self.set_delay_ms(params.delay_ms);
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
        if self.params.depth_percent == 0.0 {
            let delay_ms = self.params.delay_ms;
            self.delay.set_delay_ms(delay_ms);
        }
    }

    /// Select the modulator waveform
    pub fn set_waveform(&mut self, waveform: LfoMode) {
        self.params.waveform = waveform;
        self.update_lfo();
    }

    /// Set the fixed delay used at zero depth
    pub fn set_delay_ms(&mut self, ms: f32) {
        self.delay.set_delay_ms(ms);
        self.params.delay_ms = self.delay.delay_ms();
    }

    /// Resize the delay line; audio in flight is lost
    pub fn set_max_delay_ms(&mut self, ms: f32) {
        // The swept delay must not hold the capacity up
        let current = self.delay.delay_ms();
        self.delay.set_delay_ms(current.min(ms.max(0.0)));
        self.delay.set_max_delay_ms(ms);
        self.params.max_delay_ms = self.delay.max_delay_ms();
        self.params.delay_ms = self.params.delay_ms.min(self.params.max_delay_ms);
        self.update_lfo();
    }

    /// Current delay of the line in milliseconds
    pub fn delay_ms(&self) -> f32 {
        self.delay.delay_ms()
    }

    /// Delay in ms applied to each sample of the last processed block
    pub fn delay_trace(&self) -> &[f32] {
        &self.delay_trace
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

impl Effect for Vibrato {
    fn effect_type(&self) -> &'static str {
        "vibrato"
    }

    fn display_name(&self) -> &'static str {
        "Vibrato"
    }

    fn config(&self) -> ProcessConfig {
        self.config
    }

    fn process(&mut self, input: &[f32], output: &mut [f32]) {
        let n = block_frames(self.config.block_size, input, output);

        if self.params.depth_percent > 0.0 {
            self.lfo.generate_block(&mut self.delay_trace[..n]);
            for i in 0..n {
                self.delay.set_delay_ms(self.delay_trace[i]);
                output[i] = self.delay.process_sample(input[i]);
            }
        } else {
            self.delay_trace[..n].fill(self.delay.delay_ms());
            self.delay.process_block(&input[..n], &mut output[..n]);
        }
    }

    fn reset(&mut self) {
        self.delay.clear();
        self.lfo.reset_phase();
    }

    fn get_params(&self) -> Value {
        json!({
            "rate_bpm": self.params.rate_bpm,
            "depth": self.params.depth_percent,
            "waveform": self.params.waveform.to_str(),
            "delay_ms": self.params.delay_ms,
            "max_delay_ms": self.params.max_delay_ms,
        })
    }

    fn set_param(&mut self, name: &str, value: &Value) -> Result<()> {
        match name {
            "rate_bpm" => self.set_rate_bpm(param_f32(name, value)?),
            "depth" => self.set_depth(param_f32(name, value)?),
            "delay_ms" => self.set_delay_ms(param_f32(name, value)?),
            "max_delay_ms" => self.set_max_delay_ms(param_f32(name, value)?),
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
    use serde_json::json;

    const SAMPLE_RATE: f32 = 48000.0;
    const BLOCK: usize = 64;

    fn vibrato(depth: f32) -> Vibrato {
        let mut vibrato = Vibrato::new(ProcessConfig::new(SAMPLE_RATE, BLOCK).unwrap()).unwrap();
        vibrato.set_depth(depth);
        vibrato
    }

    /// Smallest and largest delay over one second of processing
    fn delay_range(vibrato: &mut Vibrato) -> (f32, f32) {
        let input = vec![0.0; BLOCK];
        let mut output = vec![0.0; BLOCK];
        let mut min = f32::MAX;
        let mut max = f32::MIN;
        for _ in 0..(SAMPLE_RATE as usize / BLOCK) {
            vibrato.process(&input, &mut output);
            for &d in vibrato.delay_trace() {
                min = min.min(d);
                max = max.max(d);
            }
        }
        (min, max)
    }

    #[test]
    fn test_depth_widens_excursion() {
        let (lo_min, lo_max) = delay_range(&mut vibrato(20.0));
        let (hi_min, hi_max) = delay_range(&mut vibrato(80.0));

        assert!(lo_min >= 0.0 && hi_min >= 0.0);
        assert!(lo_max <= 1.0 + 1e-6, "20% depth swings to {} ms", lo_max);
        assert!(hi_max <= 4.0 + 1e-6, "80% depth swings to {} ms", hi_max);
        assert!(hi_max - hi_min > 3.0 * (lo_max - lo_min));
    }

    #[test]
    fn test_output_follows_modulated_delay() {
        let mut vibrato = vibrato(100.0);
        let input: Vec<f32> = (0..4800).map(|n| n as f32).collect();
        let mut output = vec![0.0; input.len()];

        for (start, (inp, out)) in input
            .chunks(BLOCK)
            .zip(output.chunks_mut(BLOCK))
            .enumerate()
            .map(|(b, pair)| (b * BLOCK, pair))
        {
            vibrato.process(inp, out);
            for (i, &ms) in vibrato.delay_trace().iter().enumerate() {
                let n = start + i;
                let d = (ms as f64 * SAMPLE_RATE as f64 / 1000.0).floor() as usize;
                if n >= 480 {
                    assert_eq!(out[i], input[n - d], "Mismatch at sample {}", n);
                }
            }
        }
    }

    #[test]
    fn test_zero_depth_uses_fixed_delay() {
        let mut vibrato = vibrato(0.0);
        vibrato.set_delay_ms(1.0);

        let mut input = vec![0.0; BLOCK * 2];
        input[0] = 1.0;
        let mut output = vec![0.0; BLOCK * 2];
        for (inp, out) in input.chunks(BLOCK).zip(output.chunks_mut(BLOCK)) {
            vibrato.process(inp, out);
        }

        assert_eq!(output[48], 1.0);
        assert_eq!(output.iter().filter(|&&y| y != 0.0).count(), 1);
        assert!(vibrato.delay_trace().iter().all(|&d| d == 1.0));
    }

    #[test]
    fn test_capacity_limits_excursion() {
        let mut vibrato = vibrato(100.0);
        vibrato.set_max_delay_ms(2.0);
        assert_abs_diff_eq!(vibrato.params().excursion_ms(), 2.0);
        assert_abs_diff_eq!(vibrato.lfo().amplitude(), 1.0);

        vibrato.set_max_delay_ms(20.0);
        assert_abs_diff_eq!(vibrato.params().excursion_ms(), MAX_EXCURSION_MS);
    }

    #[test]
    fn test_params_by_name() {
        let mut vibrato = vibrato(50.0);
        vibrato.set_param("depth", &json!(-5)).unwrap();
        vibrato.set_param("delay_ms", &json!(3.0)).unwrap();
        vibrato.set_param("waveform", &json!("sawtooth")).unwrap();

        let params = vibrato.get_params();
        assert_eq!(params["depth"], json!(0.0));
        assert_eq!(params["delay_ms"], json!(3.0));
        assert_eq!(params["waveform"], json!("sawtooth"));
        assert!(vibrato.set_param("feedback", &json!(0.2)).is_err());
    }
}
