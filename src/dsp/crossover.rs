//! Two-band crossover
//!
//! Splits one signal into a low band and a high band using cascaded second-order
//! Butterworth sections. Every stage of a branch shares one coefficient set, so
//! more stages mean a steeper slope rather than a different shape. The high band
//! is polarity-inverted: a single stage then sums back without a notch at the
//! cutoff, and two stages per branch sum to an allpass (Linkwitz-Riley).

use crate::dsp::biquad::{BiquadFilter, CoefficientSet};
use crate::dsp::effect::{block_frames, param_f32, unknown_param, ProcessConfig};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

// ============================================================================
// Constants
// ============================================================================

/// Default cutoff frequency in Hz
pub const DEFAULT_CUTOFF_HZ: f32 = 2000.0;

/// Default number of stages per branch
pub const DEFAULT_CASCADE_ORDER: usize = 2;

/// Maximum number of stages per branch
pub const MAX_CASCADE_ORDER: usize = 8;

/// Lowest cutoff frequency in Hz
const MIN_CUTOFF_HZ: f32 = 10.0;

/// Highest cutoff as a fraction of the sample rate
const MAX_CUTOFF_RATIO: f32 = 0.49;

// ============================================================================
// Parameters
// ============================================================================

/// Crossover parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossoverParams {
    /// Split frequency in Hz (10 Hz to 0.49 * fs)
    pub cutoff_hz: f32,
    /// Biquad stages per branch (1 to 8)
    pub cascade_order: usize,
}

impl Default for CrossoverParams {
    fn default() -> Self {
        Self {
            cutoff_hz: DEFAULT_CUTOFF_HZ,
            cascade_order: DEFAULT_CASCADE_ORDER,
        }
    }
}

impl CrossoverParams {
    /// Clamp parameters to valid ranges for the given sample rate
    pub fn clamp(&mut self, sample_rate: f32) {
        self.cutoff_hz = clamp_cutoff(self.cutoff_hz, sample_rate);
        self.cascade_order = self.cascade_order.clamp(1, MAX_CASCADE_ORDER);
    }
}

fn clamp_cutoff(hz: f32, sample_rate: f32) -> f32 {
    if hz.is_nan() {
        return DEFAULT_CUTOFF_HZ.min(sample_rate * MAX_CUTOFF_RATIO);
    }
    hz.clamp(MIN_CUTOFF_HZ, sample_rate * MAX_CUTOFF_RATIO)
}

// ============================================================================
// Crossover
// ============================================================================

/// Low/high band splitter built from cascaded biquads
#[derive(Debug, Clone)]
pub struct Crossover {
    config: ProcessConfig,
    params: CrossoverParams,
    lowpass: CoefficientSet,
    highpass: CoefficientSet,
    low_stages: Vec<BiquadFilter>,
    high_stages: Vec<BiquadFilter>,
}

impl Crossover {
    /// Create a crossover at 2 kHz with two stages per branch
    pub fn new(config: ProcessConfig) -> Result<Self> {
        Self::with_params(config, CrossoverParams::default())
    }

    /// Create a crossover with the given parameters
    pub fn with_params(config: ProcessConfig, params: CrossoverParams) -> Result<Self> {
        config.validate()?;
        let mut params = params;
        params.clamp(config.sample_rate);

        let mut crossover = Self {
            config,
            params: params.clone(),
            lowpass: CoefficientSet::identity(),
            highpass: CoefficientSet::identity(),
            low_stages: Vec::with_capacity(MAX_CASCADE_ORDER),
            high_stages: Vec::with_capacity(MAX_CASCADE_ORDER),
        };
        crossover.set_cascade_order(params.cascade_order);
        crossover.set_cutoff_frequency(params.cutoff_hz);

        log::debug!(
            "crossover: {:.1} Hz, {} stages per branch",
            crossover.params.cutoff_hz,
            crossover.params.cascade_order
        );
        Ok(crossover)
    }

    /// Current parameters
    pub fn params(&self) -> &CrossoverParams {
        &self.params
    }

    /// Apply parameters
    pub fn set_params(&mut self, params: CrossoverParams) {
        self.set_cascade_order(params.cascade_order);
        self.set_cutoff_frequency(params.cutoff_hz);
    }

    /// Recompute the Butterworth pair and load it into every stage
    pub fn set_cutoff_frequency(&mut self, cutoff_hz: f32) {
        let fc = clamp_cutoff(cutoff_hz, self.config.sample_rate);
        self.params.cutoff_hz = fc;
        self.lowpass = CoefficientSet::butterworth_lowpass(fc, self.config.sample_rate);
        self.highpass =
            CoefficientSet::butterworth_highpass(fc, self.config.sample_rate).inverted();

        for stage in &mut self.low_stages {
            stage.set_coefficients(self.lowpass);
        }
        for stage in &mut self.high_stages {
            stage.set_coefficients(self.highpass);
        }
    }

    /// Current cutoff frequency in Hz
    pub fn cutoff_frequency(&self) -> f32 {
        self.params.cutoff_hz
    }

    /// Set the number of stages per branch (1 to 8)
    ///
    /// Added stages start with cleared state. Control rate only.
    pub fn set_cascade_order(&mut self, order: usize) {
        let order = order.clamp(1, MAX_CASCADE_ORDER);
        self.params.cascade_order = order;
        self.low_stages.resize_with(order, BiquadFilter::new);
        self.high_stages.resize_with(order, BiquadFilter::new);
        for stage in &mut self.low_stages {
            stage.set_coefficients(self.lowpass);
        }
        for stage in &mut self.high_stages {
            stage.set_coefficients(self.highpass);
        }
        log::debug!("crossover cascade order set to {}", order);
    }

    /// Stages per branch
    pub fn cascade_order(&self) -> usize {
        self.params.cascade_order
    }

    /// Low-pass coefficients shared by every low-band stage
    pub fn lowpass_coefficients(&self) -> CoefficientSet {
        self.lowpass
    }

    /// High-pass coefficients shared by every high-band stage
    pub fn highpass_coefficients(&self) -> CoefficientSet {
        self.highpass
    }

    /// Split `input` into `low_out` and `high_out`
    ///
    /// Each branch starts from a copy of the input and runs it through its
    /// stages in order; every stage hands its output to the next.
    pub fn process_block(&mut self, input: &[f32], low_out: &mut [f32], high_out: &mut [f32]) {
        let n = block_frames(self.config.block_size, input, low_out).min(high_out.len());
        let input = &input[..n];

        let low = &mut low_out[..n];
        low.copy_from_slice(input);
        for stage in &mut self.low_stages {
            stage.process_block_in_place(low);
        }

        let high = &mut high_out[..n];
        high.copy_from_slice(input);
        for stage in &mut self.high_stages {
            stage.process_block_in_place(high);
        }
    }

    /// Copy the unmodified input to both outputs
    pub fn bypass(&self, input: &[f32], low_out: &mut [f32], high_out: &mut [f32]) {
        let n = block_frames(self.config.block_size, input, low_out).min(high_out.len());
        low_out[..n].copy_from_slice(&input[..n]);
        high_out[..n].copy_from_slice(&input[..n]);
    }

    /// Clear the state of every stage
    pub fn reset(&mut self) {
        for stage in self.low_stages.iter_mut().chain(self.high_stages.iter_mut()) {
            stage.reset();
        }
    }

    /// Get all parameters as JSON
    pub fn get_params(&self) -> Value {
        json!({
            "cutoff_hz": self.params.cutoff_hz,
            "cascade_order": self.params.cascade_order,
        })
    }

    /// Set a single parameter by name
    pub fn set_param(&mut self, name: &str, value: &Value) -> Result<()> {
        match name {
            "cutoff_hz" => self.set_cutoff_frequency(param_f32(name, value)?),
            "cascade_order" => {
                let order = param_f32(name, value)?.max(1.0).round() as usize;
                self.set_cascade_order(order);
            }
            _ => return Err(unknown_param("crossover", name)),
        }
        Ok(())
    }

    /// Configuration the crossover was built with
    pub fn config(&self) -> ProcessConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use serde_json::json;

    const SAMPLE_RATE: f32 = 48000.0;
    const BLOCK: usize = 64;

    fn create_sine(frequency: f32, num_samples: usize) -> Vec<f32> {
        (0..num_samples)
            .map(|i| (2.0 * std::f32::consts::PI * frequency * i as f32 / SAMPLE_RATE).sin())
            .collect()
    }

    fn calculate_rms(samples: &[f32]) -> f32 {
        let sum_sq: f32 = samples.iter().map(|s| s * s).sum();
        (sum_sq / samples.len() as f32).sqrt()
    }

    /// Run `input` through the crossover block by block, returning (low, high)
    fn split(crossover: &mut Crossover, input: &[f32]) -> (Vec<f32>, Vec<f32>) {
        let mut low = vec![0.0; input.len()];
        let mut high = vec![0.0; input.len()];
        for ((inp, lo), hi) in input
            .chunks(BLOCK)
            .zip(low.chunks_mut(BLOCK))
            .zip(high.chunks_mut(BLOCK))
        {
            crossover.process_block(inp, lo, hi);
        }
        (low, high)
    }

    fn crossover_with_order(order: usize) -> Crossover {
        Crossover::with_params(
            ProcessConfig::new(SAMPLE_RATE, BLOCK).unwrap(),
            CrossoverParams {
                cutoff_hz: 2000.0,
                cascade_order: order,
            },
        )
        .unwrap()
    }

    #[test]
    fn test_bypass_copies_input_to_both_outputs() {
        let crossover = crossover_with_order(2);
        let input = create_sine(440.0, BLOCK);
        let mut low = vec![0.0; BLOCK];
        let mut high = vec![0.0; BLOCK];
        crossover.bypass(&input, &mut low, &mut high);
        assert_eq!(low, input);
        assert_eq!(high, input);
    }

    #[test]
    fn test_bands_separate() {
        let mut crossover = crossover_with_order(2);

        let (low, high) = split(&mut crossover, &create_sine(200.0, 9600));
        assert!(calculate_rms(&low[4800..]) > 0.68);
        assert!(calculate_rms(&high[4800..]) < 0.01);

        crossover.reset();
        let (low, high) = split(&mut crossover, &create_sine(12000.0, 9600));
        assert!(calculate_rms(&low[4800..]) < 0.01);
        assert!(calculate_rms(&high[4800..]) > 0.68);
    }

    #[test]
    fn test_single_stage_sum_is_approximately_complementary() {
        let mut crossover = crossover_with_order(1);
        for &freq in &[250.0, 16000.0] {
            crossover.reset();
            let input = create_sine(freq, 9600);
            let (low, high) = split(&mut crossover, &input);
            let sum: Vec<f32> = low.iter().zip(&high).map(|(l, h)| l + h).collect();

            let ratio = calculate_rms(&sum[4800..]) / calculate_rms(&input[4800..]);
            assert!(
                (ratio - 1.0).abs() < 0.05,
                "Expected summed level ~1.0 at {} Hz, got {}",
                freq,
                ratio
            );
        }

        // Both bands are -3 dB and in phase at the cutoff, so the sum peaks at +3 dB
        crossover.reset();
        let input = create_sine(2000.0, 9600);
        let (low, high) = split(&mut crossover, &input);
        let sum: Vec<f32> = low.iter().zip(&high).map(|(l, h)| l + h).collect();
        let ratio = calculate_rms(&sum[4800..]) / calculate_rms(&input[4800..]);
        assert_abs_diff_eq!(ratio, std::f32::consts::SQRT_2, epsilon = 0.02);
    }

    #[test]
    fn test_two_stage_sum_is_allpass() {
        let mut crossover = crossover_with_order(2);
        for &freq in &[500.0, 2000.0, 6000.0] {
            crossover.reset();
            let input = create_sine(freq, 9600);
            let (low, high) = split(&mut crossover, &input);
            let sum: Vec<f32> = low.iter().zip(&high).map(|(l, h)| l + h).collect();

            let ratio = calculate_rms(&sum[4800..]) / calculate_rms(&input[4800..]);
            assert_abs_diff_eq!(ratio, 1.0, epsilon = 0.01);
        }
    }

    #[test]
    fn test_all_stages_share_coefficients() {
        let mut crossover = crossover_with_order(3);
        crossover.set_cutoff_frequency(1000.0);
        for stage in &crossover.low_stages {
            assert_eq!(stage.coefficients(), crossover.lowpass_coefficients());
        }
        for stage in &crossover.high_stages {
            assert_eq!(stage.coefficients(), crossover.highpass_coefficients());
        }
        assert_eq!(crossover.lowpass_coefficients().a0, 1.0);
    }

    #[test]
    fn test_cascade_order_changes_stage_count() {
        let mut crossover = crossover_with_order(2);
        crossover.set_cascade_order(4);
        assert_eq!(crossover.low_stages.len(), 4);
        assert_eq!(crossover.high_stages.len(), 4);
        assert_eq!(
            crossover.low_stages[3].coefficients(),
            crossover.lowpass_coefficients()
        );

        crossover.set_cascade_order(0);
        assert_eq!(crossover.cascade_order(), 1);
        crossover.set_cascade_order(100);
        assert_eq!(crossover.cascade_order(), MAX_CASCADE_ORDER);
    }

    #[test]
    fn test_cutoff_clamped() {
        let mut crossover = crossover_with_order(2);
        crossover.set_cutoff_frequency(1.0);
        assert_eq!(crossover.cutoff_frequency(), 10.0);
        crossover.set_cutoff_frequency(30000.0);
        assert_eq!(crossover.cutoff_frequency(), 23520.0);
    }

    #[test]
    fn test_params_by_name() {
        let mut crossover = crossover_with_order(2);
        crossover.set_param("cutoff_hz", &json!(800.0)).unwrap();
        crossover.set_param("cascade_order", &json!(3)).unwrap();
        assert_eq!(crossover.get_params(), json!({"cutoff_hz": 800.0, "cascade_order": 3}));
        assert!(crossover.set_param("slope", &json!(24)).is_err());
    }
}
