//! Integer-sample delay line
//!
//! Circular buffer with a write pointer and a read pointer trailing it by a whole
//! number of samples. Each sample is written at `wp`, then read at `rp`, then both
//! pointers advance, so the output at step `n` is the input of step `n - delay` and
//! a zero delay is transparent.

use crate::dsp::effect::{block_frames, param_f32, unknown_param, Effect, ProcessConfig};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

// ============================================================================
// Constants
// ============================================================================

/// Smallest capacity the line can be resized to, in milliseconds
pub const MIN_MAX_DELAY_MS: f32 = 1.0;

/// Default capacity in milliseconds
pub const DEFAULT_MAX_DELAY_MS: f32 = 10.0;

/// Default delay in milliseconds
pub const DEFAULT_DELAY_MS: f32 = 5.0;

// ============================================================================
// Parameters
// ============================================================================

/// Delay line parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelayLineParams {
    /// Delay in milliseconds (0 to max_delay_ms)
    pub delay_ms: f32,
    /// Capacity in milliseconds (at least 1 ms)
    pub max_delay_ms: f32,
}

impl Default for DelayLineParams {
    fn default() -> Self {
        Self {
            delay_ms: DEFAULT_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
        }
    }
}

impl DelayLineParams {
    /// Clamp parameters to valid ranges
    pub fn clamp(&mut self) {
        self.max_delay_ms = self.max_delay_ms.max(MIN_MAX_DELAY_MS);
        self.delay_ms = self.delay_ms.clamp(0.0, self.max_delay_ms);
    }
}

// ============================================================================
// Delay Line
// ============================================================================

/// Circular buffer delay with runtime-resizable capacity
#[derive(Debug, Clone)]
pub struct IntegerSampleDelayLine {
    config: ProcessConfig,
    buffer: Vec<f32>,
    write_pos: usize,
    read_pos: usize,
    delay_samples: usize,
    delay_ms: f32,
    max_delay_ms: f32,
}

impl IntegerSampleDelayLine {
    /// Create a delay line with default capacity (10 ms) and delay (5 ms)
    pub fn new(config: ProcessConfig) -> Result<Self> {
        Self::with_params(config, DelayLineParams::default())
    }

    /// Create a delay line with the given parameters
    pub fn with_params(config: ProcessConfig, params: DelayLineParams) -> Result<Self> {
        config.validate()?;
        let mut params = params;
        params.clamp();

        let mut line = Self {
            config,
            buffer: Vec::new(),
            write_pos: 0,
            read_pos: 0,
            delay_samples: 0,
            delay_ms: 0.0,
            max_delay_ms: params.max_delay_ms,
        };
        line.allocate(params.max_delay_ms);
        line.set_delay_ms(params.delay_ms);

        log::debug!(
            "delay line: {} samples capacity, {} samples delay",
            line.buffer.len(),
            line.delay_samples
        );
        Ok(line)
    }

    /// Current parameters
    pub fn params(&self) -> DelayLineParams {
        DelayLineParams {
            delay_ms: self.delay_ms,
            max_delay_ms: self.max_delay_ms,
        }
    }

    /// Apply parameters; resizes only when the capacity changes
    pub fn set_params(&mut self, params: DelayLineParams) {
        if params.max_delay_ms != self.max_delay_ms {
            // Shrink the delay first so the capacity can shrink with it
            self.set_delay_ms(params.delay_ms.min(params.max_delay_ms));
            self.set_max_delay_ms(params.max_delay_ms.max(params.delay_ms));
        }
        self.set_delay_ms(params.delay_ms);
    }

    /// Set the delay in milliseconds
    ///
    /// Clamped to `0..=max_delay_ms`, converted with `floor(ms * fs / 1000)` and
    /// kept below the capacity. The read pointer jumps immediately.
    pub fn set_delay_ms(&mut self, ms: f32) {
        let ms = if ms.is_nan() { 0.0 } else { ms };
        self.delay_ms = ms.clamp(0.0, self.max_delay_ms);
        let samples = (self.delay_ms as f64 * self.config.sample_rate as f64 / 1000.0).floor();
        self.set_delay_samples(samples as usize);
    }

    /// Set the delay in whole samples (clamped below capacity)
    pub fn set_delay_samples(&mut self, samples: usize) {
        let size = self.buffer.len();
        self.delay_samples = samples.min(size - 1);
        self.read_pos = (self.write_pos as isize - self.delay_samples as isize)
            .rem_euclid(size as isize) as usize;
    }

    /// Resize the buffer to hold `ms` milliseconds
    ///
    /// Clamped to at least 1 ms and at least the current delay. The buffer is
    /// reallocated and zeroed, so audio in flight is lost. Control rate only.
    pub fn set_max_delay_ms(&mut self, ms: f32) {
        let ms = if ms.is_nan() { MIN_MAX_DELAY_MS } else { ms };
        let ms = ms.max(MIN_MAX_DELAY_MS).max(self.delay_ms);
        self.max_delay_ms = ms;
        self.allocate(ms);
        let delay_ms = self.delay_ms;
        self.set_delay_ms(delay_ms);
        log::debug!(
            "delay line resized to {:.2} ms ({} samples)",
            ms,
            self.buffer.len()
        );
    }

    /// Delay in milliseconds as requested (after clamping)
    pub fn delay_ms(&self) -> f32 {
        self.delay_ms
    }

    /// Effective delay in samples
    pub fn delay_samples(&self) -> usize {
        self.delay_samples
    }

    /// Capacity in milliseconds
    pub fn max_delay_ms(&self) -> f32 {
        self.max_delay_ms
    }

    /// Capacity in samples
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Write one sample, read the delayed one, advance
    #[inline]
    pub fn process_sample(&mut self, x: f32) -> f32 {
        let size = self.buffer.len();
        self.buffer[self.write_pos] = x;
        let y = self.buffer[self.read_pos];
        self.write_pos = (self.write_pos + 1) % size;
        self.read_pos = (self.read_pos + 1) % size;
        y
    }

    /// Delay a block of samples
    pub fn process_block(&mut self, input: &[f32], output: &mut [f32]) {
        for (out, &x) in output.iter_mut().zip(input.iter()) {
            *out = self.process_sample(x);
        }
    }

    /// Zero the buffer and restart the pointers, keeping the delay
    pub fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
        let delay = self.delay_samples;
        self.set_delay_samples(delay);
    }

    fn allocate(&mut self, max_delay_ms: f32) {
        let span = (max_delay_ms as f64 * self.config.sample_rate as f64 / 1000.0).floor();
        let size = span as usize + 1;
        self.buffer = vec![0.0; size.max(2)];
        self.write_pos = 0;
        self.read_pos = 0;
    }
}

impl Effect for IntegerSampleDelayLine {
    fn effect_type(&self) -> &'static str {
        "delay"
    }

    fn display_name(&self) -> &'static str {
        "Delay Line"
    }

    fn config(&self) -> ProcessConfig {
        self.config
    }

    fn process(&mut self, input: &[f32], output: &mut [f32]) {
        let n = block_frames(self.config.block_size, input, output);
        self.process_block(&input[..n], &mut output[..n]);
    }

    fn reset(&mut self) {
        self.clear();
    }

    fn get_params(&self) -> Value {
        json!({
            "delay_ms": self.delay_ms,
            "max_delay_ms": self.max_delay_ms,
            "delay_samples": self.delay_samples,
        })
    }

    fn set_param(&mut self, name: &str, value: &Value) -> Result<()> {
        match name {
            "delay_ms" => self.set_delay_ms(param_f32(name, value)?),
            "max_delay_ms" => self.set_max_delay_ms(param_f32(name, value)?),
            _ => return Err(unknown_param(self.effect_type(), name)),
        }
        Ok(())
    }
}
