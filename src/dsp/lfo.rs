//! Low-frequency oscillator
//!
//! Two waveform generators share one set of amplitude, offset and clip
//! parameters:
//! - Sine: recursive two-pole resonator, no trigonometry per sample
//! - Sawtooth: linear ramp bouncing between `-amp` and `+amp`, with an
//!   adjustable rise/fall balance
//!
//! Both generators keep their derived constants current on every parameter
//! change, so switching waveform on the fly never needs a recalculation.

use crate::dsp::effect::ProcessConfig;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

// ============================================================================
// Constants
// ============================================================================

/// Default frequency in Hz
pub const DEFAULT_FREQUENCY_HZ: f32 = 5.0;

/// Lowest rise/fall balance
pub const MIN_BALANCE: f32 = 0.05;

/// Highest rise/fall balance
pub const MAX_BALANCE: f32 = 0.95;

/// Highest frequency as a fraction of the sample rate
const MAX_FREQUENCY_RATIO: f32 = 0.25;

/// Shortest sawtooth period in samples
const MIN_PERIOD_SAMPLES: f64 = 2.0;

// ============================================================================
// Waveform Selection
// ============================================================================

/// LFO waveform
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LfoMode {
    /// Two-pole resonator sine
    #[default]
    Sine,
    /// Rising/falling ramp
    Sawtooth,
}

impl LfoMode {
    /// Parse mode from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "sine" | "sin" => Some(LfoMode::Sine),
            "sawtooth" | "saw" => Some(LfoMode::Sawtooth),
            _ => None,
        }
    }

    /// Get string identifier
    pub fn to_str(&self) -> &'static str {
        match self {
            LfoMode::Sine => "sine",
            LfoMode::Sawtooth => "sawtooth",
        }
    }
}

/// Current segment of the sawtooth
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SawDirection {
    Rising,
    Falling,
}

/// Shape parameters shared by both generators
#[derive(Debug, Clone, Copy)]
pub struct WaveShape {
    pub frequency: f64,
    pub amplitude: f64,
    pub balance: f64,
    pub sample_rate: f64,
}

/// A periodic waveform producing one raw value (before offset and clipping)
/// per call
pub trait WaveformGenerator {
    /// Recompute derived constants without touching the phase
    fn update(&mut self, shape: &WaveShape);

    /// Advance one sample and return the raw value
    fn next_value(&mut self) -> f64;

    /// Return to the start of the cycle
    fn reset_phase(&mut self);
}

// ============================================================================
// Sine Resonator
// ============================================================================

/// Two-pole resonator: `v` traces the sine, `u` the cosine
#[derive(Debug, Clone)]
struct SineResonator {
    u: f64,
    v: f64,
    k1: f64,
    k2: f64,
    amplitude: f64,
}

impl SineResonator {
    fn new() -> Self {
        Self {
            u: 1.0,
            v: 0.0,
            k1: 0.0,
            k2: 0.0,
            amplitude: 0.0,
        }
    }
}

impl WaveformGenerator for SineResonator {
    fn update(&mut self, shape: &WaveShape) {
        self.k1 = (PI * shape.frequency / shape.sample_rate).tan();
        self.k2 = 2.0 * self.k1 / (1.0 + self.k1 * self.k1);
        self.amplitude = shape.amplitude;
    }

    #[inline]
    fn next_value(&mut self) -> f64 {
        let vv = self.u - self.k1 * self.v;
        self.v += self.k2 * vv;
        self.u = vv - self.k1 * self.v;
        self.amplitude * self.v
    }

    fn reset_phase(&mut self) {
        self.u = 1.0;
        self.v = 0.0;
    }
}

// ============================================================================
// Sawtooth Ramp
// ============================================================================

#[derive(Debug, Clone)]
struct SawtoothRamp {
    y: f64,
    d: f64,
    d_rise: f64,
    d_fall: f64,
    amplitude: f64,
    direction: SawDirection,
}

impl SawtoothRamp {
    fn new() -> Self {
        Self {
            y: 0.0,
            d: 0.0,
            d_rise: 0.0,
            d_fall: 0.0,
            amplitude: 0.0,
            direction: SawDirection::Rising,
        }
    }
}

impl WaveformGenerator for SawtoothRamp {
    fn update(&mut self, shape: &WaveShape) {
        self.amplitude = shape.amplitude;
        if shape.frequency > 0.0 {
            let period = (shape.sample_rate / shape.frequency)
                .round()
                .max(MIN_PERIOD_SAMPLES);
            let t1 = period * shape.balance;
            let t2 = period - t1;
            self.d_rise = 2.0 * shape.amplitude / t1;
            self.d_fall = -2.0 * shape.amplitude / t2;
        } else {
            // A zero frequency freezes the ramp
            self.d_rise = 0.0;
            self.d_fall = 0.0;
        }
        self.d = match self.direction {
            SawDirection::Rising => self.d_rise,
            SawDirection::Falling => self.d_fall,
        };
    }

    #[inline]
    fn next_value(&mut self) -> f64 {
        if self.y >= self.amplitude {
            self.d = self.d_fall;
            self.direction = SawDirection::Falling;
        } else if self.y <= -self.amplitude {
            self.d = self.d_rise;
            self.direction = SawDirection::Rising;
        }
        self.y += self.d;
        self.y
    }

    fn reset_phase(&mut self) {
        self.y = 0.0;
        self.d = self.d_rise;
        self.direction = SawDirection::Rising;
    }
}

// ============================================================================
// Parameters
// ============================================================================

/// LFO parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LfoParams {
    /// Waveform
    pub mode: LfoMode,
    /// Frequency in Hz (0 to fs/4)
    pub frequency_hz: f32,
    /// Peak amplitude (>= 0)
    pub amplitude: f32,
    /// Constant added after scaling
    pub offset: f32,
    /// Upper output bound
    pub clip_high: f32,
    /// Lower output bound
    pub clip_low: f32,
    /// Fraction of the sawtooth period spent rising (0.05 to 0.95)
    pub balance: f32,
}

impl Default for LfoParams {
    fn default() -> Self {
        Self {
            mode: LfoMode::Sine,
            frequency_hz: DEFAULT_FREQUENCY_HZ,
            amplitude: 1.0,
            offset: 0.0,
            clip_high: 1.0,
            clip_low: -1.0,
            balance: 0.5,
        }
    }
}

impl LfoParams {
    /// Clamp parameters to valid ranges for the given sample rate
    pub fn clamp(&mut self, sample_rate: f32) {
        self.frequency_hz = clamp_frequency(self.frequency_hz, sample_rate);
        self.amplitude = non_negative(self.amplitude);
        self.balance = clamp_balance(self.balance);
    }
}

fn clamp_frequency(hz: f32, sample_rate: f32) -> f32 {
    non_negative(hz).min(sample_rate * MAX_FREQUENCY_RATIO)
}

fn clamp_balance(balance: f32) -> f32 {
    if balance.is_nan() {
        return 0.5;
    }
    balance.clamp(MIN_BALANCE, MAX_BALANCE)
}

fn non_negative(x: f32) -> f32 {
    if x.is_nan() {
        0.0
    } else {
        x.max(0.0)
    }
}

// ============================================================================
// Oscillator
// ============================================================================

/// Low-frequency oscillator with switchable waveform
#[derive(Debug, Clone)]
pub struct LowFrequencyOscillator {
    sample_rate: f32,
    params: LfoParams,
    sine: SineResonator,
    sawtooth: SawtoothRamp,
}

impl LowFrequencyOscillator {
    /// Create an oscillator with default parameters (5 Hz sine, clip to [-1, 1])
    pub fn new(config: ProcessConfig) -> Result<Self> {
        Self::with_params(config, LfoParams::default())
    }

    /// Create an oscillator with the given parameters
    ///
    /// Only the sample rate of `config` is used; blocks of any length can be
    /// generated.
    pub fn with_params(config: ProcessConfig, params: LfoParams) -> Result<Self> {
        config.validate()?;
        let sample_rate = config.sample_rate;
        let mut lfo = Self {
            sample_rate,
            params,
            sine: SineResonator::new(),
            sawtooth: SawtoothRamp::new(),
        };
        lfo.params.clamp(sample_rate);
        lfo.recalculate();
        Ok(lfo)
    }

    /// Current parameters
    pub fn params(&self) -> &LfoParams {
        &self.params
    }

    /// Apply all parameters; the phase is kept
    pub fn set_params(&mut self, params: LfoParams) {
        self.params = params;
        self.params.clamp(self.sample_rate);
        self.recalculate();
    }

    /// Select the waveform; all other parameters are kept
    pub fn set_mode(&mut self, mode: LfoMode) {
        self.params.mode = mode;
    }

    /// Current waveform
    pub fn mode(&self) -> LfoMode {
        self.params.mode
    }

    /// Set the frequency in Hz (clamped to 0..=fs/4)
    pub fn set_frequency(&mut self, hz: f32) {
        self.params.frequency_hz = clamp_frequency(hz, self.sample_rate);
        self.recalculate();
    }

    /// Set the frequency in beats per minute
    pub fn set_rate_bpm(&mut self, bpm: f32) {
        self.set_frequency(non_negative(bpm) / 60.0);
    }

    /// Current frequency in Hz
    pub fn frequency(&self) -> f32 {
        self.params.frequency_hz
    }

    /// Set the peak amplitude (clamped to >= 0)
    pub fn set_amplitude(&mut self, amplitude: f32) {
        self.params.amplitude = non_negative(amplitude);
        self.recalculate();
    }

    /// Current amplitude
    pub fn amplitude(&self) -> f32 {
        self.params.amplitude
    }

    /// Set the sawtooth rise/fall balance (clamped to 0.05..=0.95)
    pub fn set_balance(&mut self, balance: f32) {
        self.params.balance = clamp_balance(balance);
        self.recalculate();
    }

    /// Current balance
    pub fn balance(&self) -> f32 {
        self.params.balance
    }

    /// Set the output offset
    pub fn set_offset(&mut self, offset: f32) {
        self.params.offset = offset;
    }

    /// Set the upper clip bound
    pub fn set_clip_high(&mut self, clip_high: f32) {
        self.params.clip_high = clip_high;
    }

    /// Set the lower clip bound
    pub fn set_clip_low(&mut self, clip_low: f32) {
        self.params.clip_low = clip_low;
    }

    /// Current sawtooth segment
    pub fn saw_direction(&self) -> SawDirection {
        self.sawtooth.direction
    }

    /// Restart the active waveform from the beginning of its cycle
    ///
    /// Sine restarts at `(u, v) = (1, 0)`, sawtooth at `y = 0` rising.
    pub fn reset_phase(&mut self) {
        match self.params.mode {
            LfoMode::Sine => self.sine.reset_phase(),
            LfoMode::Sawtooth => self.sawtooth.reset_phase(),
        }
    }

    /// Generate one output sample
    #[inline]
    pub fn next_sample(&mut self) -> f32 {
        let raw = match self.params.mode {
            LfoMode::Sine => self.sine.next_value(),
            LfoMode::Sawtooth => self.sawtooth.next_value(),
        };
        self.shape_output(raw)
    }

    /// Fill `output` with consecutive samples of the active waveform
    pub fn generate_block(&mut self, output: &mut [f32]) {
        let offset = self.params.offset as f64;
        let clip_high = self.params.clip_high as f64;
        let clip_low = self.params.clip_low as f64;
        match self.params.mode {
            LfoMode::Sine => fill(&mut self.sine, output, offset, clip_low, clip_high),
            LfoMode::Sawtooth => fill(&mut self.sawtooth, output, offset, clip_low, clip_high),
        }
    }

    /// Bypassed oscillator output: silence
    pub fn bypass(&self, output: &mut [f32]) {
        output.fill(0.0);
    }

    #[inline]
    fn shape_output(&self, raw: f64) -> f32 {
        clip(
            raw + self.params.offset as f64,
            self.params.clip_low as f64,
            self.params.clip_high as f64,
        ) as f32
    }

    fn recalculate(&mut self) {
        let shape = WaveShape {
            frequency: self.params.frequency_hz as f64,
            amplitude: self.params.amplitude as f64,
            balance: self.params.balance as f64,
            sample_rate: self.sample_rate as f64,
        };
        self.sine.update(&shape);
        self.sawtooth.update(&shape);
    }
}

/// Upper bound first, then lower, so an inverted range resolves to `low`
#[inline]
fn clip(x: f64, low: f64, high: f64) -> f64 {
    x.min(high).max(low)
}

fn fill<G: WaveformGenerator>(
    generator: &mut G,
    output: &mut [f32],
    offset: f64,
    clip_low: f64,
    clip_high: f64,
) {
    for sample in output.iter_mut() {
        *sample = clip(generator.next_value() + offset, clip_low, clip_high) as f32;
    }
}
