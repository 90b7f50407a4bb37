//! Overdrive dynamics processor
//!
//! Feed-forward compressor/expander driven by a power envelope follower.
//!
//! The static curve is a soft-knee piecewise function in dB: expansion below the
//! expansion threshold, unity between the thresholds, compression above the
//! compression threshold. The gain can be computed from the closed-form curve or
//! from a 256-point lookup table rebuilt whenever the curve changes.
//!
//! Curve setters never let full-scale input come out louder than it went in. A
//! voice-activity label can suppress the expander so quiet speech is not chopped.

use crate::dsp::effect::{
    block_frames, param_f32, param_str, unknown_param, Effect, ProcessConfig,
};
use crate::dsp::first_order::FirstOrderIir;
use crate::error::{DafxError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

// ============================================================================
// Constants
// ============================================================================

/// Number of points in the gain lookup table
pub const LUT_SIZE: usize = 256;

/// Iteration cap for the full-scale boost correction
pub const MAX_CORRECTION_STEPS: usize = 64;

/// Level reported for silence, in dB
const FLOOR_DB: f32 = -120.0;

/// Table range extends this far below the expansion knee, in dB
const LUT_HEADROOM_DB: f32 = 24.0;

/// The upper half of the table spans at least this many dB
const LUT_MIN_UPPER_SPAN_DB: f32 = 6.0;

const MIN_COMP_THRESHOLD_DB: f32 = -60.0;
const MAX_COMP_THRESHOLD_DB: f32 = 0.0;
const MIN_EXP_THRESHOLD_DB: f32 = -90.0;
const MIN_COMP_RATIO: f32 = 1.0;
const MAX_COMP_RATIO: f32 = 20.0;
const MIN_EXP_RATIO: f32 = 1.0;
const MAX_EXP_RATIO: f32 = 10.0;
const MAX_KNEE_DB: f32 = 24.0;
const MAX_MAKEUP_DB: f32 = 24.0;
const MIN_MAKEUP_DB: f32 = -24.0;
const MIN_TIME_MS: f32 = 0.1;
const MAX_TIME_MS: f32 = 5000.0;

// Correction step sizes
const RATIO_STEP: f32 = 0.5;
const THRESHOLD_STEP_DB: f32 = 1.0;
const MAKEUP_STEP_DB: f32 = 1.0;

/// Scales attack lambdas so the power envelope meets the amplitude time constant
const ATTACK_CORRECTION: f64 = 0.721_529_479_273_716; // ln(1 / 0.19) / 2.3

/// Scales release lambdas for the same reason
const RELEASE_CORRECTION: f64 = 2.0;

// ============================================================================
// Level Conversion
// ============================================================================

/// Convert linear amplitude to dB (silence maps to -120 dB)
fn amplitude_to_db(amplitude: f32) -> f32 {
    let amplitude = amplitude.abs();
    if amplitude > 1e-6 {
        20.0 * amplitude.log10()
    } else {
        FLOOR_DB
    }
}

/// Convert dB to linear amplitude
fn db_to_linear(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

/// One-pole coefficient for a power envelope with time constant `time_ms`
fn envelope_lambda(time_ms: f32, sample_rate: f32, correction: f64) -> f32 {
    if time_ms <= 0.0 {
        return 1.0;
    }
    let tau = time_ms as f64 * 0.001;
    let lambda = (1.0 - (-2.3 / (sample_rate as f64 * tau)).exp()) * correction;
    lambda.min(1.0) as f32
}

// ============================================================================
// Gain Computation
// ============================================================================

/// Maps an input amplitude to a linear gain
pub trait GainComputer {
    fn gain(&self, amplitude: f32) -> f32;
}

/// Selects how the processor computes its gain
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum GainFunction {
    /// Evaluate the closed-form curve every sample
    #[default]
    Formula,
    /// Interpolate the precomputed table
    LookupTable,
}

impl GainFunction {
    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "formula" => Some(GainFunction::Formula),
            "lookup_table" | "lut" | "table" => Some(GainFunction::LookupTable),
            _ => None,
        }
    }

    /// Get string identifier
    pub fn to_str(&self) -> &'static str {
        match self {
            GainFunction::Formula => "formula",
            GainFunction::LookupTable => "lookup_table",
        }
    }
}

/// Static compressor/expander curve
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GainCurve {
    /// Compression threshold in dB (-60 to 0)
    pub comp_threshold_db: f32,
    /// Compression ratio (1 to 20)
    pub comp_ratio: f32,
    /// Expansion threshold in dB (-90 to the compression threshold)
    pub exp_threshold_db: f32,
    /// Expansion ratio (1 to 10)
    pub exp_ratio: f32,
    /// Knee width in dB, shared by both thresholds (0 = hard knee)
    pub knee_db: f32,
    /// Makeup gain in dB (-24 to 24)
    pub makeup_db: f32,
}

impl Default for GainCurve {
    fn default() -> Self {
        Self {
            comp_threshold_db: -20.0,
            comp_ratio: 4.0,
            exp_threshold_db: -60.0,
            exp_ratio: 2.0,
            knee_db: 6.0,
            makeup_db: 0.0,
        }
    }
}

impl GainCurve {
    /// Clamp to valid ranges
    pub fn clamp(&mut self) {
        self.comp_threshold_db = clamp_or(
            self.comp_threshold_db,
            MIN_COMP_THRESHOLD_DB,
            MAX_COMP_THRESHOLD_DB,
        );
        self.exp_threshold_db = clamp_or(
            self.exp_threshold_db,
            MIN_EXP_THRESHOLD_DB,
            self.comp_threshold_db,
        );
        self.comp_ratio = clamp_or(self.comp_ratio, MIN_COMP_RATIO, MAX_COMP_RATIO);
        self.exp_ratio = clamp_or(self.exp_ratio, MIN_EXP_RATIO, MAX_EXP_RATIO);
        self.knee_db = clamp_or(self.knee_db, 0.0, MAX_KNEE_DB);
        self.makeup_db = clamp_or(self.makeup_db, MIN_MAKEUP_DB, MAX_MAKEUP_DB);
    }

    /// Output level in dB for input level `x` in dB, before makeup
    pub fn output_level_db(&self, x: f32) -> f32 {
        let w = self.knee_db;
        let half = 0.5 * w;
        let tc = self.comp_threshold_db;
        let te = self.exp_threshold_db;

        if x >= tc + half {
            return tc + (x - tc) / self.comp_ratio;
        }
        if w > 0.0 && x > tc - half {
            let d = x - tc + half;
            return x + (1.0 / self.comp_ratio - 1.0) * d * d / (2.0 * w);
        }
        if x <= te - half {
            return te + (x - te) * self.exp_ratio;
        }
        if w > 0.0 && x < te + half {
            let d = x - te - half;
            return x + (1.0 - self.exp_ratio) * d * d / (2.0 * w);
        }
        x
    }

    /// Gain in dB for input level `x` in dB, makeup included
    pub fn gain_db(&self, x: f32) -> f32 {
        (self.output_level_db(x) - x) + self.makeup_db
    }
}

impl GainComputer for GainCurve {
    fn gain(&self, amplitude: f32) -> f32 {
        db_to_linear(self.gain_db(amplitude_to_db(amplitude)))
    }
}

fn clamp_or(value: f32, min: f32, max: f32) -> f32 {
    if value.is_nan() {
        return min;
    }
    value.min(max).max(min)
}

/// Non-uniform gain table: input amplitude, output gain and segment slope
///
/// Points are evenly spaced in dB. Half of them run from below the expansion
/// knee up to the midpoint of the thresholds, the other half from there to full
/// scale. Outside the table the end values hold.
#[derive(Debug, Clone)]
pub struct GainLookupTable {
    input: Vec<f32>,
    output: Vec<f32>,
    slope: Vec<f32>,
}

impl GainLookupTable {
    /// Build a table for `curve`
    pub fn new(curve: &GainCurve) -> Self {
        let mut table = Self {
            input: vec![0.0; LUT_SIZE],
            output: vec![0.0; LUT_SIZE],
            slope: vec![0.0; LUT_SIZE],
        };
        table.rebuild(curve);
        table
    }

    /// Recompute every point in place
    pub fn rebuild(&mut self, curve: &GainCurve) {
        let half = LUT_SIZE / 2;
        let low_db =
            (curve.exp_threshold_db - 0.5 * curve.knee_db - LUT_HEADROOM_DB).max(FLOOR_DB);
        let split_db = (0.5 * (curve.exp_threshold_db + curve.comp_threshold_db))
            .min(-LUT_MIN_UPPER_SPAN_DB)
            .max(low_db);

        for i in 0..half {
            let db = low_db + (split_db - low_db) * i as f32 / half as f32;
            self.input[i] = db_to_linear(db);
        }
        let upper = LUT_SIZE - half;
        for i in 0..upper {
            let db = split_db + (0.0 - split_db) * i as f32 / (upper - 1) as f32;
            self.input[half + i] = db_to_linear(db);
        }
        self.input[LUT_SIZE - 1] = 1.0;

        for (out, &x) in self.output.iter_mut().zip(self.input.iter()) {
            *out = curve.gain(x);
        }
        for i in 0..LUT_SIZE - 1 {
            let dx = self.input[i + 1] - self.input[i];
            self.slope[i] = if dx > 0.0 {
                (self.output[i + 1] - self.output[i]) / dx
            } else {
                0.0
            };
        }
        self.slope[LUT_SIZE - 1] = 0.0;
    }

    /// Table inputs (linear amplitude, ascending)
    pub fn inputs(&self) -> &[f32] {
        &self.input
    }

    /// Table gains
    pub fn outputs(&self) -> &[f32] {
        &self.output
    }
}

impl GainComputer for GainLookupTable {
    #[inline]
    fn gain(&self, amplitude: f32) -> f32 {
        let a = amplitude.abs();
        let last = self.input.len() - 1;
        if !(a > self.input[0]) {
            return self.output[0];
        }
        if a >= self.input[last] {
            return self.output[last];
        }
        let mut i = 0;
        while i < last && self.input[i + 1] <= a {
            i += 1;
        }
        self.output[i] + self.slope[i] * (a - self.input[i])
    }
}

// ============================================================================
// Voice Activity
// ============================================================================

/// Which side of the threshold indicates speech
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum VadPolarity {
    /// Lower measure means speech is more likely
    #[default]
    Vad,
    /// Higher measure means speech is more likely
    Xvad,
}

impl VadPolarity {
    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "vad" => Some(VadPolarity::Vad),
            "xvad" => Some(VadPolarity::Xvad),
            _ => None,
        }
    }

    /// Get string identifier
    pub fn to_str(&self) -> &'static str {
        match self {
            VadPolarity::Vad => "vad",
            VadPolarity::Xvad => "xvad",
        }
    }

    /// Whether `measure` indicates speech for `threshold`
    pub fn is_speech(&self, measure: f32, threshold: f32) -> bool {
        match self {
            VadPolarity::Vad => measure < threshold,
            VadPolarity::Xvad => measure > threshold,
        }
    }
}

/// Curve region selected by the envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DynamicsMode {
    Compress,
    Expand,
}

// ============================================================================
// Parameters
// ============================================================================

/// Overdrive parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverdriveParams {
    /// Gain computation strategy
    pub gain_function: GainFunction,
    /// Static curve
    pub curve: GainCurve,
    /// Envelope attack in compression, ms
    pub comp_attack_ms: f32,
    /// Envelope release in compression, ms
    pub comp_release_ms: f32,
    /// Envelope attack in expansion, ms
    pub exp_attack_ms: f32,
    /// Envelope release in expansion, ms
    pub exp_release_ms: f32,
    /// Voice-activity threshold
    pub vad_threshold: f32,
    /// Voice-activity polarity
    pub vad_polarity: VadPolarity,
}

impl Default for OverdriveParams {
    fn default() -> Self {
        Self {
            gain_function: GainFunction::Formula,
            curve: GainCurve::default(),
            comp_attack_ms: 5.0,
            comp_release_ms: 100.0,
            exp_attack_ms: 10.0,
            exp_release_ms: 200.0,
            vad_threshold: 0.5,
            vad_polarity: VadPolarity::Vad,
        }
    }
}

impl OverdriveParams {
    /// Clamp parameters to valid ranges
    pub fn clamp(&mut self) {
        self.curve.clamp();
        self.comp_attack_ms = clamp_or(self.comp_attack_ms, MIN_TIME_MS, MAX_TIME_MS);
        self.comp_release_ms = clamp_or(self.comp_release_ms, MIN_TIME_MS, MAX_TIME_MS);
        self.exp_attack_ms = clamp_or(self.exp_attack_ms, MIN_TIME_MS, MAX_TIME_MS);
        self.exp_release_ms = clamp_or(self.exp_release_ms, MIN_TIME_MS, MAX_TIME_MS);
        if self.vad_threshold.is_nan() {
            self.vad_threshold = 0.5;
        }
    }
}

/// Parameter whose change triggered a boost correction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Correction {
    RaiseRatio,
    LowerThreshold,
}

// ============================================================================
// Overdrive
// ============================================================================

/// Compressor/expander with selectable gain computation and VAD gating
#[derive(Debug, Clone)]
pub struct Overdrive {
    config: ProcessConfig,
    params: OverdriveParams,
    table: GainLookupTable,
    envelope: FirstOrderIir,
    mode: DynamicsMode,
    /// Expansion threshold as envelope power
    exp_threshold_power: f32,
    lambda_comp_attack: f32,
    lambda_comp_release: f32,
    lambda_exp_attack: f32,
    lambda_exp_release: f32,
    vad_measure: Option<f32>,
    vad_label: bool,
    display: Vec<f32>,
}

impl Overdrive {
    /// Create a processor with default parameters
    pub fn new(config: ProcessConfig) -> Result<Self> {
        Self::with_params(config, OverdriveParams::default())
    }

    /// Create a processor with the given parameters
    pub fn with_params(config: ProcessConfig, params: OverdriveParams) -> Result<Self> {
        config.validate()?;
        let mut params = params;
        params.clamp();

        let mut overdrive = Self {
            config,
            table: GainLookupTable::new(&params.curve),
            params,
            envelope: FirstOrderIir::with_alpha(config.sample_rate, 1.0),
            mode: DynamicsMode::Expand,
            exp_threshold_power: 0.0,
            lambda_comp_attack: 1.0,
            lambda_comp_release: 1.0,
            lambda_exp_attack: 1.0,
            lambda_exp_release: 1.0,
            vad_measure: None,
            vad_label: false,
            display: vec![0.0; config.block_size],
        };
        overdrive.update_lambdas();
        overdrive.prevent_overboost(Correction::LowerThreshold);
        overdrive.update_curve();

        log::debug!(
            "overdrive: {} gain, threshold {:.1} dB, ratio {:.1}",
            overdrive.params.gain_function.to_str(),
            overdrive.params.curve.comp_threshold_db,
            overdrive.params.curve.comp_ratio
        );
        Ok(overdrive)
    }

    /// Current parameters
    pub fn params(&self) -> &OverdriveParams {
        &self.params
    }

    /// Apply parameters; the curve is replaced as a whole
    pub fn set_params(&mut self, params: OverdriveParams) {
        self.set_gain_function(params.gain_function);
        self.set_comp_attack_ms(params.comp_attack_ms);
        self.set_comp_release_ms(params.comp_release_ms);
        self.set_exp_attack_ms(params.exp_attack_ms);
        self.set_exp_release_ms(params.exp_release_ms);
        self.set_vad_polarity(params.vad_polarity);
        self.set_vad_threshold(params.vad_threshold);
        self.set_curve(params.curve);
    }

    // ------------------------------------------------------------------
    // Curve setters
    // ------------------------------------------------------------------

    /// Select formula or lookup-table gain
    pub fn set_gain_function(&mut self, gain_function: GainFunction) {
        self.params.gain_function = gain_function;
        self.rebuild_display_curve();
    }

    /// Active gain computation strategy
    pub fn gain_function(&self) -> GainFunction {
        self.params.gain_function
    }

    /// Replace the whole static curve
    ///
    /// The boost check runs once on the complete curve, so a curve that does not
    /// boost full-scale input is kept exactly.
    pub fn set_curve(&mut self, curve: GainCurve) {
        let mut curve = curve;
        curve.clamp();
        self.params.curve = curve;
        self.prevent_overboost(Correction::LowerThreshold);
        self.update_curve();
    }

    /// Set the compression threshold in dB (-60 to 0)
    ///
    /// The expansion threshold follows it down if needed.
    pub fn set_comp_threshold_db(&mut self, threshold_db: f32) {
        let curve = &mut self.params.curve;
        curve.comp_threshold_db =
            clamp_or(threshold_db, MIN_COMP_THRESHOLD_DB, MAX_COMP_THRESHOLD_DB);
        curve.exp_threshold_db = curve.exp_threshold_db.min(curve.comp_threshold_db);
        self.prevent_overboost(Correction::LowerThreshold);
        self.update_curve();
    }

    /// Set the compression ratio (1 to 20)
    pub fn set_comp_ratio(&mut self, ratio: f32) {
        self.params.curve.comp_ratio = clamp_or(ratio, MIN_COMP_RATIO, MAX_COMP_RATIO);
        self.prevent_overboost(Correction::RaiseRatio);
        self.update_curve();
    }

    /// Set the expansion threshold in dB (-90 to the compression threshold)
    pub fn set_exp_threshold_db(&mut self, threshold_db: f32) {
        let curve = &mut self.params.curve;
        curve.exp_threshold_db =
            clamp_or(threshold_db, MIN_EXP_THRESHOLD_DB, curve.comp_threshold_db);
        self.prevent_overboost(Correction::LowerThreshold);
        self.update_curve();
    }

    /// Set the expansion ratio (1 to 10)
    pub fn set_exp_ratio(&mut self, ratio: f32) {
        self.params.curve.exp_ratio = clamp_or(ratio, MIN_EXP_RATIO, MAX_EXP_RATIO);
        self.prevent_overboost(Correction::LowerThreshold);
        self.update_curve();
    }

    /// Set the knee width in dB (0 to 24)
    pub fn set_knee_db(&mut self, knee_db: f32) {
        self.params.curve.knee_db = clamp_or(knee_db, 0.0, MAX_KNEE_DB);
        self.prevent_overboost(Correction::LowerThreshold);
        self.update_curve();
    }

    /// Set the makeup gain in dB (-24 to 24)
    pub fn set_makeup_db(&mut self, makeup_db: f32) {
        self.params.curve.makeup_db = clamp_or(makeup_db, MIN_MAKEUP_DB, MAX_MAKEUP_DB);
        self.prevent_overboost(Correction::LowerThreshold);
        self.update_curve();
    }

    /// Current static curve
    pub fn curve(&self) -> &GainCurve {
        &self.params.curve
    }

    // ------------------------------------------------------------------
    // Envelope setters
    // ------------------------------------------------------------------

    /// Set the attack time used while compressing
    pub fn set_comp_attack_ms(&mut self, ms: f32) {
        self.params.comp_attack_ms = clamp_or(ms, MIN_TIME_MS, MAX_TIME_MS);
        self.update_lambdas();
    }

    /// Set the release time used while compressing
    pub fn set_comp_release_ms(&mut self, ms: f32) {
        self.params.comp_release_ms = clamp_or(ms, MIN_TIME_MS, MAX_TIME_MS);
        self.update_lambdas();
    }

    /// Set the attack time used while expanding
    pub fn set_exp_attack_ms(&mut self, ms: f32) {
        self.params.exp_attack_ms = clamp_or(ms, MIN_TIME_MS, MAX_TIME_MS);
        self.update_lambdas();
    }

    /// Set the release time used while expanding
    pub fn set_exp_release_ms(&mut self, ms: f32) {
        self.params.exp_release_ms = clamp_or(ms, MIN_TIME_MS, MAX_TIME_MS);
        self.update_lambdas();
    }

    /// Envelope coefficients: (compress attack, compress release, expand attack, expand release)
    pub fn lambdas(&self) -> (f32, f32, f32, f32) {
        (
            self.lambda_comp_attack,
            self.lambda_comp_release,
            self.lambda_exp_attack,
            self.lambda_exp_release,
        )
    }

    /// Smoothed input power
    pub fn envelope(&self) -> f32 {
        self.envelope.value()
    }

    /// Region selected on the last processed sample
    pub fn mode(&self) -> DynamicsMode {
        self.mode
    }

    // ------------------------------------------------------------------
    // Voice activity
    // ------------------------------------------------------------------

    /// Supply the latest voice-activity measure and update the label
    pub fn set_vad_measure(&mut self, measure: f32) {
        self.vad_measure = Some(measure);
        self.update_vad_label();
    }

    /// Set the voice-activity threshold
    pub fn set_vad_threshold(&mut self, threshold: f32) {
        if !threshold.is_nan() {
            self.params.vad_threshold = threshold;
        }
        self.update_vad_label();
    }

    /// Set which side of the threshold means speech
    pub fn set_vad_polarity(&mut self, polarity: VadPolarity) {
        self.params.vad_polarity = polarity;
        self.update_vad_label();
    }

    /// Whether the current measure indicates speech
    pub fn vad_label(&self) -> bool {
        self.vad_label
    }

    fn update_vad_label(&mut self) {
        self.vad_label = match self.vad_measure {
            Some(m) => self
                .params
                .vad_polarity
                .is_speech(m, self.params.vad_threshold),
            None => false,
        };
    }

    // ------------------------------------------------------------------
    // Gain
    // ------------------------------------------------------------------

    /// Gain from the closed-form curve
    pub fn formula_gain(&self, amplitude: f32) -> f32 {
        self.params.curve.gain(amplitude)
    }

    /// Gain from the lookup table
    pub fn lookup_gain(&self, amplitude: f32) -> f32 {
        self.table.gain(amplitude)
    }

    /// Gain from the active strategy
    #[inline]
    pub fn gain(&self, amplitude: f32) -> f32 {
        match self.params.gain_function {
            GainFunction::Formula => self.params.curve.gain(amplitude),
            GainFunction::LookupTable => self.table.gain(amplitude),
        }
    }

    /// Lookup table in use
    pub fn lookup_table(&self) -> &GainLookupTable {
        &self.table
    }

    /// Output level `x * gain(x)` for `block_size` inputs spread over `[0, 1)`
    pub fn display_curve(&self) -> &[f32] {
        &self.display
    }

    // ------------------------------------------------------------------
    // Processing
    // ------------------------------------------------------------------

    /// Apply one sample of gain
    #[inline]
    pub fn process_sample(&mut self, x: f32) -> f32 {
        let power = x * x;
        let e = power - self.envelope.value();
        let lambda = match (self.mode, e > 0.0) {
            (DynamicsMode::Compress, true) => self.lambda_comp_attack,
            (DynamicsMode::Compress, false) => self.lambda_comp_release,
            (DynamicsMode::Expand, true) => self.lambda_exp_attack,
            (DynamicsMode::Expand, false) => self.lambda_exp_release,
        };
        let env = self.envelope.step(power, lambda);

        self.mode = if env < self.exp_threshold_power {
            DynamicsMode::Expand
        } else {
            DynamicsMode::Compress
        };

        if self.vad_label && self.mode == DynamicsMode::Expand {
            return x;
        }
        x * self.gain(env.sqrt())
    }

    fn update_lambdas(&mut self) {
        let fs = self.config.sample_rate;
        let p = &self.params;
        self.lambda_comp_attack = envelope_lambda(p.comp_attack_ms, fs, ATTACK_CORRECTION);
        self.lambda_comp_release = envelope_lambda(p.comp_release_ms, fs, RELEASE_CORRECTION);
        self.lambda_exp_attack = envelope_lambda(p.exp_attack_ms, fs, ATTACK_CORRECTION);
        self.lambda_exp_release = envelope_lambda(p.exp_release_ms, fs, RELEASE_CORRECTION);
    }

    /// Keep the full-scale gain at or below unity
    ///
    /// Nudges the parameter class that was just changed for at most
    /// `MAX_CORRECTION_STEPS` steps, then caps makeup.
    fn prevent_overboost(&mut self, correction: Correction) {
        let requested = self.params.curve.clone();
        let curve = &mut self.params.curve;

        for _ in 0..MAX_CORRECTION_STEPS {
            if curve.gain(1.0) <= 1.0 {
                break;
            }
            match correction {
                Correction::RaiseRatio if curve.comp_ratio < MAX_COMP_RATIO => {
                    curve.comp_ratio = (curve.comp_ratio + RATIO_STEP).min(MAX_COMP_RATIO);
                }
                _ if curve.comp_threshold_db > MIN_COMP_THRESHOLD_DB => {
                    curve.comp_threshold_db =
                        (curve.comp_threshold_db - THRESHOLD_STEP_DB).max(MIN_COMP_THRESHOLD_DB);
                    curve.exp_threshold_db = curve.exp_threshold_db.min(curve.comp_threshold_db);
                }
                _ => {
                    curve.makeup_db = (curve.makeup_db - MAKEUP_STEP_DB).max(MIN_MAKEUP_DB);
                }
            }
        }

        let unity_level = curve.output_level_db(0.0);
        if unity_level + curve.makeup_db > 0.0 {
            curve.makeup_db = -unity_level;
        }

        if *curve != requested {
            log::warn!(
                "overdrive: full-scale boost corrected (threshold {:.1} dB, ratio {:.2}, makeup {:.1} dB)",
                curve.comp_threshold_db,
                curve.comp_ratio,
                curve.makeup_db
            );
        }
    }

    fn update_curve(&mut self) {
        self.exp_threshold_power = 10.0_f32.powf(self.params.curve.exp_threshold_db / 10.0);
        self.table.rebuild(&self.params.curve);
        self.rebuild_display_curve();
    }

    fn rebuild_display_curve(&mut self) {
        let n = self.display.len() as f32;
        for i in 0..self.display.len() {
            let x = i as f32 / n;
            self.display[i] = x * self.gain(x);
        }
    }
}

impl Effect for Overdrive {
    fn effect_type(&self) -> &'static str {
        "overdrive"
    }

    fn display_name(&self) -> &'static str {
        "Overdrive Dynamics"
    }

    fn config(&self) -> ProcessConfig {
        self.config
    }

    fn process(&mut self, input: &[f32], output: &mut [f32]) {
        let n = block_frames(self.config.block_size, input, output);
        for (out, &x) in output[..n].iter_mut().zip(&input[..n]) {
            *out = self.process_sample(x);
        }
    }

    fn reset(&mut self) {
        self.envelope.reset();
        self.mode = DynamicsMode::Expand;
    }

    fn get_params(&self) -> Value {
        let p = &self.params;
        json!({
            "gain_function": p.gain_function.to_str(),
            "comp_threshold_db": p.curve.comp_threshold_db,
            "comp_ratio": p.curve.comp_ratio,
            "exp_threshold_db": p.curve.exp_threshold_db,
            "exp_ratio": p.curve.exp_ratio,
            "knee_db": p.curve.knee_db,
            "makeup_db": p.curve.makeup_db,
            "comp_attack_ms": p.comp_attack_ms,
            "comp_release_ms": p.comp_release_ms,
            "exp_attack_ms": p.exp_attack_ms,
            "exp_release_ms": p.exp_release_ms,
            "vad_threshold": p.vad_threshold,
            "vad_polarity": p.vad_polarity.to_str(),
            "vad_label": self.vad_label,
        })
    }

    /// Curve keys are gathered and applied together through `set_curve`
    fn apply_params(&mut self, json: &Value) -> Result<()> {
        let map = json
            .as_object()
            .ok_or_else(|| DafxError::invalid_param("params", json, "JSON object"))?;

        let mut curve = self.params.curve.clone();
        let mut curve_changed = false;
        for (name, value) in map {
            let field = match name.as_str() {
                "comp_threshold_db" => &mut curve.comp_threshold_db,
                "comp_ratio" => &mut curve.comp_ratio,
                "exp_threshold_db" => &mut curve.exp_threshold_db,
                "exp_ratio" => &mut curve.exp_ratio,
                "knee_db" => &mut curve.knee_db,
                "makeup_db" => &mut curve.makeup_db,
                _ => {
                    self.set_param(name, value)?;
                    continue;
                }
            };
            *field = param_f32(name, value)?;
            curve_changed = true;
        }

        if curve_changed {
            self.set_curve(curve);
        }
        Ok(())
    }

    fn set_param(&mut self, name: &str, value: &Value) -> Result<()> {
        match name {
            "gain_function" => {
                let s = param_str(name, value)?;
                let function = GainFunction::from_str(s).ok_or_else(|| {
                    DafxError::invalid_param(name, value, "formula or lookup_table")
                })?;
                self.set_gain_function(function);
            }
            "comp_threshold_db" => self.set_comp_threshold_db(param_f32(name, value)?),
            "comp_ratio" => self.set_comp_ratio(param_f32(name, value)?),
            "exp_threshold_db" => self.set_exp_threshold_db(param_f32(name, value)?),
            "exp_ratio" => self.set_exp_ratio(param_f32(name, value)?),
            "knee_db" => self.set_knee_db(param_f32(name, value)?),
            "makeup_db" => self.set_makeup_db(param_f32(name, value)?),
            "comp_attack_ms" => self.set_comp_attack_ms(param_f32(name, value)?),
            "comp_release_ms" => self.set_comp_release_ms(param_f32(name, value)?),
            "exp_attack_ms" => self.set_exp_attack_ms(param_f32(name, value)?),
            "exp_release_ms" => self.set_exp_release_ms(param_f32(name, value)?),
            "vad_threshold" => self.set_vad_threshold(param_f32(name, value)?),
            "vad_measure" => self.set_vad_measure(param_f32(name, value)?),
            "vad_polarity" => {
                let s = param_str(name, value)?;
                let polarity = VadPolarity::from_str(s)
                    .ok_or_else(|| DafxError::invalid_param(name, value, "vad or xvad"))?;
                self.set_vad_polarity(polarity);
            }
            _ => return Err(unknown_param(self.effect_type(), name)),
        }
        Ok(())
    }
}
