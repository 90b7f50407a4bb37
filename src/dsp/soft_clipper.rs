//! Soft clipper
//!
//! Memoryless overdrive waveshaper with three curves:
//! - Tanh: `out_gain * tanh(tan_param * x)`
//! - Sin: quarter sine up to the threshold, flat beyond it
//! - Exp: `1 - |x/thr - sign(x)|^exp_param` up to the threshold, flat beyond it
//!
//! The input is scaled by `in_gain` first; the output never exceeds `out_gain`.

use crate::dsp::effect::{
    block_frames, param_f32, param_str, unknown_param, Effect, ProcessConfig,
};
use crate::error::{DafxError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::f32::consts::PI;

// ============================================================================
// Constants
// ============================================================================

const MIN_THRESHOLD: f32 = 0.01;
const MAX_THRESHOLD: f32 = 1.0;
const MIN_TAN_PARAM: f32 = 3.0;
const MAX_TAN_PARAM: f32 = 150.0;
const MIN_EXP_PARAM: f32 = 2.0;
const MAX_EXP_PARAM: f32 = 10.0;
const MIN_IN_GAIN: f32 = 0.0;
const MAX_IN_GAIN: f32 = 10.0;
const MIN_OUT_GAIN: f32 = 0.01;
const MAX_OUT_GAIN: f32 = 0.99;

// ============================================================================
// Curve
// ============================================================================

/// Soft clipping curve
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ClipCurve {
    /// Hyperbolic tangent
    #[default]
    Tanh,
    /// Quarter sine, clipped at the threshold
    Sin,
    /// Exponential knee, clipped at the threshold
    Exp,
}

impl ClipCurve {
    /// Parse curve from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "tanh" => Some(ClipCurve::Tanh),
            "sin" | "sine" => Some(ClipCurve::Sin),
            "exp" => Some(ClipCurve::Exp),
            _ => None,
        }
    }

    /// Get string identifier
    pub fn to_str(&self) -> &'static str {
        match self {
            ClipCurve::Tanh => "tanh",
            ClipCurve::Sin => "sin",
            ClipCurve::Exp => "exp",
        }
    }
}

/// Sign with zero mapping to zero
#[inline]
fn sign(x: f32) -> f32 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}

// ============================================================================
// Parameters
// ============================================================================

/// Soft clipper parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoftClipperParams {
    /// Clipping curve
    pub curve: ClipCurve,
    /// Input gain (0 to 10)
    pub in_gain: f32,
    /// Output ceiling (0.01 to 0.99)
    pub out_gain: f32,
    /// Clipping threshold for the sin and exp curves (0.01 to 1)
    pub threshold: f32,
    /// Pre-gain of the tanh curve (3 to 150)
    pub tan_param: f32,
    /// Exponent of the exp curve (2 to 10)
    pub exp_param: f32,
}

impl Default for SoftClipperParams {
    fn default() -> Self {
        Self {
            curve: ClipCurve::Tanh,
            in_gain: 1.0,
            out_gain: 0.75,
            threshold: 0.66,
            tan_param: 5.0,
            exp_param: 2.0,
        }
    }
}

impl SoftClipperParams {
    /// Clamp parameters to valid ranges
    pub fn clamp(&mut self) {
        let defaults = Self::default();
        let fix = |v: f32, fallback: f32, min: f32, max: f32| {
            if v.is_nan() {
                fallback
            } else {
                v.clamp(min, max)
            }
        };
        self.in_gain = fix(self.in_gain, defaults.in_gain, MIN_IN_GAIN, MAX_IN_GAIN);
        self.out_gain = fix(self.out_gain, defaults.out_gain, MIN_OUT_GAIN, MAX_OUT_GAIN);
        self.threshold = fix(self.threshold, defaults.threshold, MIN_THRESHOLD, MAX_THRESHOLD);
        self.tan_param = fix(self.tan_param, defaults.tan_param, MIN_TAN_PARAM, MAX_TAN_PARAM);
        self.exp_param = fix(self.exp_param, defaults.exp_param, MIN_EXP_PARAM, MAX_EXP_PARAM);
    }
}

// ============================================================================
// Soft Clipper
// ============================================================================

/// Waveshaping overdrive
#[derive(Debug, Clone)]
pub struct SoftClipper {
    config: ProcessConfig,
    params: SoftClipperParams,
    inv_threshold: f32,
    display: Vec<f32>,
}

impl SoftClipper {
    /// Create a tanh clipper with default parameters
    pub fn new(config: ProcessConfig) -> Result<Self> {
        Self::with_params(config, SoftClipperParams::default())
    }

    /// Create a clipper with the given parameters
    pub fn with_params(config: ProcessConfig, params: SoftClipperParams) -> Result<Self> {
        config.validate()?;
        let mut clipper = Self {
            config,
            params,
            inv_threshold: 1.0,
            display: vec![0.0; config.block_size],
        };
        clipper.update();
        Ok(clipper)
    }

    /// Current parameters
    pub fn params(&self) -> &SoftClipperParams {
        &self.params
    }

    /// Apply parameters
    pub fn set_params(&mut self, params: SoftClipperParams) {
        self.params = params;
        self.update();
    }

    /// Select the clipping curve
    pub fn set_curve(&mut self, curve: ClipCurve) {
        self.params.curve = curve;
        self.update();
    }

    /// Set the input gain
    pub fn set_in_gain(&mut self, gain: f32) {
        self.params.in_gain = gain;
        self.update();
    }

    /// Set the output ceiling
    pub fn set_out_gain(&mut self, gain: f32) {
        self.params.out_gain = gain;
        self.update();
    }

    /// Set the clipping threshold
    pub fn set_threshold(&mut self, threshold: f32) {
        self.params.threshold = threshold;
        self.update();
    }

    /// Set the tanh pre-gain
    pub fn set_tan_param(&mut self, tan_param: f32) {
        self.params.tan_param = tan_param;
        self.update();
    }

    /// Set the exp curve exponent
    pub fn set_exp_param(&mut self, exp_param: f32) {
        self.params.exp_param = exp_param;
        self.update();
    }

    /// Shape one sample
    #[inline]
    pub fn process_sample(&self, input: f32) -> f32 {
        let p = &self.params;
        let x = p.in_gain * input;
        match p.curve {
            ClipCurve::Tanh => p.out_gain * (p.tan_param * x).tanh(),
            ClipCurve::Sin => {
                if x.abs() > p.threshold {
                    p.out_gain * sign(x)
                } else {
                    p.out_gain * (0.5 * self.inv_threshold * PI * x).sin()
                }
            }
            ClipCurve::Exp => {
                let s = sign(x);
                if x.abs() > p.threshold {
                    p.out_gain * s
                } else {
                    let knee = (self.inv_threshold * x - s).abs().powf(p.exp_param);
                    p.out_gain * s * (1.0 - knee)
                }
            }
        }
    }

    /// Transfer curve for `block_size` inputs spread over `[0, 1)`
    pub fn display_curve(&self) -> &[f32] {
        &self.display
    }

    fn update(&mut self) {
        self.params.clamp();
        self.inv_threshold = 1.0 / self.params.threshold;

        let n = self.display.len() as f32;
        for i in 0..self.display.len() {
            self.display[i] = self.process_sample(i as f32 / n);
        }
    }
}

impl Effect for SoftClipper {
    fn effect_type(&self) -> &'static str {
        "softclip"
    }

    fn display_name(&self) -> &'static str {
        "Soft Clipper"
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

    fn reset(&mut self) {}

    fn get_params(&self) -> Value {
        let p = &self.params;
        json!({
            "curve": p.curve.to_str(),
            "in_gain": p.in_gain,
            "out_gain": p.out_gain,
            "threshold": p.threshold,
            "tan_param": p.tan_param,
            "exp_param": p.exp_param,
        })
    }

    fn set_param(&mut self, name: &str, value: &Value) -> Result<()> {
        match name {
            "curve" => {
                let s = param_str(name, value)?;
                let curve = ClipCurve::from_str(s)
                    .ok_or_else(|| DafxError::invalid_param(name, value, "tanh, sin or exp"))?;
                self.set_curve(curve);
            }
            "in_gain" => self.set_in_gain(param_f32(name, value)?),
            "out_gain" => self.set_out_gain(param_f32(name, value)?),
            "threshold" => self.set_threshold(param_f32(name, value)?),
            "tan_param" => self.set_tan_param(param_f32(name, value)?),
            "exp_param" => self.set_exp_param(param_f32(name, value)?),
            _ => return Err(unknown_param(self.effect_type(), name)),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use test_case::test_case;

    fn clipper(curve: ClipCurve) -> SoftClipper {
        let mut clipper = SoftClipper::new(ProcessConfig::new(48000.0, 256).unwrap()).unwrap();
        clipper.set_curve(curve);
        clipper
    }

    #[test_case(ClipCurve::Tanh ; "tanh")]
    #[test_case(ClipCurve::Sin ; "sin")]
    #[test_case(ClipCurve::Exp ; "exp")]
    fn test_output_bounded_and_odd(curve: ClipCurve) {
        let clipper = clipper(curve);
        for i in -200..=200 {
            let x = i as f32 * 0.01;
            let y = clipper.process_sample(x);
            assert!(y.abs() <= 0.75 + 1e-6, "{:?}: |f({})| = {}", curve, x, y);
            assert_abs_diff_eq!(clipper.process_sample(-x), -y, epsilon = 1e-6);
        }
        assert_eq!(clipper.process_sample(0.0), 0.0);
    }

    #[test]
    fn test_sin_and_exp_reach_ceiling_at_threshold() {
        let sin = clipper(ClipCurve::Sin);
        assert_abs_diff_eq!(sin.process_sample(0.66), 0.75, epsilon = 1e-5);
        assert_eq!(sin.process_sample(0.9), 0.75);

        let exp = clipper(ClipCurve::Exp);
        assert_abs_diff_eq!(exp.process_sample(0.66), 0.75, epsilon = 1e-5);
        // Half way up the knee: 1 - 0.5^2
        assert_abs_diff_eq!(exp.process_sample(0.33), 0.75 * 0.75, epsilon = 1e-5);
    }

    #[test]
    fn test_tanh_matches_closed_form() {
        let clipper = clipper(ClipCurve::Tanh);
        assert_abs_diff_eq!(clipper.process_sample(0.1), 0.75 * 0.5_f32.tanh(), epsilon = 1e-6);
    }

    #[test]
    fn test_params_clamped() {
        let mut clipper = clipper(ClipCurve::Exp);
        clipper.set_threshold(0.0);
        clipper.set_tan_param(1000.0);
        clipper.set_exp_param(1.0);
        clipper.set_out_gain(2.0);
        clipper.set_in_gain(-1.0);

        let p = clipper.params();
        assert_eq!(p.threshold, MIN_THRESHOLD);
        assert_eq!(p.tan_param, MAX_TAN_PARAM);
        assert_eq!(p.exp_param, MIN_EXP_PARAM);
        assert_eq!(p.out_gain, MAX_OUT_GAIN);
        assert_eq!(p.in_gain, 0.0);
        // Zero input gain silences everything
        assert_eq!(clipper.process_sample(0.8), 0.0);
    }

    #[test]
    fn test_display_curve_follows_curve() {
        let mut clipper = clipper(ClipCurve::Tanh);
        let curve = clipper.display_curve();
        assert_eq!(curve.len(), 256);
        assert_eq!(curve[0], 0.0);
        assert_eq!(curve[128], clipper.process_sample(0.5));

        clipper.set_curve(ClipCurve::Sin);
        assert_eq!(clipper.display_curve()[255], 0.75);
    }

    #[test]
    fn test_bypass_and_params_by_name() {
        let mut clipper = clipper(ClipCurve::Tanh);
        let input: Vec<f32> = (0..256).map(|i| (i as f32 * 0.1).sin()).collect();
        let mut output = vec![0.0; 256];
        clipper.bypass(&input, &mut output);
        assert_eq!(input, output);

        clipper.set_param("curve", &serde_json::json!("exp")).unwrap();
        assert_eq!(clipper.params().curve, ClipCurve::Exp);
        assert!(clipper.set_param("curve", &serde_json::json!("fuzz")).is_err());
        assert!(clipper.set_param("drive", &serde_json::json!(1.0)).is_err());
    }
}
