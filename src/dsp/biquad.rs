//! Biquad filter
//!
//! Single second-order IIR section in transposed direct form II. Coefficients are
//! handed over as a [`CoefficientSet`] value and always stored normalized (a0 = 1).

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Q of a second-order Butterworth section (1/sqrt(2))
pub const BUTTERWORTH_Q: f64 = std::f64::consts::FRAC_1_SQRT_2;

/// Six biquad coefficients `[b0, b1, b2, a0, a1, a2]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoefficientSet {
    pub b0: f32,
    pub b1: f32,
    pub b2: f32,
    pub a0: f32,
    pub a1: f32,
    pub a2: f32,
}

impl Default for CoefficientSet {
    fn default() -> Self {
        Self::identity()
    }
}

impl CoefficientSet {
    /// Create a coefficient set from raw values
    pub fn new(b0: f32, b1: f32, b2: f32, a0: f32, a1: f32, a2: f32) -> Self {
        Self {
            b0,
            b1,
            b2,
            a0,
            a1,
            a2,
        }
    }

    /// Pass-through section: `b = [1, 0, 0]`, `a = [1, 0, 0]`
    pub fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, 0.0, 0.0)
    }

    /// Build from `[b0, b1, b2, a0, a1, a2]`
    pub fn from_array(c: [f32; 6]) -> Self {
        Self::new(c[0], c[1], c[2], c[3], c[4], c[5])
    }

    /// Coefficients as `[b0, b1, b2, a0, a1, a2]`
    pub fn to_array(&self) -> [f32; 6] {
        [self.b0, self.b1, self.b2, self.a0, self.a1, self.a2]
    }

    /// Butterworth low-pass at `cutoff_hz` (RBJ cookbook, normalized)
    pub fn butterworth_lowpass(cutoff_hz: f32, sample_rate: f32) -> Self {
        let (cos_w0, alpha) = Self::prewarp(cutoff_hz, sample_rate);
        Self::normalize_f64(
            (1.0 - cos_w0) / 2.0,
            1.0 - cos_w0,
            (1.0 - cos_w0) / 2.0,
            1.0 + alpha,
            -2.0 * cos_w0,
            1.0 - alpha,
        )
    }

    /// Butterworth high-pass at `cutoff_hz` (RBJ cookbook, normalized)
    pub fn butterworth_highpass(cutoff_hz: f32, sample_rate: f32) -> Self {
        let (cos_w0, alpha) = Self::prewarp(cutoff_hz, sample_rate);
        Self::normalize_f64(
            (1.0 + cos_w0) / 2.0,
            -(1.0 + cos_w0),
            (1.0 + cos_w0) / 2.0,
            1.0 + alpha,
            -2.0 * cos_w0,
            1.0 - alpha,
        )
    }

    /// Same response with the output polarity flipped (negated numerator)
    pub fn inverted(&self) -> Self {
        Self::new(-self.b0, -self.b1, -self.b2, self.a0, self.a1, self.a2)
    }

    /// Divide every coefficient by a0
    ///
    /// Returns `None` when a0 is zero or not finite, since no normalized form exists.
    pub fn normalized(&self) -> Option<Self> {
        if self.a0 == 0.0 || !self.a0.is_finite() {
            return None;
        }
        let inv = 1.0 / self.a0;
        Some(Self::new(
            self.b0 * inv,
            self.b1 * inv,
            self.b2 * inv,
            1.0,
            self.a1 * inv,
            self.a2 * inv,
        ))
    }

    fn prewarp(cutoff_hz: f32, sample_rate: f32) -> (f64, f64) {
        let w0 = 2.0 * PI * cutoff_hz as f64 / sample_rate as f64;
        let alpha = w0.sin() / (2.0 * BUTTERWORTH_Q);
        (w0.cos(), alpha)
    }

    fn normalize_f64(b0: f64, b1: f64, b2: f64, a0: f64, a1: f64, a2: f64) -> Self {
        Self::new(
            (b0 / a0) as f32,
            (b1 / a0) as f32,
            (b2 / a0) as f32,
            1.0,
            (a1 / a0) as f32,
            (a2 / a0) as f32,
        )
    }
}

/// Second-order IIR section, transposed direct form II
///
/// A new filter is an identity section with cleared state.
#[derive(Debug, Clone, Default)]
pub struct BiquadFilter {
    coeffs: NormalizedCoeffs,
    w1: f32,
    w2: f32,
}

/// Normalized coefficients in the form used by the recursion
#[derive(Debug, Clone, Copy)]
struct NormalizedCoeffs {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
}

impl Default for NormalizedCoeffs {
    fn default() -> Self {
        Self {
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
        }
    }
}

impl BiquadFilter {
    /// Create an identity filter
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a filter with the given coefficients
    pub fn with_coefficients(coeffs: CoefficientSet) -> Self {
        let mut filter = Self::new();
        filter.set_coefficients(coeffs);
        filter
    }

    /// Load coefficients, normalizing by a0
    ///
    /// A set with zero or non-finite a0 is ignored and the previous
    /// coefficients stay active. Filter state is kept.
    pub fn set_coefficients(&mut self, coeffs: CoefficientSet) {
        if let Some(n) = coeffs.normalized() {
            self.coeffs = NormalizedCoeffs {
                b0: n.b0,
                b1: n.b1,
                b2: n.b2,
                a1: n.a1,
                a2: n.a2,
            };
        }
    }

    /// Currently active coefficients (a0 is always 1)
    pub fn coefficients(&self) -> CoefficientSet {
        let c = self.coeffs;
        CoefficientSet::new(c.b0, c.b1, c.b2, 1.0, c.a1, c.a2)
    }

    /// Filter one sample
    #[inline]
    pub fn process_sample(&mut self, x: f32) -> f32 {
        let c = &self.coeffs;
        let y = c.b0 * x + self.w1;
        self.w1 = c.b1 * x - c.a1 * y + self.w2;
        self.w2 = c.b2 * x - c.a2 * y;
        y
    }

    /// Filter `input` into `output`, sample by sample
    ///
    /// State carries over between calls, so block boundaries are transparent.
    pub fn process_block(&mut self, input: &[f32], output: &mut [f32]) {
        for (out, &x) in output.iter_mut().zip(input.iter()) {
            *out = self.process_sample(x);
        }
    }

    /// Filter a buffer in place
    pub fn process_block_in_place(&mut self, buffer: &mut [f32]) {
        for sample in buffer.iter_mut() {
            *sample = self.process_sample(*sample);
        }
    }

    /// Clear the two delay registers
    pub fn reset(&mut self) {
        self.w1 = 0.0;
        self.w2 = 0.0;
    }
}
