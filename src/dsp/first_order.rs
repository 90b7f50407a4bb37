//! First-order IIR smoother
//!
//! One-pole low-pass `y = alpha * x + (1 - alpha) * y_prev`. The response can be
//! given by cutoff, time constant, tau, or alpha directly.

use serde::{Deserialize, Serialize};

/// One-pole smoothing filter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FirstOrderIir {
    /// Smoothing coefficient (0 = frozen, 1 = no smoothing)
    alpha: f32,
    /// Sample rate in Hz
    sample_rate: f32,
    /// Previous output
    #[serde(skip)]
    y_prev: f32,
}

impl FirstOrderIir {
    /// Create a smoother with the given alpha
    pub fn with_alpha(sample_rate: f32, alpha: f32) -> Self {
        Self {
            alpha: alpha.clamp(0.0, 1.0),
            sample_rate,
            y_prev: 0.0,
        }
    }

    /// Create a smoother from a cutoff frequency in Hz
    pub fn with_cutoff(sample_rate: f32, cutoff_hz: f32) -> Self {
        let mut filter = Self::with_alpha(sample_rate, 1.0);
        filter.set_cutoff(cutoff_hz);
        filter
    }

    /// Create a smoother from a time constant in milliseconds
    pub fn with_time_constant_ms(sample_rate: f32, tc_ms: f32) -> Self {
        let mut filter = Self::with_alpha(sample_rate, 1.0);
        filter.set_time_constant_ms(tc_ms);
        filter
    }

    /// Set alpha from a cutoff frequency: `alpha = 1 - exp(-fc / fs)`
    pub fn set_cutoff(&mut self, cutoff_hz: f32) {
        let fc = cutoff_hz.max(0.0);
        self.alpha = 1.0 - (-fc / self.sample_rate).exp();
    }

    /// Set alpha from a time constant in milliseconds
    pub fn set_time_constant_ms(&mut self, tc_ms: f32) {
        if tc_ms <= 0.0 {
            self.alpha = 1.0;
            return;
        }
        self.set_cutoff(1.0 / (tc_ms * 0.001));
    }

    /// Set alpha from tau in seconds
    pub fn set_tau(&mut self, tau_secs: f32) {
        self.set_time_constant_ms(tau_secs * 1000.0);
    }

    /// Set alpha directly (clamped to 0..=1)
    pub fn set_alpha(&mut self, alpha: f32) {
        self.alpha = alpha.clamp(0.0, 1.0);
    }

    /// Current alpha
    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    /// Last output value
    pub fn value(&self) -> f32 {
        self.y_prev
    }

    /// Smooth one sample with the stored alpha
    #[inline]
    pub fn process_sample(&mut self, x: f32) -> f32 {
        self.step(x, self.alpha)
    }

    /// Smooth one sample with a caller-chosen alpha
    ///
    /// Used where the coefficient switches per sample, e.g. attack vs release.
    #[inline]
    pub fn step(&mut self, x: f32, alpha: f32) -> f32 {
        self.y_prev += alpha * (x - self.y_prev);
        self.y_prev
    }

    /// Smooth a buffer in place
    pub fn process_block_in_place(&mut self, buffer: &mut [f32]) {
        for sample in buffer.iter_mut() {
            *sample = self.process_sample(*sample);
        }
    }

    /// Reset the output to `value`
    pub fn reset_to(&mut self, value: f32) {
        self.y_prev = value;
    }

    /// Reset the output to zero
    pub fn reset(&mut self) {
        self.y_prev = 0.0;
    }
}
