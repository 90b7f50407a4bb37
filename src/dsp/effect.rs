//! Effect trait definition
//!
//! Shared processing configuration and the uniform interface implemented by every
//! single-input, single-output unit.

use crate::error::{DafxError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Largest block size accepted at construction
pub const MAX_BLOCK_SIZE: usize = 8192;

/// Default block size (samples per processing call)
pub const DEFAULT_BLOCK_SIZE: usize = 16;

/// Default sample rate in Hz
pub const DEFAULT_SAMPLE_RATE: f32 = 48000.0;

/// Sample rate and block size shared by all units on one signal path
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProcessConfig {
    /// Sample rate in Hz
    pub sample_rate: f32,
    /// Samples per processing call, fixed for the lifetime of a unit
    pub block_size: usize,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            block_size: DEFAULT_BLOCK_SIZE,
        }
    }
}

impl ProcessConfig {
    /// Create and validate a configuration
    pub fn new(sample_rate: f32, block_size: usize) -> Result<Self> {
        let config = Self {
            sample_rate,
            block_size,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate sample rate and block size
    pub fn validate(&self) -> Result<()> {
        if !self.sample_rate.is_finite() || self.sample_rate < 1000.0 {
            return Err(DafxError::InvalidSampleRate {
                sample_rate: self.sample_rate,
            });
        }
        if self.block_size == 0 || self.block_size > MAX_BLOCK_SIZE {
            return Err(DafxError::InvalidBlockSize {
                block_size: self.block_size,
                max: MAX_BLOCK_SIZE,
            });
        }
        Ok(())
    }

    /// Nyquist frequency in Hz
    pub fn nyquist(&self) -> f32 {
        self.sample_rate * 0.5
    }
}

/// Base trait for single-input, single-output effects
///
/// `process` and `bypass` handle at most `block_size` samples; the shorter of the
/// two slices bounds the call. Neither allocates nor fails.
pub trait Effect: Send {
    /// Get the effect type identifier
    fn effect_type(&self) -> &'static str;

    /// Get human-readable display name
    fn display_name(&self) -> &'static str;

    /// Get the configuration the effect was built with
    fn config(&self) -> ProcessConfig;

    /// Process one block from `input` into `output`
    fn process(&mut self, input: &[f32], output: &mut [f32]);

    /// Copy the dry signal unchanged
    fn bypass(&mut self, input: &[f32], output: &mut [f32]) {
        let n = block_frames(self.config().block_size, input, output);
        output[..n].copy_from_slice(&input[..n]);
    }

    /// Clear filter history and buffers without touching parameters
    fn reset(&mut self);

    /// Get all parameters as JSON
    fn get_params(&self) -> Value;

    /// Set a single parameter by name
    fn set_param(&mut self, name: &str, value: &Value) -> Result<()>;

    /// Apply every key of a JSON object through `set_param`
    fn apply_params(&mut self, json: &Value) -> Result<()> {
        let map = json
            .as_object()
            .ok_or_else(|| DafxError::invalid_param("params", json, "JSON object"))?;
        for (name, value) in map {
            self.set_param(name, value)?;
        }
        Ok(())
    }
}

/// Number of samples a call may process
#[inline]
pub fn block_frames(block_size: usize, input: &[f32], output: &[f32]) -> usize {
    block_size.min(input.len()).min(output.len())
}

/// Read a numeric parameter value
pub(crate) fn param_f32(name: &str, value: &Value) -> Result<f32> {
    value
        .as_f64()
        .map(|v| v as f32)
        .ok_or_else(|| DafxError::invalid_param(name, value, "number"))
}

/// Read a boolean parameter value
pub(crate) fn param_bool(name: &str, value: &Value) -> Result<bool> {
    value
        .as_bool()
        .ok_or_else(|| DafxError::invalid_param(name, value, "boolean"))
}

/// Read a string parameter value
pub(crate) fn param_str<'a>(name: &str, value: &'a Value) -> Result<&'a str> {
    value
        .as_str()
        .ok_or_else(|| DafxError::invalid_param(name, value, "string"))
}

/// Error for a parameter name the effect does not know
pub(crate) fn unknown_param(effect: &str, name: &str) -> DafxError {
    DafxError::UnknownParameter {
        effect: effect.to_string(),
        param: name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_config_is_valid() {
        let config = ProcessConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.block_size, 16);
        assert_eq!(config.nyquist(), 24000.0);
    }

    #[test]
    fn test_invalid_config() {
        assert!(ProcessConfig::new(48000.0, 0).is_err());
        assert!(ProcessConfig::new(48000.0, MAX_BLOCK_SIZE + 1).is_err());
        assert!(ProcessConfig::new(0.0, 64).is_err());
        assert!(ProcessConfig::new(f32::NAN, 64).is_err());
    }

    #[test]
    fn test_block_frames() {
        let input = [0.0; 10];
        let output = [0.0; 8];
        assert_eq!(block_frames(16, &input, &output), 8);
        assert_eq!(block_frames(4, &input, &output), 4);
    }

    #[test]
    fn test_param_readers() {
        assert_eq!(param_f32("depth", &json!(42)).unwrap(), 42.0);
        assert!(param_f32("depth", &json!("x")).is_err());
        assert!(param_bool("on", &json!(true)).unwrap());
        assert_eq!(param_str("mode", &json!("auto")).unwrap(), "auto");
        assert_eq!(
            unknown_param("tremolo", "color").error_code(),
            "UNKNOWN_PARAMETER"
        );
    }
}
