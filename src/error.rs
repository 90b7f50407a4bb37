//! Error handling for DAFX
//!
//! Processing paths never fail: out-of-range parameters are clamped. Errors are
//! reserved for construction, parameter routing by name, and file I/O in adapters.

use thiserror::Error;

/// Result type alias for DAFX operations
pub type Result<T> = std::result::Result<T, DafxError>;

/// Main error type for DAFX operations
#[derive(Error, Debug)]
pub enum DafxError {
    // Configuration Errors
    #[error("Invalid sample rate: {sample_rate} Hz")]
    InvalidSampleRate { sample_rate: f32 },

    #[error("Invalid block size: {block_size} (must be between 1 and {max})")]
    InvalidBlockSize { block_size: usize, max: usize },

    // Parameter Errors
    #[error("Unknown parameter '{param}' for effect '{effect}'")]
    UnknownParameter { effect: String, param: String },

    #[error("Invalid value for '{param}': {value} (expected {expected})")]
    InvalidParameter {
        param: String,
        value: String,
        expected: String,
    },

    #[error("Unknown effect: {name}")]
    UnknownEffect { name: String },

    // File Errors
    #[error("File not found: {path}")]
    FileNotFound { path: String },

    #[error("Invalid audio file: {reason}")]
    InvalidAudio {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Unsupported audio format: {format}")]
    UnsupportedFormat { format: String },

    // I/O Errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization Errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DafxError {
    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            DafxError::InvalidSampleRate { .. } => "INVALID_SAMPLE_RATE",
            DafxError::InvalidBlockSize { .. } => "INVALID_BLOCK_SIZE",
            DafxError::UnknownParameter { .. } => "UNKNOWN_PARAMETER",
            DafxError::InvalidParameter { .. } => "INVALID_PARAMETER",
            DafxError::UnknownEffect { .. } => "UNKNOWN_EFFECT",
            DafxError::FileNotFound { .. } => "FILE_NOT_FOUND",
            DafxError::InvalidAudio { .. } => "INVALID_AUDIO",
            DafxError::UnsupportedFormat { .. } => "UNSUPPORTED_FORMAT",
            DafxError::Io(_) => "IO_ERROR",
            DafxError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Check if this error is recoverable
    ///
    /// Parameter errors leave the effect untouched, so the caller can retry.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            DafxError::UnknownParameter { .. }
                | DafxError::InvalidParameter { .. }
                | DafxError::UnknownEffect { .. }
        )
    }

    /// Shorthand for a value of the wrong JSON type
    pub(crate) fn invalid_param(param: &str, value: &serde_json::Value, expected: &str) -> Self {
        DafxError::InvalidParameter {
            param: param.to_string(),
            value: value.to_string(),
            expected: expected.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = DafxError::InvalidBlockSize {
            block_size: 0,
            max: 8192,
        };
        assert_eq!(err.error_code(), "INVALID_BLOCK_SIZE");

        let err = DafxError::UnknownParameter {
            effect: "tremolo".to_string(),
            param: "color".to_string(),
        };
        assert_eq!(err.error_code(), "UNKNOWN_PARAMETER");
    }

    #[test]
    fn test_recoverable() {
        let err = DafxError::invalid_param("depth", &serde_json::json!("deep"), "number");
        assert!(err.is_recoverable());
        assert!(err.to_string().contains("depth"));

        let err = DafxError::InvalidSampleRate { sample_rate: 0.0 };
        assert!(!err.is_recoverable());
    }
}
