//! ecoencode Error Definitions
//!
//! Defines error types used throughout the pipeline.

use thiserror::Error;

/// Core engine error types
#[derive(Error, Debug)]
pub enum CoreError {
    // =========================================================================
    // Input Errors
    // =========================================================================
    /// Unreadable, empty or zero-frame source video. Fatal, never retried.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Probe failed: {0}")]
    ProbeFailed(String),

    // =========================================================================
    // Selection Errors
    // =========================================================================
    /// The trained model artifact is missing or unusable.
    ///
    /// Absorbed by the model-based selector, which falls back to the rule table.
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    // =========================================================================
    // Encode Errors
    // =========================================================================
    #[error("FFmpeg not found. Please install FFmpeg or set encoder.ffmpegPath.")]
    FFmpegNotFound,

    /// Non-zero encoder exit, launch failure or corrupt output.
    #[error("Encode failed: {0}")]
    EncodeFailed(String),

    /// The encoder ran past the configured ceiling and was killed.
    #[error("Encode timed out after {timeout_secs}s")]
    EncodeTimeout { timeout_secs: u64 },

    // =========================================================================
    // Measurement Errors
    // =========================================================================
    /// No CPU readings could be collected. Informational only.
    #[error("Sampling degraded: {0}")]
    SamplingDegraded(String),

    #[error("Invalid calibration: {0}")]
    InvalidCalibration(String),

    // =========================================================================
    // General Errors
    // =========================================================================
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Core engine result type
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// Whether the condition degrades a run instead of failing it.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            CoreError::ModelUnavailable(_) | CoreError::SamplingDegraded(_)
        )
    }
}
