//! FFmpeg Integration Module
//!
//! The external collaborators of the pipeline:
//! - FFprobe metadata extraction
//! - Grayscale frame decoding for complexity analysis
//! - Encode and warm-up command construction for measured runs
//!
//! Uses an explicitly configured binary or a system-installed FFmpeg.

mod detection;
mod encoder;
mod runner;

pub use detection::*;
pub use encoder::FFmpegEncoder;
pub use runner::{parse_probe_output, FFmpegRunner};

use crate::core::CoreError;

/// FFmpeg-related error types
#[derive(Debug, thiserror::Error)]
pub enum FFmpegError {
    #[error("FFmpeg not found. Please install FFmpeg or set encoder.ffmpegPath.")]
    NotFound,

    #[error("FFmpeg execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Invalid input file: {0}")]
    InvalidInput(String),

    #[error("FFprobe error: {0}")]
    ProbeError(String),

    #[error("Process error: {0}")]
    ProcessError(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    ParseError(String),
}

pub type FFmpegResult<T> = Result<T, FFmpegError>;

impl From<FFmpegError> for CoreError {
    fn from(err: FFmpegError) -> Self {
        match err {
            FFmpegError::NotFound => CoreError::FFmpegNotFound,
            FFmpegError::InvalidInput(msg) => CoreError::InvalidInput(msg),
            FFmpegError::ProbeError(msg) | FFmpegError::ParseError(msg) => {
                CoreError::ProbeFailed(msg)
            }
            FFmpegError::ExecutionFailed(msg) => CoreError::Internal(msg),
            FFmpegError::ProcessError(e) => CoreError::IoError(e),
        }
    }
}
