//! ecoencode Core Engine
//!
//! Energy-aware transcoding pipeline: complexity analysis, parameter
//! selection, measured encodes and comparative aggregation.

pub mod analysis;
pub mod calibration;
pub mod compare;
pub mod ffmpeg;
pub mod fs;
pub mod measure;
pub mod power;
pub mod process;
pub mod selection;
pub mod settings;

// Re-export common types
mod types;
pub use types::*;

mod error;
pub use error::*;
