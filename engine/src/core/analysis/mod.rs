//! Complexity Analysis Module
//!
//! Turns sampled grayscale frames into a 0-10 visual complexity score built
//! from spatial detail (edge density) and temporal change (frame deltas).

mod complexity;
mod frames;

pub use complexity::{edge_density, motion_ratio, ComplexityAnalyzer};
pub use frames::GrayFrame;
