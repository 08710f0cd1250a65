//! ecoencode library
//!
//! Chooses encoder parameters from a video's visual complexity and measures
//! the energy each choice costs on a calibrated host.

pub mod core;
