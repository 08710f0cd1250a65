//! Measured Transcode Module
//!
//! Runs one encode for one profile while a cancellable task samples CPU
//! utilization, and turns the result into a `Measurement` through the power
//! model.

mod runner;
mod sampler;

pub use runner::{build_measurement, mean_cpu_percent, MeasuredTranscodeRunner, RunnerOptions};
pub use sampler::{
    CpuSampler, HostCpuSampler, ProcSamplerSource, ProcessCpuSampler, SamplerSource, SamplingTask,
};

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::process::Command;

use crate::core::EncodingProfile;

/// One encode: source, destination and the parameters to use.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeJob {
    pub input: PathBuf,
    pub output: PathBuf,
    pub profile: EncodingProfile,
}

/// External encoding tool.
///
/// Implementations only build commands; the runner owns spawning, sampling,
/// timeouts and cleanup. Commands must not read stdin and must exit non-zero
/// on failure.
pub trait Encoder: Send + Sync {
    fn name(&self) -> &str;

    fn encode_command(&self, job: &EncodeJob) -> Command;

    /// Optional short run executed before the timed encode.
    fn warm_up_command(&self, _input: &Path) -> Option<Command> {
        None
    }
}

/// What the sampling task attributes utilization to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplingScope {
    /// Whole-host utilization; only valid when one encode runs at a time
    Host,
    /// Utilization of the encoder process alone
    Process,
}
