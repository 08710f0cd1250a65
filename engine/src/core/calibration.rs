//! Host Calibration
//!
//! Measures CPU utilization at rest and under full synthetic load, then
//! converts both operating points to watts with a TDP estimate. The result
//! feeds `CalibrationConstants`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::measure::CpuSampler;
use crate::core::power::CalibrationConstants;
use crate::core::{CoreError, CoreResult};

/// Default per-host TDP estimate, in watts.
pub const DEFAULT_TDP_WATTS: f64 = 28.0;

// =============================================================================
// Statistics
// =============================================================================

/// Summary of utilization readings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UtilizationStats {
    pub mean: f64,
    /// Sample standard deviation (0 for a single reading)
    pub stdev: f64,
    pub min: f64,
    pub max: f64,
    pub sample_count: usize,
}

impl UtilizationStats {
    pub fn from_samples(samples: &[f64]) -> CoreResult<Self> {
        if samples.is_empty() {
            return Err(CoreError::SamplingDegraded(
                "no utilization samples collected".to_string(),
            ));
        }

        let n = samples.len() as f64;
        let mean = samples.iter().sum::<f64>() / n;
        let stdev = if samples.len() > 1 {
            let var = samples.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / (n - 1.0);
            var.sqrt()
        } else {
            0.0
        };

        Ok(Self {
            mean,
            stdev,
            min: samples.iter().copied().fold(f64::INFINITY, f64::min),
            max: samples.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            sample_count: samples.len(),
        })
    }
}

// =============================================================================
// Measurements
// =============================================================================

/// Timing of one calibration run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationOptions {
    pub duration: Duration,
    pub interval: Duration,
    pub warm_up: Duration,
    pub tdp_watts: f64,
}

impl Default for CalibrationOptions {
    fn default() -> Self {
        Self {
            duration: Duration::from_secs(60),
            interval: Duration::from_millis(500),
            warm_up: Duration::from_secs(3),
            tdp_watts: DEFAULT_TDP_WATTS,
        }
    }
}

async fn collect(
    sampler: &mut dyn CpuSampler,
    duration: Duration,
    interval: Duration,
) -> CoreResult<Vec<f64>> {
    let interval = interval.max(Duration::from_millis(10));
    let windows = (duration.as_secs_f64() / interval.as_secs_f64()).floor().max(1.0) as usize;

    let mut samples = Vec::with_capacity(windows);
    for _ in 0..windows {
        samples.push(sampler.sample(interval).await?);
    }
    Ok(samples)
}

/// Samples the host at rest.
pub async fn measure_idle(
    sampler: &mut dyn CpuSampler,
    duration: Duration,
    interval: Duration,
) -> CoreResult<UtilizationStats> {
    tracing::info!("Measuring idle utilization for {:?}", duration);
    let samples = collect(sampler, duration, interval).await?;
    UtilizationStats::from_samples(&samples)
}

/// Saturates every logical CPU, waits `warm_up`, then samples.
///
/// The load threads are stopped and joined on every exit path.
pub async fn measure_max(
    sampler: &mut dyn CpuSampler,
    duration: Duration,
    interval: Duration,
    warm_up: Duration,
) -> CoreResult<UtilizationStats> {
    let load = BusyLoad::start(num_cpus::get());
    tracing::info!(
        "Measuring full-load utilization with {} worker(s) for {:?}",
        load.workers(),
        duration
    );

    tokio::time::sleep(warm_up).await;
    let samples = collect(sampler, duration, interval).await;
    drop(load);

    UtilizationStats::from_samples(&samples?)
}

/// Converts utilization at both operating points to watts.
pub fn derive_constants(
    idle_cpu_percent: f64,
    max_cpu_percent: f64,
    tdp_watts: f64,
) -> CoreResult<CalibrationConstants> {
    if !(tdp_watts.is_finite() && tdp_watts > 0.0) {
        return Err(CoreError::InvalidCalibration(format!(
            "TDP must be positive, got {tdp_watts}"
        )));
    }
    // P = TDP * (cpu / 100)
    let idle = tdp_watts * idle_cpu_percent / 100.0;
    let max = tdp_watts * max_cpu_percent / 100.0;
    CalibrationConstants::new(round3(idle), round3(max))
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Outcome of a calibration run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationReport {
    pub hostname: String,
    pub measured_at: DateTime<Utc>,
    pub logical_cpus: usize,
    pub tdp_watts: f64,
    pub idle: UtilizationStats,
    pub max: UtilizationStats,
    pub constants: CalibrationConstants,
}

/// Full procedure: idle, then max, then constants.
pub async fn calibrate(
    sampler: &mut dyn CpuSampler,
    options: CalibrationOptions,
) -> CoreResult<CalibrationReport> {
    let idle = measure_idle(sampler, options.duration, options.interval).await?;
    let max = measure_max(sampler, options.duration, options.interval, options.warm_up).await?;
    let constants = derive_constants(idle.mean, max.mean, options.tdp_watts)?;

    let hostname = hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    tracing::info!(
        "Calibrated {}: idle {:.3} W, max {:.3} W",
        hostname,
        constants.idle_power_watts(),
        constants.max_power_watts()
    );

    Ok(CalibrationReport {
        hostname,
        measured_at: Utc::now(),
        logical_cpus: num_cpus::get(),
        tdp_watts: options.tdp_watts,
        idle,
        max,
        constants,
    })
}

// =============================================================================
// Synthetic Load
// =============================================================================

/// Busy-loop threads, one per requested worker.
struct BusyLoad {
    stop: Arc<AtomicBool>,
    handles: Vec<JoinHandle<()>>,
}

impl BusyLoad {
    fn start(workers: usize) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let handles = (0..workers.max(1))
            .map(|_| {
                let stop = Arc::clone(&stop);
                std::thread::spawn(move || {
                    let mut x: u64 = 0x9E37_79B9_7F4A_7C15;
                    while !stop.load(Ordering::Relaxed) {
                        for _ in 0..10_000 {
                            x = std::hint::black_box(
                                x.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1),
                            );
                        }
                    }
                })
            })
            .collect();
        Self { stop, handles }
    }

    fn workers(&self) -> usize {
        self.handles.len()
    }
}

impl Drop for BusyLoad {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}
