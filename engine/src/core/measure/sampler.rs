//! CPU utilization samplers and the cancellable sampling task.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::core::power::clamp_cpu_percent;
use crate::core::{CoreError, CoreResult};

// =============================================================================
// Sampler Contract
// =============================================================================

/// Measures CPU utilization over one window.
#[async_trait]
pub trait CpuSampler: Send {
    /// Blocks for `window` and returns utilization in [0, 100].
    async fn sample(&mut self, window: Duration) -> CoreResult<f64>;
}

/// Creates samplers for the host and for individual processes.
pub trait SamplerSource: Send + Sync {
    fn host(&self) -> Box<dyn CpuSampler>;

    fn process(&self, pid: u32) -> Box<dyn CpuSampler>;
}

/// `/proc`-backed samplers.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcSamplerSource;

impl SamplerSource for ProcSamplerSource {
    fn host(&self) -> Box<dyn CpuSampler> {
        Box::new(HostCpuSampler)
    }

    fn process(&self, pid: u32) -> Box<dyn CpuSampler> {
        Box::new(ProcessCpuSampler::new(pid))
    }
}

// =============================================================================
// Host Sampler
// =============================================================================

/// Aggregate jiffies from the `cpu` line of `/proc/stat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CpuTimes {
    busy: u64,
    total: u64,
}

/// Whole-host utilization from `/proc/stat`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostCpuSampler;

#[async_trait]
impl CpuSampler for HostCpuSampler {
    async fn sample(&mut self, window: Duration) -> CoreResult<f64> {
        let start = read_host_times().await?;
        tokio::time::sleep(window).await;
        let end = read_host_times().await?;
        Ok(host_utilization(start, end))
    }
}

#[cfg(target_os = "linux")]
async fn read_host_times() -> CoreResult<CpuTimes> {
    let stat = tokio::fs::read_to_string("/proc/stat")
        .await
        .map_err(|e| CoreError::SamplingDegraded(format!("cannot read /proc/stat: {e}")))?;
    parse_host_times(&stat)
}

#[cfg(not(target_os = "linux"))]
async fn read_host_times() -> CoreResult<CpuTimes> {
    Err(CoreError::SamplingDegraded(
        "host CPU sampling requires /proc".to_string(),
    ))
}

/// Parses the first `cpu` line. iowait counts as idle; guest time is already
/// included in user time.
fn parse_host_times(stat: &str) -> CoreResult<CpuTimes> {
    let line = stat
        .lines()
        .find(|l| l.starts_with("cpu "))
        .ok_or_else(|| CoreError::SamplingDegraded("no aggregate cpu line".to_string()))?;

    let fields: Vec<u64> = line
        .split_whitespace()
        .skip(1)
        .take(8)
        .map(|v| v.parse::<u64>())
        .collect::<Result<_, _>>()
        .map_err(|e| CoreError::SamplingDegraded(format!("malformed cpu line: {e}")))?;

    if fields.len() < 4 {
        return Err(CoreError::SamplingDegraded(
            "cpu line has too few fields".to_string(),
        ));
    }

    let total: u64 = fields.iter().sum();
    let idle = fields[3] + fields.get(4).copied().unwrap_or(0);
    Ok(CpuTimes {
        busy: total.saturating_sub(idle),
        total,
    })
}

fn host_utilization(start: CpuTimes, end: CpuTimes) -> f64 {
    let total = end.total.saturating_sub(start.total);
    if total == 0 {
        return 0.0;
    }
    let busy = end.busy.saturating_sub(start.busy);
    clamp_cpu_percent(busy as f64 / total as f64 * 100.0)
}

// =============================================================================
// Process Sampler
// =============================================================================

/// Kernel clock ticks per second for `/proc/<pid>/stat` times.
const USER_HZ: f64 = 100.0;

/// Utilization of one process, normalized by the logical CPU count so a
/// process saturating every core reads 100.
#[derive(Debug, Clone, Copy)]
pub struct ProcessCpuSampler {
    pid: u32,
    cpus: usize,
}

impl ProcessCpuSampler {
    pub fn new(pid: u32) -> Self {
        Self {
            pid,
            cpus: num_cpus::get().max(1),
        }
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }
}

#[async_trait]
impl CpuSampler for ProcessCpuSampler {
    async fn sample(&mut self, window: Duration) -> CoreResult<f64> {
        let start = read_process_ticks(self.pid).await?;
        let started = tokio::time::Instant::now();
        tokio::time::sleep(window).await;
        let end = read_process_ticks(self.pid).await?;
        Ok(process_utilization(
            end.saturating_sub(start),
            started.elapsed(),
            self.cpus,
        ))
    }
}

#[cfg(target_os = "linux")]
async fn read_process_ticks(pid: u32) -> CoreResult<u64> {
    let path = format!("/proc/{pid}/stat");
    let stat = tokio::fs::read_to_string(&path)
        .await
        .map_err(|e| CoreError::SamplingDegraded(format!("cannot read {path}: {e}")))?;
    parse_process_ticks(&stat)
}

#[cfg(not(target_os = "linux"))]
async fn read_process_ticks(_pid: u32) -> CoreResult<u64> {
    Err(CoreError::SamplingDegraded(
        "per-process CPU sampling requires /proc".to_string(),
    ))
}

/// `utime + stime` from a `/proc/<pid>/stat` line. The command name may
/// contain spaces and parentheses, so fields are counted after the last `)`.
fn parse_process_ticks(stat: &str) -> CoreResult<u64> {
    let rest = stat
        .rfind(')')
        .map(|i| &stat[i + 1..])
        .ok_or_else(|| CoreError::SamplingDegraded("malformed process stat".to_string()))?;

    // rest starts at field 3 (state); utime and stime are fields 14 and 15
    let fields: Vec<&str> = rest.split_whitespace().collect();
    let tick = |i: usize| -> CoreResult<u64> {
        fields
            .get(i)
            .and_then(|v| v.parse::<u64>().ok())
            .ok_or_else(|| CoreError::SamplingDegraded("missing process cpu times".to_string()))
    };
    Ok(tick(11)? + tick(12)?)
}

fn process_utilization(ticks: u64, elapsed: Duration, cpus: usize) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        return 0.0;
    }
    let cpu_secs = ticks as f64 / USER_HZ;
    clamp_cpu_percent(cpu_secs / secs / cpus.max(1) as f64 * 100.0)
}

// =============================================================================
// Sampling Task
// =============================================================================

/// Background sampling loop bound to one encode.
///
/// The task owns its readings; `stop` cancels it and hands them back. A
/// window still in progress when `stop` arrives is discarded. Dropping the
/// handle without stopping aborts the task.
pub struct SamplingTask {
    stop_tx: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<Vec<f64>>>,
}

impl SamplingTask {
    pub fn start(mut sampler: Box<dyn CpuSampler>, interval: Duration) -> Self {
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            let mut samples = Vec::new();
            loop {
                tokio::select! {
                    biased;
                    _ = &mut stop_rx => break,
                    reading = sampler.sample(interval) => match reading {
                        Ok(value) => samples.push(clamp_cpu_percent(value)),
                        Err(e) => {
                            tracing::warn!(
                                "CPU sampling stopped after {} sample(s): {}",
                                samples.len(),
                                e
                            );
                            break;
                        }
                    },
                }
            }
            samples
        });

        Self {
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        }
    }

    /// Cancels sampling and returns every completed reading.
    pub async fn stop(mut self) -> Vec<f64> {
        if let Some(tx) = self.stop_tx.take() {
            // The loop may already have ended on a sampler error
            let _ = tx.send(());
        }
        let Some(handle) = self.handle.take() else {
            return Vec::new();
        };
        match handle.await {
            Ok(samples) => samples,
            Err(e) => {
                tracing::warn!("CPU sampling task failed: {}", e);
                Vec::new()
            }
        }
    }
}

impl Drop for SamplingTask {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
