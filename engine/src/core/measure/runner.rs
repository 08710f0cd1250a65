//! Measured transcode runner.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::AsyncReadExt;

use super::{EncodeJob, Encoder, SamplerSource, SamplingScope, SamplingTask};
use crate::core::fs::{remove_if_exists, validate_source_path};
use crate::core::power::{clamp_cpu_percent, CalibrationConstants};
use crate::core::process::stderr_tail;
use crate::core::settings::MeasurementSettings;
use crate::core::{CoreError, CoreResult, EncodingProfile, Measurement};

const WARM_UP_TIMEOUT: Duration = Duration::from_secs(10);
const STDERR_TAIL_BYTES: usize = 800;

/// Timing knobs for one runner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunnerOptions {
    pub baseline_window: Duration,
    pub sample_interval: Duration,
    pub encode_timeout: Duration,
    pub warm_up: bool,
    pub scope: SamplingScope,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self::from_settings(&MeasurementSettings::default())
    }
}

impl RunnerOptions {
    pub fn from_settings(settings: &MeasurementSettings) -> Self {
        Self {
            baseline_window: settings.baseline_window(),
            sample_interval: settings.sample_interval(),
            encode_timeout: settings.encode_timeout(),
            warm_up: settings.warm_up,
            scope: SamplingScope::Host,
        }
    }

    pub fn with_scope(mut self, scope: SamplingScope) -> Self {
        self.scope = scope;
        self
    }
}

/// Executes encodes while sampling CPU and prices them with the power model.
#[derive(Clone)]
pub struct MeasuredTranscodeRunner {
    encoder: Arc<dyn Encoder>,
    samplers: Arc<dyn SamplerSource>,
    constants: CalibrationConstants,
    options: RunnerOptions,
}

impl MeasuredTranscodeRunner {
    pub fn new(
        encoder: Arc<dyn Encoder>,
        samplers: Arc<dyn SamplerSource>,
        constants: CalibrationConstants,
        options: RunnerOptions,
    ) -> Self {
        Self {
            encoder,
            samplers,
            constants,
            options,
        }
    }

    pub fn options(&self) -> &RunnerOptions {
        &self.options
    }

    pub fn constants(&self) -> &CalibrationConstants {
        &self.constants
    }

    pub fn with_options(mut self, options: RunnerOptions) -> Self {
        self.options = options;
        self
    }

    /// Samples ambient host load over the baseline window.
    ///
    /// The value is diagnostic only; a sampler failure is logged and reads 0.
    pub async fn sample_baseline(&self) -> f64 {
        let mut sampler = self.samplers.host();
        match sampler.sample(self.options.baseline_window).await {
            Ok(value) => clamp_cpu_percent(value),
            Err(e) => {
                tracing::warn!("Baseline CPU sample unavailable: {}", e);
                0.0
            }
        }
    }

    /// Measures one encode, taking a fresh baseline sample first.
    pub async fn run(&self, job: &EncodeJob) -> CoreResult<Measurement> {
        self.run_with_baseline(job, None).await
    }

    /// Measures one encode. `baseline_cpu` supplies an ambient sample taken
    /// earlier; `None` samples it now, right before the encode starts.
    ///
    /// Any encoder failure removes the partial output and returns an error;
    /// no partial measurement is produced.
    pub async fn run_with_baseline(
        &self,
        job: &EncodeJob,
        baseline_cpu: Option<f64>,
    ) -> CoreResult<Measurement> {
        let input = validate_source_path(&job.input)?;
        if let Some(parent) = job.output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        if self.options.warm_up {
            self.warm_up(&input).await;
        }

        let baseline_cpu = match baseline_cpu {
            Some(value) => clamp_cpu_percent(value),
            None => self.sample_baseline().await,
        };

        let profile = &job.profile;
        tracing::info!(
            mode = %profile.mode,
            codec = %profile.codec,
            preset = %profile.preset,
            crf = profile.quality_factor,
            "Starting measured encode of {}",
            input.display()
        );

        let mut cmd = self.encoder.encode_command(job);
        cmd.stdout(Stdio::null()).stderr(Stdio::piped());

        let started = Instant::now();
        let mut child = cmd.spawn().map_err(|e| {
            CoreError::EncodeFailed(format!("failed to start {}: {}", self.encoder.name(), e))
        })?;

        let stderr_reader = child.stderr.take().map(|mut stderr| {
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let _ = stderr.read_to_end(&mut buf).await;
                buf
            })
        });

        let sampler = match (self.options.scope, child.id()) {
            (SamplingScope::Process, Some(pid)) => self.samplers.process(pid),
            (SamplingScope::Process, None) => {
                tracing::debug!("Encoder exited before per-process sampling could attach");
                self.samplers.host()
            }
            (SamplingScope::Host, _) => self.samplers.host(),
        };
        let sampling = SamplingTask::start(sampler, self.options.sample_interval);

        let status = match tokio::time::timeout(self.options.encode_timeout, child.wait()).await {
            Ok(status) => status,
            Err(_) => {
                if let Err(e) = child.kill().await {
                    tracing::warn!("Failed to kill timed-out encoder: {}", e);
                }
                sampling.stop().await;
                remove_if_exists(&job.output);
                tracing::warn!(
                    mode = %profile.mode,
                    "Encode exceeded {:?}, killed",
                    self.options.encode_timeout
                );
                return Err(CoreError::EncodeTimeout {
                    timeout_secs: timeout_secs_rounded_up(self.options.encode_timeout),
                });
            }
        };

        let elapsed = started.elapsed();
        let samples = sampling.stop().await;
        let stderr = match stderr_reader {
            Some(reader) => reader.await.unwrap_or_default(),
            None => Vec::new(),
        };

        let status = match status {
            Ok(status) => status,
            Err(e) => {
                remove_if_exists(&job.output);
                return Err(CoreError::EncodeFailed(format!(
                    "failed to wait for {}: {}",
                    self.encoder.name(),
                    e
                )));
            }
        };

        if !status.success() {
            remove_if_exists(&job.output);
            return Err(CoreError::EncodeFailed(format!(
                "{} exited with {}: {}",
                self.encoder.name(),
                status,
                stderr_tail(&stderr, STDERR_TAIL_BYTES)
            )));
        }

        let output_size_bytes = match tokio::fs::metadata(&job.output).await {
            Ok(meta) if meta.is_file() && meta.len() > 0 => meta.len(),
            _ => {
                remove_if_exists(&job.output);
                return Err(CoreError::EncodeFailed(format!(
                    "{} produced no output at {}",
                    self.encoder.name(),
                    job.output.display()
                )));
            }
        };

        let measurement = build_measurement(
            profile.clone(),
            elapsed,
            baseline_cpu,
            &samples,
            job.output.clone(),
            output_size_bytes,
            &self.constants,
        );

        if measurement.sampling_degraded {
            tracing::warn!(
                mode = %profile.mode,
                "No CPU samples collected; assuming 100% utilization"
            );
        }
        tracing::info!(
            mode = %profile.mode,
            duration_s = measurement.duration_seconds,
            avg_cpu = measurement.avg_cpu_percent,
            power_w = measurement.power_watts,
            energy_j = measurement.energy_joules,
            samples = measurement.sample_count,
            "Measured encode finished"
        );

        Ok(measurement)
    }

    async fn warm_up(&self, input: &std::path::Path) {
        let Some(mut cmd) = self.encoder.warm_up_command(input) else {
            return;
        };
        cmd.stdout(Stdio::null()).stderr(Stdio::null());

        match tokio::time::timeout(WARM_UP_TIMEOUT, cmd.status()).await {
            Ok(Ok(status)) if status.success() => {}
            Ok(Ok(status)) => tracing::warn!("Warm-up run exited with {}", status),
            Ok(Err(e)) => tracing::warn!("Warm-up run failed to start: {}", e),
            Err(_) => tracing::warn!("Warm-up run exceeded {:?}", WARM_UP_TIMEOUT),
        }
    }
}

/// Whole seconds for reporting a timeout, never rounding a ceiling down to 0.
fn timeout_secs_rounded_up(timeout: Duration) -> u64 {
    let secs = timeout.as_secs();
    if timeout.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}

/// Mean of the readings, or a synthetic 100% when there are none.
///
/// Returns `(mean, degraded)`.
pub fn mean_cpu_percent(samples: &[f64]) -> (f64, bool) {
    if samples.is_empty() {
        return (100.0, true);
    }
    let sum: f64 = samples.iter().map(|s| clamp_cpu_percent(*s)).sum();
    (clamp_cpu_percent(sum / samples.len() as f64), false)
}

/// Prices one completed encode.
pub fn build_measurement(
    profile: EncodingProfile,
    duration: Duration,
    baseline_cpu_percent: f64,
    samples: &[f64],
    output_path: PathBuf,
    output_size_bytes: u64,
    constants: &CalibrationConstants,
) -> Measurement {
    let (avg_cpu_percent, sampling_degraded) = mean_cpu_percent(samples);
    let duration_seconds = duration.as_secs_f64();
    let power_watts = constants.power(avg_cpu_percent);

    Measurement {
        profile,
        duration_seconds,
        baseline_cpu_percent: clamp_cpu_percent(baseline_cpu_percent),
        avg_cpu_percent,
        power_watts,
        energy_joules: power_watts * duration_seconds,
        output_size_bytes,
        output_path,
        sample_count: samples.len(),
        sampling_degraded,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::measure::CpuSampler;
    use crate::core::{Codec, Preset, ProfileMode};
    use async_trait::async_trait;
    use tempfile::TempDir;
    use tokio::process::Command;

    // =========================================================================
    // Test doubles
    // =========================================================================

    /// Runs `sh -c <script> sh <input> <output>`.
    struct ShellEncoder {
        script: &'static str,
    }

    impl Encoder for ShellEncoder {
        fn name(&self) -> &str {
            "sh"
        }

        fn encode_command(&self, job: &EncodeJob) -> Command {
            let mut cmd = Command::new("sh");
            cmd.arg("-c")
                .arg(self.script)
                .arg("sh")
                .arg(&job.input)
                .arg(&job.output)
                .kill_on_drop(true);
            cmd
        }
    }

    struct FixedSampler(f64);

    #[async_trait]
    impl CpuSampler for FixedSampler {
        async fn sample(&mut self, window: Duration) -> CoreResult<f64> {
            tokio::time::sleep(window).await;
            Ok(self.0)
        }
    }

    struct FixedSource {
        host: f64,
        process: f64,
    }

    impl SamplerSource for FixedSource {
        fn host(&self) -> Box<dyn CpuSampler> {
            Box::new(FixedSampler(self.host))
        }

        fn process(&self, _pid: u32) -> Box<dyn CpuSampler> {
            Box::new(FixedSampler(self.process))
        }
    }

    fn constants() -> CalibrationConstants {
        CalibrationConstants::new(1.5, 27.0).unwrap()
    }

    fn options(interval_ms: u64, timeout_ms: u64) -> RunnerOptions {
        RunnerOptions {
            baseline_window: Duration::from_millis(10),
            sample_interval: Duration::from_millis(interval_ms),
            encode_timeout: Duration::from_millis(timeout_ms),
            warm_up: false,
            scope: SamplingScope::Host,
        }
    }

    fn runner(script: &'static str, options: RunnerOptions) -> MeasuredTranscodeRunner {
        MeasuredTranscodeRunner::new(
            Arc::new(ShellEncoder { script }),
            Arc::new(FixedSource {
                host: 50.0,
                process: 25.0,
            }),
            constants(),
            options,
        )
    }

    fn job(dir: &TempDir) -> EncodeJob {
        let input = dir.path().join("clip.mp4");
        std::fs::write(&input, b"source bytes").unwrap();
        EncodeJob {
            input,
            output: dir.path().join("out").join("rule_based_clip.mp4"),
            profile: EncodingProfile::new(
                Codec::Libx264,
                Preset::Ultrafast,
                28,
                ProfileMode::RuleBased,
            ),
        }
    }

    // =========================================================================
    // Pure computation
    // =========================================================================

    #[test]
    fn half_load_ten_seconds_is_142_5_joules() {
        let m = build_measurement(
            EncodingProfile::new(Codec::Libx264, Preset::Medium, 23, ProfileMode::Baseline),
            Duration::from_secs(10),
            3.0,
            &[40.0, 60.0, 50.0],
            PathBuf::from("out.mp4"),
            1024,
            &constants(),
        );
        assert_eq!(m.avg_cpu_percent, 50.0);
        assert!((m.power_watts - 14.25).abs() < 1e-12);
        assert!((m.energy_joules - 142.5).abs() < 1e-9);
        assert!(!m.sampling_degraded);
        assert_eq!(m.sample_count, 3);
    }

    #[test]
    fn identical_samples_give_identical_energy() {
        let samples = [31.5, 77.25, 12.0, 99.0];
        let build = || {
            build_measurement(
                EncodingProfile::new(Codec::Libx264, Preset::Fast, 22, ProfileMode::RuleBased),
                Duration::from_millis(7_340),
                0.0,
                &samples,
                PathBuf::from("out.mp4"),
                1,
                &constants(),
            )
        };
        assert_eq!(build().energy_joules, build().energy_joules);
    }

    #[test]
    fn zero_samples_fall_back_to_full_load() {
        assert_eq!(mean_cpu_percent(&[]), (100.0, true));
        assert_eq!(mean_cpu_percent(&[-5.0, 105.0]), (50.0, false));
    }

    // =========================================================================
    // Subprocess runs
    // =========================================================================

    #[cfg(unix)]
    #[tokio::test]
    async fn successful_encode_is_measured() {
        let dir = TempDir::new().unwrap();
        let job = job(&dir);
        let runner = runner("sleep 0.3; printf encoded > \"$2\"", options(20, 10_000));

        let m = runner.run(&job).await.unwrap();
        assert!(m.sample_count > 0);
        assert!(!m.sampling_degraded);
        assert_eq!(m.avg_cpu_percent, 50.0);
        assert_eq!(m.baseline_cpu_percent, 50.0);
        assert!((m.power_watts - 14.25).abs() < 1e-12);
        assert!(m.duration_seconds >= 0.3);
        assert!((m.energy_joules - m.power_watts * m.duration_seconds).abs() < 1e-9);
        assert_eq!(m.output_size_bytes, 7);
        assert_eq!(m.output_path, job.output);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn per_process_scope_uses_process_sampler() {
        let dir = TempDir::new().unwrap();
        let job = job(&dir);
        let runner = runner(
            "sleep 0.3; printf encoded > \"$2\"",
            options(20, 10_000).with_scope(SamplingScope::Process),
        );

        let m = runner.run_with_baseline(&job, Some(7.0)).await.unwrap();
        assert_eq!(m.avg_cpu_percent, 25.0);
        assert_eq!(m.baseline_cpu_percent, 7.0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn short_encode_without_samples_is_degraded() {
        let dir = TempDir::new().unwrap();
        let job = job(&dir);
        let runner = runner("printf x > \"$2\"", options(60_000, 10_000));

        let m = runner.run(&job).await.unwrap();
        assert_eq!(m.sample_count, 0);
        assert!(m.sampling_degraded);
        assert_eq!(m.avg_cpu_percent, 100.0);
        assert_eq!(m.power_watts, 27.0);
        assert!(m.energy_joules > 0.0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_is_encode_failed() {
        let dir = TempDir::new().unwrap();
        let job = job(&dir);
        let runner = runner(
            "printf partial > \"$2\"; echo 'Unknown encoder' >&2; exit 3",
            options(20, 10_000),
        );

        let err = runner.run(&job).await.unwrap_err();
        match err {
            CoreError::EncodeFailed(msg) => assert!(msg.contains("Unknown encoder")),
            other => panic!("expected EncodeFailed, got {other:?}"),
        }
        assert!(!job.output.exists(), "partial output must be removed");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn missing_output_is_encode_failed() {
        let dir = TempDir::new().unwrap();
        let job = job(&dir);
        let runner = runner("exit 0", options(20, 10_000));

        assert!(matches!(
            runner.run(&job).await,
            Err(CoreError::EncodeFailed(_))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn slow_encode_is_killed_with_timeout() {
        let dir = TempDir::new().unwrap();
        let job = job(&dir);
        let runner = runner("printf partial > \"$2\"; sleep 30", options(20, 300));

        let started = Instant::now();
        let err = runner.run(&job).await.unwrap_err();
        assert!(matches!(err, CoreError::EncodeTimeout { timeout_secs: 1 }));
        assert!(started.elapsed() < Duration::from_secs(10));
        assert!(!job.output.exists());
    }

    #[test]
    fn timeout_seconds_round_up() {
        assert_eq!(timeout_secs_rounded_up(Duration::from_millis(300)), 1);
        assert_eq!(timeout_secs_rounded_up(Duration::from_secs(30)), 30);
        assert_eq!(timeout_secs_rounded_up(Duration::from_millis(30_001)), 31);
    }

    #[tokio::test]
    async fn missing_input_is_invalid() {
        let dir = TempDir::new().unwrap();
        let mut job = job(&dir);
        job.input = dir.path().join("missing.mp4");
        let runner = runner("exit 0", options(20, 1_000));

        assert!(matches!(
            runner.run(&job).await,
            Err(CoreError::InvalidInput(_))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn unstartable_encoder_is_encode_failed() {
        struct MissingBinary;

        impl Encoder for MissingBinary {
            fn name(&self) -> &str {
                "missing"
            }

            fn encode_command(&self, _job: &EncodeJob) -> Command {
                Command::new("/nonexistent/encoder-binary")
            }
        }

        let dir = TempDir::new().unwrap();
        let job = job(&dir);
        let runner = MeasuredTranscodeRunner::new(
            Arc::new(MissingBinary),
            Arc::new(FixedSource {
                host: 0.0,
                process: 0.0,
            }),
            constants(),
            options(20, 1_000),
        );

        assert!(matches!(
            runner.run(&job).await,
            Err(CoreError::EncodeFailed(_))
        ));
    }
}
