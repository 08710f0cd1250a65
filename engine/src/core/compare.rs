//! Comparative Aggregator
//!
//! Measures the same source three times (baseline, rule-based, model-based)
//! and derives energy savings, emissions and storage deltas.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::analysis::ComplexityAnalyzer;
use crate::core::ffmpeg::FFmpegRunner;
use crate::core::fs::{output_path_for, remove_if_exists, validate_source_path};
use crate::core::measure::{
    EncodeJob, Encoder, MeasuredTranscodeRunner, RunnerOptions, SamplerSource, SamplingScope,
};
use crate::core::power::co2_grams;
use crate::core::selection::{
    BaselineSelector, ModelBasedSelector, ParameterSelector, RuleBasedSelector,
};
use crate::core::settings::AppSettings;
use crate::core::{
    Annotation, ByMode, ByOptimizedMode, ComplexityScore, CoreResult, EncodingProfile,
    Measurement, ProfileMode, ResultRecord, VideoMetadata,
};

// =============================================================================
// Execution Policy
// =============================================================================

/// How the three measured runs are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionPolicy {
    /// One encode at a time with host-level sampling
    #[default]
    Sequential,
    /// All three encodes at once with per-process sampling
    Concurrent,
}

impl ExecutionPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionPolicy::Sequential => "sequential",
            ExecutionPolicy::Concurrent => "concurrent",
        }
    }
}

impl fmt::Display for ExecutionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Aggregator
// =============================================================================

/// Runs the comparative pipeline for one source per call.
pub struct ComparativeAggregator {
    runner: MeasuredTranscodeRunner,
    baseline: BaselineSelector,
    rule_based: RuleBasedSelector,
    model_based: ModelBasedSelector,
    carbon_intensity_g_per_kwh: f64,
    policy: ExecutionPolicy,
}

impl ComparativeAggregator {
    pub fn new(
        runner: MeasuredTranscodeRunner,
        baseline: BaselineSelector,
        rule_based: RuleBasedSelector,
        model_based: ModelBasedSelector,
        carbon_intensity_g_per_kwh: f64,
    ) -> Self {
        Self {
            runner,
            baseline,
            rule_based,
            model_based,
            carbon_intensity_g_per_kwh,
            policy: ExecutionPolicy::Sequential,
        }
    }

    /// Wires selectors, runner and constants from loaded settings.
    ///
    /// Fails only on invalid calibration; a missing model degrades.
    pub fn from_settings(
        settings: &AppSettings,
        encoder: Arc<dyn Encoder>,
        samplers: Arc<dyn SamplerSource>,
    ) -> CoreResult<Self> {
        let constants = settings.calibration_constants()?;
        let runner = MeasuredTranscodeRunner::new(
            encoder,
            samplers,
            constants,
            RunnerOptions::from_settings(&settings.measurement),
        );
        let rule_based = RuleBasedSelector::default();
        let model_based =
            ModelBasedSelector::load(settings.model.artifact_path.as_deref(), rule_based.clone());

        Ok(Self::new(
            runner,
            BaselineSelector::new(settings.baseline_profile()),
            rule_based,
            model_based,
            settings.emissions.carbon_intensity_g_per_kwh,
        )
        .with_policy(settings.measurement.execution_policy()))
    }

    pub fn with_policy(mut self, policy: ExecutionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> ExecutionPolicy {
        self.policy
    }

    pub fn model_selector(&self) -> &ModelBasedSelector {
        &self.model_based
    }

    /// Profiles for all three modes.
    pub fn select_profiles(
        &self,
        complexity: &ComplexityScore,
        metadata: Option<&VideoMetadata>,
    ) -> ByMode<EncodingProfile> {
        ByMode {
            baseline: self.baseline.select_with(complexity, metadata),
            rule_based: self.rule_based.select_with(complexity, metadata),
            model_based: self.model_based.select_with(complexity, metadata),
        }
    }

    /// Full pipeline: probe, analyze, select, measure, aggregate.
    pub async fn compare(
        &self,
        ffmpeg: &FFmpegRunner,
        analyzer: &ComplexityAnalyzer,
        source: &Path,
        output_dir: &Path,
    ) -> CoreResult<ResultRecord> {
        let (metadata, complexity) = analyze_source(ffmpeg, analyzer, source).await?;
        self.compare_with_complexity(source, output_dir, complexity, Some(metadata))
            .await
    }

    /// Measures the three modes for an already analyzed source.
    ///
    /// Any failed encode fails the whole comparison; no partial record is
    /// returned.
    pub async fn compare_with_complexity(
        &self,
        source: &Path,
        output_dir: &Path,
        complexity: ComplexityScore,
        metadata: Option<VideoMetadata>,
    ) -> CoreResult<ResultRecord> {
        let source = validate_source_path(source)?;
        let profiles = self.select_profiles(&complexity, metadata.as_ref());

        tracing::info!(
            "Comparing {} at complexity {:.2} ({}): baseline [{}], rule [{}], model [{}]",
            source.display(),
            complexity.combined,
            self.policy,
            profiles.baseline,
            profiles.rule_based,
            profiles.model_based
        );

        let jobs = ByMode {
            baseline: job_for(&source, output_dir, profiles.baseline),
            rule_based: job_for(&source, output_dir, profiles.rule_based),
            model_based: job_for(&source, output_dir, profiles.model_based),
        };

        let measurements = match self.policy {
            ExecutionPolicy::Sequential => self.run_sequential(&jobs).await?,
            ExecutionPolicy::Concurrent => self.run_concurrent(&jobs).await?,
        };

        let model_reason = measurements
            .model_based
            .profile
            .mode
            .is_degraded()
            .then(|| {
                self.model_based
                    .unavailable_reason()
                    .unwrap_or("model prediction unusable")
                    .to_string()
            });

        let record = assemble_record(
            source,
            metadata,
            complexity,
            measurements,
            self.carbon_intensity_g_per_kwh,
            model_reason,
        );

        tracing::info!(
            "Comparison {} done: rule {:.1}% / model {:.1}% energy saved, best {}",
            record.id,
            record.savings_percent.rule_based,
            record.savings_percent.model_based,
            record.best_mode
        );

        Ok(record)
    }

    async fn run_sequential(&self, jobs: &ByMode<EncodeJob>) -> CoreResult<ByMode<Measurement>> {
        let baseline = self.runner.run(&jobs.baseline).await?;
        let rule_based = self.runner.run(&jobs.rule_based).await?;
        let model_based = self.runner.run(&jobs.model_based).await?;
        Ok(ByMode {
            baseline,
            rule_based,
            model_based,
        })
    }

    /// Overlapping encodes must not share a host sampling window, so every
    /// run samples its own process. The ambient sample is taken once, before
    /// any encode starts.
    async fn run_concurrent(&self, jobs: &ByMode<EncodeJob>) -> CoreResult<ByMode<Measurement>> {
        let options = self.runner.options().with_scope(SamplingScope::Process);
        let runner = self.runner.clone().with_options(options);
        let ambient = runner.sample_baseline().await;

        let joined = tokio::try_join!(
            runner.run_with_baseline(&jobs.baseline, Some(ambient)),
            runner.run_with_baseline(&jobs.rule_based, Some(ambient)),
            runner.run_with_baseline(&jobs.model_based, Some(ambient)),
        );
        // Siblings of a failed run are dropped mid-encode and leave partial files.
        let (baseline, rule_based, model_based) = match joined {
            Ok(measurements) => measurements,
            Err(e) => {
                for job in [&jobs.baseline, &jobs.rule_based, &jobs.model_based] {
                    remove_if_exists(&job.output);
                }
                return Err(e);
            }
        };
        Ok(ByMode {
            baseline,
            rule_based,
            model_based,
        })
    }
}

fn job_for(source: &Path, output_dir: &Path, profile: EncodingProfile) -> EncodeJob {
    EncodeJob {
        input: source.to_path_buf(),
        output: output_path_for(output_dir, profile.mode, source),
        profile,
    }
}

/// Probes a source, decodes its sampled frames and scores them.
pub async fn analyze_source(
    ffmpeg: &FFmpegRunner,
    analyzer: &ComplexityAnalyzer,
    source: &Path,
) -> CoreResult<(VideoMetadata, ComplexityScore)> {
    let source = validate_source_path(source)?;
    let metadata = ffmpeg.probe(&source).await?;
    let frames = ffmpeg
        .decode_gray_frames(&source, &metadata, analyzer.settings())
        .await?;

    let analyzer = analyzer.clone();
    let complexity = tokio::task::spawn_blocking(move || analyzer.analyze(&frames))
        .await
        .map_err(|e| crate::core::CoreError::Internal(format!("analysis task failed: {e}")))??;

    Ok((metadata, complexity))
}

// =============================================================================
// Derived Metrics
// =============================================================================

/// Relative energy reduction versus baseline, in percent.
///
/// Heavier modes yield negative values. A zero-energy baseline yields 0.
pub fn savings_percent(baseline_joules: f64, mode_joules: f64) -> f64 {
    if baseline_joules <= 0.0 {
        return 0.0;
    }
    (baseline_joules - mode_joules) / baseline_joules * 100.0
}

/// Bytes saved versus baseline; negative when the mode's output is larger.
pub fn storage_delta_bytes(baseline_bytes: u64, mode_bytes: u64) -> i64 {
    (i128::from(baseline_bytes) - i128::from(mode_bytes))
        .clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64
}

/// Lower-energy optimized mode; ties go to the model-based run.
pub fn best_mode(rule_based: &Measurement, model_based: &Measurement) -> ProfileMode {
    if model_based.energy_joules <= rule_based.energy_joules {
        model_based.profile.mode
    } else {
        rule_based.profile.mode
    }
}

/// Builds the record from three completed measurements.
pub fn assemble_record(
    source: PathBuf,
    metadata: Option<VideoMetadata>,
    complexity: ComplexityScore,
    measurements: ByMode<Measurement>,
    carbon_intensity_g_per_kwh: f64,
    model_unavailable_reason: Option<String>,
) -> ResultRecord {
    let b = &measurements.baseline;
    let r = &measurements.rule_based;
    let m = &measurements.model_based;

    let co2 = ByMode {
        baseline: co2_grams(b.energy_joules, carbon_intensity_g_per_kwh),
        rule_based: co2_grams(r.energy_joules, carbon_intensity_g_per_kwh),
        model_based: co2_grams(m.energy_joules, carbon_intensity_g_per_kwh),
    };

    let mut annotations = Vec::new();
    if let Some(reason) = model_unavailable_reason {
        annotations.push(Annotation::ModelUnavailable { reason });
    }
    for measurement in [b, r, m] {
        if measurement.sampling_degraded {
            annotations.push(Annotation::SamplingDegraded {
                mode: measurement.profile.mode,
            });
        }
    }

    ResultRecord {
        id: ulid::Ulid::new().to_string(),
        created_at: chrono::Utc::now(),
        source,
        metadata,
        complexity,
        savings_percent: ByOptimizedMode {
            rule_based: savings_percent(b.energy_joules, r.energy_joules),
            model_based: savings_percent(b.energy_joules, m.energy_joules),
        },
        energy_saved_joules: ByOptimizedMode {
            rule_based: b.energy_joules - r.energy_joules,
            model_based: b.energy_joules - m.energy_joules,
        },
        co2_saved_grams: ByOptimizedMode {
            rule_based: co2.baseline - co2.rule_based,
            model_based: co2.baseline - co2.model_based,
        },
        co2_grams: co2,
        storage_delta_bytes: ByOptimizedMode {
            rule_based: storage_delta_bytes(b.output_size_bytes, r.output_size_bytes),
            model_based: storage_delta_bytes(b.output_size_bytes, m.output_size_bytes),
        },
        best_mode: best_mode(r, m),
        annotations,
        measurements,
    }
}
