//! ecoencode CLI - compare the energy cost of complexity-adapted encodes.

use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use ecoencode_lib::core::analysis::ComplexityAnalyzer;
use ecoencode_lib::core::calibration::{calibrate, CalibrationOptions, DEFAULT_TDP_WATTS};
use ecoencode_lib::core::compare::{analyze_source, ComparativeAggregator, ExecutionPolicy};
use ecoencode_lib::core::ffmpeg::{detect_ffmpeg, FFmpegEncoder, FFmpegRunner};
use ecoencode_lib::core::fs::atomic_write_json_pretty;
use ecoencode_lib::core::measure::{HostCpuSampler, ProcSamplerSource};
use ecoencode_lib::core::selection::{
    BaselineSelector, ModelBasedSelector, ParameterSelector, RuleBasedSelector,
};
use ecoencode_lib::core::settings::{AppSettings, SettingsManager};
use ecoencode_lib::core::{clamp_score, ComplexityScore, ResultRecord};

static LOG_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "ecoencode")]
#[command(version)]
#[command(about = "Measure and reduce the energy cost of video transcoding")]
struct Cli {
    /// Directory holding settings.json
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    /// Also write daily-rolling logs to this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// Debug-level logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Encode a source with baseline, rule-based and model-based profiles and compare energy
    Compare {
        input: PathBuf,

        /// Where the three encoded outputs are written
        #[arg(long, default_value = "ecoencode-output")]
        output_dir: PathBuf,

        /// Print the result record as JSON
        #[arg(long)]
        json: bool,

        /// Write the result record to this file
        #[arg(long)]
        save: Option<PathBuf>,

        /// Run the three encodes at once with per-process CPU sampling
        #[arg(long)]
        concurrent: bool,
    },
    /// Probe a source and print its complexity score
    Analyze {
        input: PathBuf,

        #[arg(long)]
        json: bool,
    },
    /// Show the profiles each strategy picks for a complexity score
    Select {
        /// Combined complexity, 0-10
        complexity: f64,

        #[arg(long)]
        edge: Option<f64>,

        #[arg(long)]
        motion: Option<f64>,
    },
    /// Measure idle and full-load utilization and derive power constants
    Calibrate {
        /// Seconds spent sampling each operating point
        #[arg(long, default_value_t = 60)]
        duration: u64,

        /// TDP estimate for this host in watts
        #[arg(long, default_value_t = DEFAULT_TDP_WATTS)]
        tdp: f64,

        /// Store the derived constants in settings.json
        #[arg(long)]
        save: bool,
    },
    /// Inspect or reset persisted settings
    Settings {
        #[command(subcommand)]
        action: Option<SettingsAction>,
    },
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum SettingsAction {
    /// Print effective settings (file plus environment overrides)
    Show,
    /// Print the settings file location
    Path,
    /// Delete the settings file
    Reset,
}

fn init_logging(log_dir: Option<&Path>, verbose: bool) {
    use tracing_subscriber::prelude::*;

    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    let env_filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());

    // Results go to stdout; logs stay on stderr.
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(cfg!(debug_assertions));

    let file_layer = log_dir.map(|dir| {
        let _ = std::fs::create_dir_all(dir);
        let file_appender = tracing_appender::rolling::daily(dir, "ecoencode.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        let _ = LOG_GUARD.set(guard);
        tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
    });

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer);

    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ecoencode")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_dir.as_deref(), cli.verbose);

    let manager = SettingsManager::new(cli.config_dir.clone().unwrap_or_else(default_config_dir));
    let mut settings = manager.load();
    settings.apply_env_overrides();

    match cli.command {
        Command::Compare {
            input,
            output_dir,
            json,
            save,
            concurrent,
        } => {
            let record = run_compare(&settings, &input, &output_dir, concurrent).await?;
            if let Some(path) = save {
                atomic_write_json_pretty(&path, &record)
                    .with_context(|| format!("writing {}", path.display()))?;
                info!("Result record saved to {}", path.display());
            }
            if json {
                println!("{}", serde_json::to_string_pretty(&record)?);
            } else {
                print_summary(&record);
            }
        }
        Command::Analyze { input, json } => {
            let info = detect_ffmpeg(settings.encoder.ffmpeg_path.as_deref())?;
            let ffmpeg = FFmpegRunner::new(info);
            let analyzer = ComplexityAnalyzer::new(settings.analysis.clone());
            let (metadata, complexity) = analyze_source(&ffmpeg, &analyzer, &input).await?;
            if json {
                let value = serde_json::json!({ "metadata": metadata, "complexity": complexity });
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else {
                println!(
                    "{}x{} @ {:.2} fps, {:.1} s, {} ({:.2} MB)",
                    metadata.width,
                    metadata.height,
                    metadata.fps,
                    metadata.duration_sec,
                    metadata.codec,
                    metadata.size_mb()
                );
                print_complexity(&complexity);
            }
        }
        Command::Select {
            complexity,
            edge,
            motion,
        } => {
            let combined = clamp_score(complexity);
            let score = ComplexityScore {
                edge_component: clamp_score(edge.unwrap_or(combined)),
                motion_component: clamp_score(motion.unwrap_or(combined)),
                combined,
                edge_density: 0.0,
                motion_ratio: 0.0,
            };
            let baseline = BaselineSelector::new(settings.baseline_profile());
            let rules = RuleBasedSelector::default();
            let model =
                ModelBasedSelector::load(settings.model.artifact_path.as_deref(), rules.clone());
            let selectors: [&dyn ParameterSelector; 3] = [&baseline, &rules, &model];
            for selector in selectors {
                let profile = selector.select(&score);
                println!("{:<12} {}  {}", selector.name(), profile, profile.rationale);
            }
        }
        Command::Calibrate {
            duration,
            tdp,
            save,
        } => {
            let options = CalibrationOptions {
                duration: Duration::from_secs(duration.max(1)),
                tdp_watts: tdp,
                ..CalibrationOptions::default()
            };
            let report = calibrate(&mut HostCpuSampler, options).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);

            if save {
                // Persist against the file contents, not the env-overridden view
                let mut stored = manager.load();
                stored.calibration.idle_power_watts = report.constants.idle_power_watts();
                stored.calibration.max_power_watts = report.constants.max_power_watts();
                manager.save(&stored)?;
                println!("Saved to {}", manager.settings_path().display());
            }
        }
        Command::Settings { action } => match action.unwrap_or(SettingsAction::Show) {
            SettingsAction::Show => println!("{}", serde_json::to_string_pretty(&settings)?),
            SettingsAction::Path => println!("{}", manager.settings_path().display()),
            SettingsAction::Reset => {
                let defaults = manager.reset()?;
                println!("{}", serde_json::to_string_pretty(&defaults)?);
            }
        },
    }

    Ok(())
}

async fn run_compare(
    settings: &AppSettings,
    input: &Path,
    output_dir: &Path,
    concurrent: bool,
) -> anyhow::Result<ResultRecord> {
    let info = detect_ffmpeg(settings.encoder.ffmpeg_path.as_deref())?;
    info!("Using FFmpeg {} at {}", info.version, info.ffmpeg_path.display());

    let encoder = Arc::new(FFmpegEncoder::new(&info.ffmpeg_path, settings.encoder.threads));
    let ffmpeg = FFmpegRunner::new(info);
    let analyzer = ComplexityAnalyzer::new(settings.analysis.clone());

    let mut aggregator =
        ComparativeAggregator::from_settings(settings, encoder, Arc::new(ProcSamplerSource))?;
    if concurrent {
        aggregator = aggregator.with_policy(ExecutionPolicy::Concurrent);
    }

    let record = aggregator
        .compare(&ffmpeg, &analyzer, input, output_dir)
        .await
        .with_context(|| format!("comparing {}", input.display()))?;
    Ok(record)
}

fn print_complexity(c: &ComplexityScore) {
    println!(
        "complexity {:.2}/10 (edge {:.2}, motion {:.2}; raw edge density {:.4}, motion {:.4})",
        c.combined, c.edge_component, c.motion_component, c.edge_density, c.motion_ratio
    );
}

fn print_summary(record: &ResultRecord) {
    println!("{} [{}]", record.source.display(), record.id);
    print_complexity(&record.complexity);
    println!();

    let m = &record.measurements;
    let rows = [
        (&m.baseline, None, record.co2_grams.baseline),
        (
            &m.rule_based,
            Some((record.savings_percent.rule_based, record.storage_delta_bytes.rule_based)),
            record.co2_grams.rule_based,
        ),
        (
            &m.model_based,
            Some((record.savings_percent.model_based, record.storage_delta_bytes.model_based)),
            record.co2_grams.model_based,
        ),
    ];

    for (measurement, delta, co2) in rows {
        let p = &measurement.profile;
        print!(
            "{:<24} {:<9} crf {:>2}  {:>7.2} s  {:>5.1}% cpu  {:>6.2} W  {:>9.2} J  {:>8.4} g CO2  {:>10} B",
            p.mode.to_string(),
            p.preset.name(),
            p.quality_factor,
            measurement.duration_seconds,
            measurement.avg_cpu_percent,
            measurement.power_watts,
            measurement.energy_joules,
            co2,
            measurement.output_size_bytes
        );
        match delta {
            Some((savings, storage)) => println!("  {:+.1}% energy, {:+} B", savings, storage),
            None => println!(),
        }
    }

    println!();
    println!("best: {}", record.best_mode);
    for annotation in &record.annotations {
        println!("note: {}", serde_json::to_string(annotation).unwrap_or_default());
    }
}
