//! Settings Persistence System
//!
//! Provides persistent pipeline settings with:
//! - Atomic file writes (temp file + rename)
//! - Schema validation with defaults
//! - Environment overrides applied once at process start
//!
//! Storage location: {config_dir}/settings.json

use serde::{Deserialize, Serialize};
use std::fs;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{info, warn};

use crate::core::compare::ExecutionPolicy;
use crate::core::power::CalibrationConstants;
use crate::core::{Codec, CoreResult, EncodingProfile, Preset, ProfileMode};

/// Settings schema version for migration support
pub const SETTINGS_VERSION: u32 = 1;

/// Settings file name
pub const SETTINGS_FILE: &str = "settings.json";

/// Lock file name (advisory lock to prevent concurrent writers)
pub const SETTINGS_LOCK_FILE: &str = "settings.json.lock";

/// Environment variable overriding the idle power endpoint
pub const ENV_IDLE_POWER: &str = "ECOENCODE_IDLE_POWER_W";
/// Environment variable overriding the max power endpoint
pub const ENV_MAX_POWER: &str = "ECOENCODE_MAX_POWER_W";
/// Environment variable overriding grid carbon intensity
pub const ENV_CARBON_INTENSITY: &str = "ECOENCODE_CARBON_INTENSITY";
/// Environment variable pointing at the trained model artifact
pub const ENV_MODEL_PATH: &str = "ECOENCODE_MODEL_PATH";

/// Pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AppSettings {
    /// Schema version for migrations
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub calibration: CalibrationSettings,

    #[serde(default)]
    pub emissions: EmissionsSettings,

    #[serde(default)]
    pub measurement: MeasurementSettings,

    #[serde(default)]
    pub encoder: EncoderSettings,

    #[serde(default)]
    pub analysis: AnalysisSettings,

    #[serde(default)]
    pub model: ModelSettings,
}

fn default_version() -> u32 {
    SETTINGS_VERSION
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            version: SETTINGS_VERSION,
            calibration: CalibrationSettings::default(),
            emissions: EmissionsSettings::default(),
            measurement: MeasurementSettings::default(),
            encoder: EncoderSettings::default(),
            analysis: AnalysisSettings::default(),
            model: ModelSettings::default(),
        }
    }
}

impl AppSettings {
    /// Normalizes and clamps settings so persisted state is always valid.
    ///
    /// Bad values are corrected instead of rejected so an old or hand-edited
    /// file never blocks a run. Calibration is left untouched: it is host
    /// specific and is validated by [`AppSettings::calibration_constants`].
    pub fn normalize(&mut self) {
        self.version = SETTINGS_VERSION;

        self.emissions.carbon_intensity_g_per_kwh =
            clamp_f64(self.emissions.carbon_intensity_g_per_kwh, 0.0, 2_000.0);

        self.measurement.baseline_window_ms = self.measurement.baseline_window_ms.clamp(100, 5_000);
        self.measurement.sample_interval_ms = self.measurement.sample_interval_ms.clamp(50, 5_000);
        self.measurement.encode_timeout_secs =
            self.measurement.encode_timeout_secs.clamp(1, 86_400);
        self.measurement.execution = normalize_enum(
            &self.measurement.execution,
            &["sequential", "concurrent"],
            default_execution(),
        );

        self.encoder.threads = self.encoder.threads.clamp(1, 64);
        if Codec::from_name(&self.encoder.baseline_codec).is_none() {
            self.encoder.baseline_codec = default_baseline_codec();
        }
        self.encoder.baseline_preset = normalize_enum(
            &self.encoder.baseline_preset,
            &Preset::ALL.map(|p| p.name()),
            default_baseline_preset(),
        );
        self.encoder.baseline_crf = self.encoder.baseline_crf.min(51);

        self.analysis.normalize();
    }

    /// Applies process-environment overrides.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Applies overrides from an arbitrary key lookup, then re-normalizes.
    pub fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let parse = |key: &str| -> Option<f64> {
            let raw = lookup(key)?;
            match raw.trim().parse::<f64>() {
                Ok(v) => Some(v),
                Err(_) => {
                    warn!("Ignoring non-numeric {}={:?}", key, raw);
                    None
                }
            }
        };

        if let Some(v) = parse(ENV_IDLE_POWER) {
            self.calibration.idle_power_watts = v;
        }
        if let Some(v) = parse(ENV_MAX_POWER) {
            self.calibration.max_power_watts = v;
        }
        if let Some(v) = parse(ENV_CARBON_INTENSITY) {
            self.emissions.carbon_intensity_g_per_kwh = v;
        }
        if let Some(path) = lookup(ENV_MODEL_PATH) {
            let trimmed = path.trim();
            if !trimmed.is_empty() {
                self.model.artifact_path = Some(PathBuf::from(trimmed));
            }
        }

        self.normalize();
    }

    /// Validated calibration constants.
    pub fn calibration_constants(&self) -> CoreResult<CalibrationConstants> {
        CalibrationConstants::new(
            self.calibration.idle_power_watts,
            self.calibration.max_power_watts,
        )
    }

    /// The fixed, complexity-independent baseline profile.
    pub fn baseline_profile(&self) -> EncodingProfile {
        let codec = Codec::from_name(&self.encoder.baseline_codec).unwrap_or(Codec::Libx264);
        let preset = Preset::from_name(&self.encoder.baseline_preset).unwrap_or(Preset::Medium);
        EncodingProfile::new(codec, preset, self.encoder.baseline_crf, ProfileMode::Baseline)
            .with_rationale("None (baseline)")
    }
}

fn clamp_f64(value: f64, min: f64, max: f64) -> f64 {
    if !value.is_finite() {
        return min;
    }
    value.clamp(min, max)
}

fn normalize_enum(value: &str, allowed: &[&str], fallback: String) -> String {
    if allowed.iter().any(|v| v.eq_ignore_ascii_case(value)) {
        value.to_ascii_lowercase()
    } else {
        fallback
    }
}

/// Host power endpoints
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationSettings {
    #[serde(default = "default_idle_power")]
    pub idle_power_watts: f64,

    #[serde(default = "default_max_power")]
    pub max_power_watts: f64,
}

fn default_idle_power() -> f64 {
    1.5
}

fn default_max_power() -> f64 {
    27.0
}

impl Default for CalibrationSettings {
    fn default() -> Self {
        Self {
            idle_power_watts: default_idle_power(),
            max_power_watts: default_max_power(),
        }
    }
}

/// Emission factor settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EmissionsSettings {
    /// Grams of CO2 per kWh (0.71 tCO2/MWh grid average by default)
    #[serde(default = "default_carbon_intensity")]
    pub carbon_intensity_g_per_kwh: f64,
}

fn default_carbon_intensity() -> f64 {
    710.0
}

impl Default for EmissionsSettings {
    fn default() -> Self {
        Self {
            carbon_intensity_g_per_kwh: default_carbon_intensity(),
        }
    }
}

/// Measured-run settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MeasurementSettings {
    /// Ambient CPU sample window taken before each encode
    #[serde(default = "default_baseline_window_ms")]
    pub baseline_window_ms: u64,

    /// CPU sampling interval during the encode
    #[serde(default = "default_sample_interval_ms")]
    pub sample_interval_ms: u64,

    /// Encodes running longer than this are killed
    #[serde(default = "default_encode_timeout_secs")]
    pub encode_timeout_secs: u64,

    /// Run a short untimed decode before each encode
    #[serde(default = "default_true")]
    pub warm_up: bool,

    /// "sequential" or "concurrent"
    #[serde(default = "default_execution")]
    pub execution: String,
}

fn default_baseline_window_ms() -> u64 {
    1_000
}

fn default_sample_interval_ms() -> u64 {
    500
}

fn default_encode_timeout_secs() -> u64 {
    3_600
}

fn default_true() -> bool {
    true
}

fn default_execution() -> String {
    "sequential".to_string()
}

impl Default for MeasurementSettings {
    fn default() -> Self {
        Self {
            baseline_window_ms: default_baseline_window_ms(),
            sample_interval_ms: default_sample_interval_ms(),
            encode_timeout_secs: default_encode_timeout_secs(),
            warm_up: true,
            execution: default_execution(),
        }
    }
}

impl MeasurementSettings {
    pub fn baseline_window(&self) -> Duration {
        Duration::from_millis(self.baseline_window_ms)
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }

    pub fn encode_timeout(&self) -> Duration {
        Duration::from_secs(self.encode_timeout_secs)
    }

    pub fn execution_policy(&self) -> ExecutionPolicy {
        if self.execution.eq_ignore_ascii_case("concurrent") {
            ExecutionPolicy::Concurrent
        } else {
            ExecutionPolicy::Sequential
        }
    }
}

/// External encoder settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EncoderSettings {
    /// Explicit ffmpeg binary; detected from PATH when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ffmpeg_path: Option<PathBuf>,

    /// Encoder thread cap passed as `-threads`
    #[serde(default = "default_threads")]
    pub threads: u32,

    #[serde(default = "default_baseline_codec")]
    pub baseline_codec: String,

    #[serde(default = "default_baseline_preset")]
    pub baseline_preset: String,

    #[serde(default = "default_baseline_crf")]
    pub baseline_crf: u8,
}

fn default_threads() -> u32 {
    4
}

fn default_baseline_codec() -> String {
    "libx264".to_string()
}

fn default_baseline_preset() -> String {
    "medium".to_string()
}

fn default_baseline_crf() -> u8 {
    23
}

impl Default for EncoderSettings {
    fn default() -> Self {
        Self {
            ffmpeg_path: None,
            threads: default_threads(),
            baseline_codec: default_baseline_codec(),
            baseline_preset: default_baseline_preset(),
            baseline_crf: default_baseline_crf(),
        }
    }
}

/// Complexity analysis constants.
///
/// The full-scale values map a raw ratio onto 10; typical edge density sits
/// around 0.05-0.15 and normalized motion around 0.01-0.10.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisSettings {
    #[serde(default = "default_max_sampled_frames")]
    pub max_sampled_frames: u32,

    /// Frames are scaled to this width before analysis
    #[serde(default = "default_analysis_width")]
    pub analysis_width: u32,

    /// Sobel magnitude above which a pixel counts as an edge
    #[serde(default = "default_edge_threshold")]
    pub edge_threshold: f64,

    #[serde(default = "default_edge_full_scale")]
    pub edge_full_scale: f64,

    #[serde(default = "default_motion_full_scale")]
    pub motion_full_scale: f64,

    #[serde(default = "default_edge_weight")]
    pub edge_weight: f64,

    #[serde(default = "default_motion_weight")]
    pub motion_weight: f64,
}

fn default_max_sampled_frames() -> u32 {
    20
}

fn default_analysis_width() -> u32 {
    320
}

fn default_edge_threshold() -> f64 {
    100.0
}

fn default_edge_full_scale() -> f64 {
    0.15
}

fn default_motion_full_scale() -> f64 {
    0.10
}

fn default_edge_weight() -> f64 {
    0.6
}

fn default_motion_weight() -> f64 {
    0.4
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            max_sampled_frames: default_max_sampled_frames(),
            analysis_width: default_analysis_width(),
            edge_threshold: default_edge_threshold(),
            edge_full_scale: default_edge_full_scale(),
            motion_full_scale: default_motion_full_scale(),
            edge_weight: default_edge_weight(),
            motion_weight: default_motion_weight(),
        }
    }
}

impl AnalysisSettings {
    pub fn normalize(&mut self) {
        self.max_sampled_frames = self.max_sampled_frames.clamp(2, 500);
        self.analysis_width = self.analysis_width.clamp(32, 3_840) & !1;
        self.edge_threshold = clamp_f64(self.edge_threshold, 1.0, 1_500.0);

        if !(self.edge_full_scale.is_finite() && self.edge_full_scale > 0.0) {
            self.edge_full_scale = default_edge_full_scale();
        }
        if !(self.motion_full_scale.is_finite() && self.motion_full_scale > 0.0) {
            self.motion_full_scale = default_motion_full_scale();
        }

        let edge = clamp_f64(self.edge_weight, 0.0, 1.0);
        let motion = clamp_f64(self.motion_weight, 0.0, 1.0);
        let total = edge + motion;
        if total <= 0.0 {
            self.edge_weight = default_edge_weight();
            self.motion_weight = default_motion_weight();
        } else {
            self.edge_weight = edge / total;
            self.motion_weight = motion / total;
        }
    }
}

/// Trained model artifact location
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ModelSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_path: Option<PathBuf>,
}

/// Settings manager for loading, saving, and resetting settings
pub struct SettingsManager {
    settings_path: PathBuf,
}

impl SettingsManager {
    /// Create a new settings manager rooted at the given config directory
    pub fn new(config_dir: PathBuf) -> Self {
        Self {
            settings_path: config_dir.join(SETTINGS_FILE),
        }
    }

    fn lock_path(&self) -> PathBuf {
        self.settings_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(SETTINGS_LOCK_FILE)
    }

    fn with_lock<T>(&self, exclusive: bool, op: impl FnOnce() -> CoreResult<T>) -> CoreResult<T> {
        // Ensure parent directory exists so the lock file can be created.
        if let Some(parent) = self.settings_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let lock_file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(self.lock_path())?;

        if exclusive {
            fs2::FileExt::lock_exclusive(&lock_file)?;
        } else {
            fs2::FileExt::lock_shared(&lock_file)?;
        }

        let result = op();

        if let Err(e) = fs2::FileExt::unlock(&lock_file) {
            warn!("Failed to unlock settings lock file: {}", e);
        }

        result
    }

    /// Get the settings file path
    pub fn settings_path(&self) -> &PathBuf {
        &self.settings_path
    }

    /// Load settings from disk, returning defaults if the file is missing or unreadable
    pub fn load(&self) -> AppSettings {
        let result = self.with_lock(false, || {
            if !self.settings_path.exists() {
                info!("Settings file not found, using defaults");
                return Ok(AppSettings::default());
            }

            let content = fs::read_to_string(&self.settings_path)?;
            let mut settings = serde_json::from_str::<AppSettings>(&content)?;

            if settings.version < SETTINGS_VERSION {
                info!(
                    "Migrating settings from version {} to {}",
                    settings.version, SETTINGS_VERSION
                );
                settings = self.migrate(settings);
            }

            settings.normalize();
            Ok(settings)
        });

        match result {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Failed to load settings, using defaults: {}", e);
                AppSettings::default()
            }
        }
    }

    /// Save settings to disk using an atomic write
    pub fn save(&self, settings: &AppSettings) -> CoreResult<AppSettings> {
        self.with_lock(true, || {
            let mut normalized = settings.clone();
            normalized.normalize();

            crate::core::fs::atomic_write_json_pretty(&self.settings_path, &normalized)?;

            info!("Settings saved to {:?}", self.settings_path);
            Ok(normalized)
        })
    }

    /// Reset settings to defaults and delete the settings file
    pub fn reset(&self) -> CoreResult<AppSettings> {
        self.with_lock(true, || {
            if self.settings_path.exists() {
                fs::remove_file(&self.settings_path)?;
                info!("Settings file deleted");
            }
            Ok(AppSettings::default())
        })
    }

    fn migrate(&self, mut settings: AppSettings) -> AppSettings {
        settings.version = SETTINGS_VERSION;
        settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::CoreError;
    use std::collections::HashMap;
    use tempfile::TempDir;

    // ============================================================
    // Defaults & Normalization
    // ============================================================

    #[test]
    fn test_default_settings() {
        let settings = AppSettings::default();
        assert_eq!(settings.version, SETTINGS_VERSION);
        assert_eq!(settings.calibration.idle_power_watts, 1.5);
        assert_eq!(settings.calibration.max_power_watts, 27.0);
        assert_eq!(settings.emissions.carbon_intensity_g_per_kwh, 710.0);
        assert_eq!(settings.measurement.execution, "sequential");
        assert_eq!(settings.encoder.threads, 4);
        assert!(settings.model.artifact_path.is_none());
    }

    #[test]
    fn test_baseline_profile_is_medium_crf23() {
        let profile = AppSettings::default().baseline_profile();
        assert_eq!(profile.codec, Codec::Libx264);
        assert_eq!(profile.preset, Preset::Medium);
        assert_eq!(profile.quality_factor, 23);
        assert_eq!(profile.mode, ProfileMode::Baseline);
    }

    #[test]
    fn test_normalize_keeps_inverted_calibration() {
        let mut settings = AppSettings::default();
        settings.calibration.idle_power_watts = 30.0;
        settings.calibration.max_power_watts = 10.0;
        settings.normalize();
        assert_eq!(settings.calibration.idle_power_watts, 30.0);
        assert_eq!(settings.calibration.max_power_watts, 10.0);
        assert!(matches!(
            settings.calibration_constants(),
            Err(CoreError::InvalidCalibration(_))
        ));
    }

    #[test]
    fn test_normalize_clamps_measurement_values() {
        let mut settings = AppSettings::default();
        settings.measurement.sample_interval_ms = 1;
        settings.measurement.baseline_window_ms = 60_000;
        settings.measurement.encode_timeout_secs = 0;
        settings.measurement.execution = "parallel".into();
        settings.normalize();

        assert_eq!(settings.measurement.sample_interval_ms, 50);
        assert_eq!(settings.measurement.baseline_window_ms, 5_000);
        assert_eq!(settings.measurement.encode_timeout_secs, 1);
        assert_eq!(settings.measurement.execution, "sequential");
    }

    #[test]
    fn test_normalize_encoder_values() {
        let mut settings = AppSettings::default();
        settings.encoder.baseline_codec = "prores".into();
        settings.encoder.baseline_preset = "Placebo".into();
        settings.encoder.baseline_crf = 90;
        settings.encoder.threads = 0;
        settings.normalize();

        assert_eq!(settings.encoder.baseline_codec, "libx264");
        assert_eq!(settings.encoder.baseline_preset, "medium");
        assert_eq!(settings.encoder.baseline_crf, 51);
        assert_eq!(settings.encoder.threads, 1);
    }

    #[test]
    fn test_analysis_weights_are_renormalized() {
        let mut analysis = AnalysisSettings {
            edge_weight: 3.0,
            motion_weight: 1.0,
            ..Default::default()
        };
        analysis.normalize();
        // 3.0 clamps to 1.0 before renormalizing.
        assert!((analysis.edge_weight - 0.5).abs() < 1e-9);
        assert!((analysis.motion_weight - 0.5).abs() < 1e-9);

        let mut zeroed = AnalysisSettings {
            edge_weight: 0.0,
            motion_weight: 0.0,
            analysis_width: 321,
            ..Default::default()
        };
        zeroed.normalize();
        assert_eq!(zeroed.edge_weight, 0.6);
        assert_eq!(zeroed.analysis_width, 320);
    }

    #[test]
    fn test_execution_policy_parsing() {
        let mut m = MeasurementSettings::default();
        assert_eq!(m.execution_policy(), ExecutionPolicy::Sequential);
        m.execution = "concurrent".into();
        assert_eq!(m.execution_policy(), ExecutionPolicy::Concurrent);
    }

    // ============================================================
    // Overrides
    // ============================================================

    #[test]
    fn test_overrides_apply_numeric_values() {
        let env: HashMap<&str, &str> = [
            (ENV_IDLE_POWER, "2.0"),
            (ENV_MAX_POWER, "40"),
            (ENV_CARBON_INTENSITY, "450.5"),
            (ENV_MODEL_PATH, "/models/preset.json"),
        ]
        .into_iter()
        .collect();

        let mut settings = AppSettings::default();
        settings.apply_overrides_from(|k| env.get(k).map(|v| v.to_string()));

        let constants = settings.calibration_constants().unwrap();
        assert_eq!(constants.idle_power_watts(), 2.0);
        assert_eq!(constants.max_power_watts(), 40.0);
        assert_eq!(settings.emissions.carbon_intensity_g_per_kwh, 450.5);
        assert_eq!(
            settings.model.artifact_path,
            Some(PathBuf::from("/models/preset.json"))
        );
    }

    #[test]
    fn test_inverted_override_is_rejected() {
        let env: HashMap<&str, &str> = [(ENV_IDLE_POWER, "40"), (ENV_MAX_POWER, "30")]
            .into_iter()
            .collect();

        let mut settings = AppSettings::default();
        settings.apply_overrides_from(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(settings.calibration.idle_power_watts, 40.0);
        assert!(matches!(
            settings.calibration_constants(),
            Err(CoreError::InvalidCalibration(_))
        ));
    }

    #[test]
    fn test_overrides_ignore_garbage() {
        let mut settings = AppSettings::default();
        settings.apply_overrides_from(|k| (k == ENV_IDLE_POWER).then(|| "lots".to_string()));
        assert_eq!(settings.calibration.idle_power_watts, 1.5);
    }

    // ============================================================
    // Persistence
    // ============================================================

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let manager = SettingsManager::new(temp_dir.path().to_path_buf());
        assert_eq!(manager.load(), AppSettings::default());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let manager = SettingsManager::new(temp_dir.path().to_path_buf());

        let mut settings = AppSettings::default();
        settings.calibration.idle_power_watts = 3.25;
        settings.calibration.max_power_watts = 61.0;
        settings.model.artifact_path = Some(PathBuf::from("/tmp/model.json"));

        let saved = manager.save(&settings).unwrap();
        let loaded = manager.load();
        assert_eq!(saved, loaded);
        assert_eq!(loaded.calibration.max_power_watts, 61.0);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join(SETTINGS_FILE),
            r#"{
                "version": 1,
                "calibration": { "idlePowerWatts": 0.8 },
                "measurement": { "execution": "CONCURRENT" }
            }"#,
        )
        .unwrap();

        let manager = SettingsManager::new(temp_dir.path().to_path_buf());
        let settings = manager.load();

        assert_eq!(settings.calibration.idle_power_watts, 0.8);
        assert_eq!(settings.calibration.max_power_watts, 27.0);
        assert_eq!(settings.measurement.execution, "concurrent");
        assert_eq!(settings.encoder.baseline_crf, 23);
    }

    #[test]
    fn test_corrupted_file_falls_back_to_defaults() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join(SETTINGS_FILE), "{ not json").unwrap();
        let manager = SettingsManager::new(temp_dir.path().to_path_buf());
        assert_eq!(manager.load(), AppSettings::default());
    }

    #[test]
    fn test_reset_deletes_file() {
        let temp_dir = TempDir::new().unwrap();
        let manager = SettingsManager::new(temp_dir.path().to_path_buf());
        manager.save(&AppSettings::default()).unwrap();
        assert!(manager.settings_path().exists());

        let reset = manager.reset().unwrap();
        assert_eq!(reset, AppSettings::default());
        assert!(!manager.settings_path().exists());
    }
}
