//! ecoencode Core Type Definitions
//!
//! Request-scoped value objects shared by the analyzer, selectors,
//! measured runner and aggregator.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// ID Types
// =============================================================================

/// Result record unique identifier (ULID)
pub type RecordId = String;

// =============================================================================
// Encoder Vocabulary
// =============================================================================

/// Video codecs supported by the external encoder.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Codec {
    Libx264,
    Libx265,
}

impl Codec {
    pub const ALL: [Codec; 2] = [Codec::Libx264, Codec::Libx265];

    /// Encoder name as passed to `-c:v`.
    pub fn ffmpeg_name(&self) -> &'static str {
        match self {
            Codec::Libx264 => "libx264",
            Codec::Libx265 => "libx265",
        }
    }

    /// Parses an encoder name, accepting common aliases.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "libx264" | "h264" | "x264" | "avc" => Some(Codec::Libx264),
            "libx265" | "h265" | "x265" | "hevc" => Some(Codec::Libx265),
            _ => None,
        }
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.ffmpeg_name())
    }
}

/// x264/x265 speed presets, ordered fastest to slowest.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    Ultrafast,
    Superfast,
    Veryfast,
    Faster,
    Fast,
    Medium,
    Slow,
    Slower,
    Veryslow,
}

impl Preset {
    pub const ALL: [Preset; 9] = [
        Preset::Ultrafast,
        Preset::Superfast,
        Preset::Veryfast,
        Preset::Faster,
        Preset::Fast,
        Preset::Medium,
        Preset::Slow,
        Preset::Slower,
        Preset::Veryslow,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Preset::Ultrafast => "ultrafast",
            Preset::Superfast => "superfast",
            Preset::Veryfast => "veryfast",
            Preset::Faster => "faster",
            Preset::Fast => "fast",
            Preset::Medium => "medium",
            Preset::Slow => "slow",
            Preset::Slower => "slower",
            Preset::Veryslow => "veryslow",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|p| p.name().eq_ignore_ascii_case(name))
    }

    /// Position in the fastest-to-slowest ordering.
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// Maps a (possibly fractional or out-of-range) index to the nearest preset.
    pub fn from_index_clamped(index: f64) -> Self {
        let last = (Self::ALL.len() - 1) as f64;
        let idx = if index.is_finite() {
            index.round().clamp(0.0, last)
        } else if index > 0.0 {
            last
        } else {
            0.0
        };
        Self::ALL[idx as usize]
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Lowest valid CRF for 8-bit x264/x265.
pub const MIN_QUALITY_FACTOR: u8 = 0;
/// Highest valid CRF for 8-bit x264/x265.
pub const MAX_QUALITY_FACTOR: u8 = 51;

/// Rounds and clamps a quality factor into the encoder's valid CRF range.
pub fn clamp_quality_factor(value: f64) -> u8 {
    if value.is_nan() {
        return MIN_QUALITY_FACTOR;
    }
    value
        .round()
        .clamp(MIN_QUALITY_FACTOR as f64, MAX_QUALITY_FACTOR as f64) as u8
}

// =============================================================================
// Encoding Profile
// =============================================================================

/// Which strategy produced a profile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileMode {
    /// Fixed, complexity-independent profile.
    Baseline,
    RuleBased,
    ModelBased,
    /// Model-based request served by the rule table because the model was unavailable.
    ModelBasedDegraded,
}

impl ProfileMode {
    /// Stable lowercase label, also used as the output file prefix.
    pub fn label(&self) -> &'static str {
        match self {
            ProfileMode::Baseline => "baseline",
            ProfileMode::RuleBased => "rule_based",
            ProfileMode::ModelBased | ProfileMode::ModelBasedDegraded => "model_based",
        }
    }

    pub fn is_model_based(&self) -> bool {
        matches!(
            self,
            ProfileMode::ModelBased | ProfileMode::ModelBasedDegraded
        )
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, ProfileMode::ModelBasedDegraded)
    }
}

impl fmt::Display for ProfileMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProfileMode::ModelBasedDegraded => f.write_str("model_based (degraded)"),
            other => f.write_str(other.label()),
        }
    }
}

/// Encoder parameters for one transcoding mode.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodingProfile {
    pub codec: Codec,
    pub preset: Preset,
    /// CRF value (0-51, lower is better quality)
    pub quality_factor: u8,
    pub mode: ProfileMode,
    /// Human-readable explanation of why these parameters were chosen
    pub rationale: String,
}

impl EncodingProfile {
    pub fn new(codec: Codec, preset: Preset, quality_factor: u8, mode: ProfileMode) -> Self {
        Self {
            codec,
            preset,
            quality_factor: quality_factor.min(MAX_QUALITY_FACTOR),
            mode,
            rationale: String::new(),
        }
    }

    pub fn with_rationale(mut self, rationale: impl Into<String>) -> Self {
        self.rationale = rationale.into();
        self
    }

    /// True when codec, preset and quality factor all match, ignoring mode.
    pub fn same_parameters(&self, other: &EncodingProfile) -> bool {
        self.codec == other.codec
            && self.preset == other.preset
            && self.quality_factor == other.quality_factor
    }
}

impl fmt::Display for EncodingProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} crf={} [{}]",
            self.codec, self.preset, self.quality_factor, self.mode
        )
    }
}

// =============================================================================
// Complexity
// =============================================================================

/// Visual complexity of one source video, on a 0-10 scale.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplexityScore {
    /// Spatial detail (edge density) mapped to 0-10
    pub edge_component: f64,
    /// Inter-frame motion mapped to 0-10
    pub motion_component: f64,
    /// Weighted blend of both components, 0-10
    pub combined: f64,
    /// Raw average fraction of edge pixels
    pub edge_density: f64,
    /// Raw average normalized frame delta (0-1)
    pub motion_ratio: f64,
}

impl ComplexityScore {
    /// Builds a score from component values, clamping every field into range.
    pub fn from_components(
        edge_component: f64,
        motion_component: f64,
        edge_weight: f64,
        motion_weight: f64,
    ) -> Self {
        let edge = clamp_score(edge_component);
        let motion = clamp_score(motion_component);
        Self {
            edge_component: edge,
            motion_component: motion,
            combined: clamp_score(edge * edge_weight + motion * motion_weight),
            edge_density: 0.0,
            motion_ratio: 0.0,
        }
    }

    pub fn with_raw(mut self, edge_density: f64, motion_ratio: f64) -> Self {
        self.edge_density = edge_density;
        self.motion_ratio = motion_ratio;
        self
    }
}

/// Clamps a score into [0, 10], mapping NaN to 0.
pub fn clamp_score(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 10.0)
}

/// Probed source video properties.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoMetadata {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    /// Frame count if the container reports one
    pub frame_count: Option<u64>,
    pub duration_sec: f64,
    pub size_bytes: u64,
    /// Source codec name (e.g., "h264")
    pub codec: String,
}

impl VideoMetadata {
    /// Container-reported frame count, or an estimate from duration and fps.
    pub fn estimated_frame_count(&self) -> u64 {
        match self.frame_count {
            Some(n) if n > 0 => n,
            _ if self.duration_sec > 0.0 && self.fps > 0.0 => {
                (self.duration_sec * self.fps).round() as u64
            }
            _ => 0,
        }
    }

    pub fn size_mb(&self) -> f64 {
        self.size_bytes as f64 / (1024.0 * 1024.0)
    }
}

// =============================================================================
// Measurement & Result
// =============================================================================

/// Observed cost of encoding one source with one profile.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Measurement {
    pub profile: EncodingProfile,
    /// Wall-clock encode duration
    pub duration_seconds: f64,
    /// Ambient host load sampled before the encode (diagnostic only)
    pub baseline_cpu_percent: f64,
    /// Mean utilization during the encode, 0-100
    pub avg_cpu_percent: f64,
    pub power_watts: f64,
    /// `power_watts * duration_seconds`
    pub energy_joules: f64,
    pub output_size_bytes: u64,
    pub output_path: PathBuf,
    /// Number of CPU readings collected during the encode
    pub sample_count: usize,
    /// True when no readings were collected and the synthetic 100% sample was used
    pub sampling_degraded: bool,
}

/// One value per comparative mode.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ByMode<T> {
    pub baseline: T,
    pub rule_based: T,
    pub model_based: T,
}

/// One value per optimized mode (relative to baseline).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ByOptimizedMode<T> {
    pub rule_based: T,
    pub model_based: T,
}

/// Informational condition attached to a result.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Annotation {
    /// No real model-based comparison happened; the rule table stood in.
    ModelUnavailable { reason: String },
    /// A run collected no CPU samples and used the synthetic fallback.
    SamplingDegraded { mode: ProfileMode },
}

/// Outcome of one comparative request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultRecord {
    pub id: RecordId,
    pub created_at: DateTime<Utc>,
    pub source: PathBuf,
    pub metadata: Option<VideoMetadata>,
    pub complexity: ComplexityScore,
    pub measurements: ByMode<Measurement>,
    pub savings_percent: ByOptimizedMode<f64>,
    pub energy_saved_joules: ByOptimizedMode<f64>,
    pub co2_grams: ByMode<f64>,
    pub co2_saved_grams: ByOptimizedMode<f64>,
    /// Positive means the optimized output is smaller than baseline
    pub storage_delta_bytes: ByOptimizedMode<i64>,
    pub best_mode: ProfileMode,
    pub annotations: Vec<Annotation>,
}

impl ResultRecord {
    /// Measurement of the best optimized mode.
    pub fn best_measurement(&self) -> &Measurement {
        if self.best_mode.is_model_based() {
            &self.measurements.model_based
        } else {
            &self.measurements.rule_based
        }
    }

    pub fn is_degraded(&self) -> bool {
        !self.annotations.is_empty()
    }
}
