//! Model-based parameter selection.
//!
//! A trained artifact predicts a preset index and a CRF from complexity
//! features. Anything that prevents a usable prediction degrades the
//! selection to the rule table instead of failing the request.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::{
    clamp_quality_factor, Codec, ComplexityScore, CoreError, CoreResult, EncodingProfile, Preset,
    ProfileMode, VideoMetadata,
};

use super::{ParameterSelector, RuleBasedSelector};

// =============================================================================
// Predictor Contract
// =============================================================================

/// Input features a model may be trained on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ModelFeature {
    Combined,
    Edge,
    Motion,
    Width,
    Height,
    Fps,
    SizeMb,
}

/// Feature values for one source. Metadata features are 0 when unknown.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelFeatures {
    pub combined: f64,
    pub edge: f64,
    pub motion: f64,
    pub width: f64,
    pub height: f64,
    pub fps: f64,
    pub size_mb: f64,
}

impl ModelFeatures {
    pub fn new(complexity: &ComplexityScore, metadata: Option<&VideoMetadata>) -> Self {
        Self {
            combined: complexity.combined,
            edge: complexity.edge_component,
            motion: complexity.motion_component,
            width: metadata.map_or(0.0, |m| m.width as f64),
            height: metadata.map_or(0.0, |m| m.height as f64),
            fps: metadata.map_or(0.0, |m| m.fps),
            size_mb: metadata.map_or(0.0, |m| m.size_mb()),
        }
    }

    pub fn get(&self, feature: ModelFeature) -> f64 {
        match feature {
            ModelFeature::Combined => self.combined,
            ModelFeature::Edge => self.edge,
            ModelFeature::Motion => self.motion,
            ModelFeature::Width => self.width,
            ModelFeature::Height => self.height,
            ModelFeature::Fps => self.fps,
            ModelFeature::SizeMb => self.size_mb,
        }
    }
}

/// Raw model output, before clamping to valid encoder values.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    /// Fractional index into the fastest-to-slowest preset ordering
    pub preset_index: f64,
    pub quality_factor: f64,
    /// Codec the model was trained for, if it names one
    pub codec: Option<String>,
}

impl Prediction {
    pub fn is_finite(&self) -> bool {
        self.preset_index.is_finite() && self.quality_factor.is_finite()
    }
}

/// Model information.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    pub name: String,
    pub version: String,
    pub trained_on: String,
}

impl fmt::Display for ModelInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} v{}", self.name, self.version)
    }
}

/// A loaded, versioned preset/CRF predictor.
pub trait PresetPredictor: Send + Sync {
    fn predict(&self, features: &ModelFeatures) -> CoreResult<Prediction>;

    fn info(&self) -> ModelInfo;
}

// =============================================================================
// Linear Artifact
// =============================================================================

/// Linear regression artifact stored as JSON.
///
/// ```json
/// {
///   "name": "preset-linear", "version": "3", "trainedOn": "c5.large 2024-05",
///   "features": ["combined", "motion"],
///   "presetWeights": [0.3, 0.1], "presetBias": 0.0,
///   "crfWeights": [-0.5, 0.0], "crfBias": 29.0,
///   "codec": "libx264"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinearPresetModel {
    name: String,
    version: String,
    #[serde(default)]
    trained_on: String,
    features: Vec<ModelFeature>,
    preset_weights: Vec<f64>,
    preset_bias: f64,
    crf_weights: Vec<f64>,
    crf_bias: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    codec: Option<String>,
}

impl LinearPresetModel {
    /// Load and validate an artifact. Every failure is `ModelUnavailable`.
    pub fn load(path: &Path) -> CoreResult<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            CoreError::ModelUnavailable(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&json).map_err(|e| match e {
            CoreError::ModelUnavailable(msg) => {
                CoreError::ModelUnavailable(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })
    }

    /// Load model from JSON.
    pub fn from_json(json: &str) -> CoreResult<Self> {
        let model: Self = serde_json::from_str(json)
            .map_err(|e| CoreError::ModelUnavailable(format!("invalid model artifact: {e}")))?;
        model.validate()?;
        Ok(model)
    }

    fn validate(&self) -> CoreResult<()> {
        let n = self.features.len();
        if n == 0 {
            return Err(CoreError::ModelUnavailable(
                "model declares no features".to_string(),
            ));
        }
        if self.preset_weights.len() != n || self.crf_weights.len() != n {
            return Err(CoreError::ModelUnavailable(format!(
                "expected {} weights per output, got {} preset and {} crf",
                n,
                self.preset_weights.len(),
                self.crf_weights.len()
            )));
        }
        let finite = self
            .preset_weights
            .iter()
            .chain(&self.crf_weights)
            .chain([&self.preset_bias, &self.crf_bias])
            .all(|w| w.is_finite());
        if !finite {
            return Err(CoreError::ModelUnavailable(
                "model weights must be finite".to_string(),
            ));
        }
        Ok(())
    }

    fn linear(&self, weights: &[f64], bias: f64, features: &ModelFeatures) -> f64 {
        // y = Σ(w_i * x_i) + b
        self.features
            .iter()
            .zip(weights)
            .map(|(f, w)| features.get(*f) * w)
            .sum::<f64>()
            + bias
    }
}

impl PresetPredictor for LinearPresetModel {
    fn predict(&self, features: &ModelFeatures) -> CoreResult<Prediction> {
        Ok(Prediction {
            preset_index: self.linear(&self.preset_weights, self.preset_bias, features),
            quality_factor: self.linear(&self.crf_weights, self.crf_bias, features),
            codec: self.codec.clone(),
        })
    }

    fn info(&self) -> ModelInfo {
        ModelInfo {
            name: self.name.clone(),
            version: self.version.clone(),
            trained_on: self.trained_on.clone(),
        }
    }
}

// =============================================================================
// Selector
// =============================================================================

/// Model-driven selector with rule-table fallback.
pub struct ModelBasedSelector {
    predictor: Result<Box<dyn PresetPredictor>, String>,
    fallback: RuleBasedSelector,
}

impl fmt::Debug for ModelBasedSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelBasedSelector")
            .field("model", &self.model_info())
            .field("unavailable", &self.unavailable_reason())
            .finish()
    }
}

impl ModelBasedSelector {
    /// Loads the artifact at `path`. A missing path or a load failure yields a
    /// selector that always degrades; it never fails.
    pub fn load(path: Option<&Path>, fallback: RuleBasedSelector) -> Self {
        let Some(path) = path else {
            return Self::unavailable("no model artifact configured", fallback);
        };

        match LinearPresetModel::load(path) {
            Ok(model) => {
                tracing::info!("Loaded model {} from {}", model.info(), path.display());
                Self::with_predictor(Box::new(model), fallback)
            }
            Err(e) => {
                tracing::warn!("Model unavailable, using rule table: {}", e);
                Self::unavailable(e.to_string(), fallback)
            }
        }
    }

    pub fn with_predictor(predictor: Box<dyn PresetPredictor>, fallback: RuleBasedSelector) -> Self {
        Self {
            predictor: Ok(predictor),
            fallback,
        }
    }

    pub fn unavailable(reason: impl Into<String>, fallback: RuleBasedSelector) -> Self {
        Self {
            predictor: Err(reason.into()),
            fallback,
        }
    }

    pub fn is_available(&self) -> bool {
        self.predictor.is_ok()
    }

    /// Why the model could not be loaded, if it could not.
    pub fn unavailable_reason(&self) -> Option<&str> {
        self.predictor.as_ref().err().map(String::as_str)
    }

    pub fn model_info(&self) -> Option<ModelInfo> {
        self.predictor.as_ref().ok().map(|p| p.info())
    }

    fn degraded(&self, complexity: &ComplexityScore, reason: &str) -> EncodingProfile {
        let mut profile = self.fallback.select(complexity);
        profile.mode = ProfileMode::ModelBasedDegraded;
        profile.rationale = format!("{} (model unavailable: {})", profile.rationale, reason);
        profile
    }

    fn from_prediction(&self, prediction: &Prediction, info: &ModelInfo) -> EncodingProfile {
        let codec = match prediction.codec.as_deref() {
            None => self.fallback.codec(),
            Some(name) => Codec::from_name(name).unwrap_or_else(|| {
                tracing::warn!("Model {} names unsupported codec {:?}", info, name);
                self.fallback.codec()
            }),
        };
        let preset = Preset::from_index_clamped(prediction.preset_index);
        let quality_factor = clamp_quality_factor(prediction.quality_factor);

        EncodingProfile::new(codec, preset, quality_factor, ProfileMode::ModelBased).with_rationale(
            format!(
                "Model {}: {} preset + CRF {} (raw index {:.2}, raw CRF {:.2})",
                info, preset, quality_factor, prediction.preset_index, prediction.quality_factor
            ),
        )
    }
}

impl ParameterSelector for ModelBasedSelector {
    fn name(&self) -> &str {
        "model_based"
    }

    fn select_with(
        &self,
        complexity: &ComplexityScore,
        metadata: Option<&VideoMetadata>,
    ) -> EncodingProfile {
        let predictor = match &self.predictor {
            Ok(predictor) => predictor,
            Err(reason) => return self.degraded(complexity, reason),
        };

        let info = predictor.info();
        let features = ModelFeatures::new(complexity, metadata);
        match predictor.predict(&features) {
            Ok(prediction) if prediction.is_finite() => self.from_prediction(&prediction, &info),
            Ok(prediction) => {
                tracing::warn!("Model {} produced a non-finite prediction: {:?}", info, prediction);
                self.degraded(complexity, "non-finite prediction")
            }
            Err(e) => {
                tracing::warn!("Model {} prediction failed: {}", info, e);
                self.degraded(complexity, &e.to_string())
            }
        }
    }
}
