//! Parameter Selection Module
//!
//! Maps a complexity score to an encoding profile. Three strategies share one
//! trait: the fixed baseline, the rule table and the trained model (which
//! falls back to the rule table when no model can be used).

mod model;
mod rules;

pub use model::{
    LinearPresetModel, ModelBasedSelector, ModelFeature, ModelFeatures, ModelInfo, Prediction,
    PresetPredictor,
};
pub use rules::{RuleBand, RuleBasedSelector, RULE_TABLE};

use crate::core::{ComplexityScore, EncodingProfile, VideoMetadata};

/// Strategy producing an encoding profile for a complexity score.
pub trait ParameterSelector: Send + Sync {
    /// Selector name for logs
    fn name(&self) -> &str;

    /// Select parameters, optionally using probed source metadata.
    fn select_with(
        &self,
        complexity: &ComplexityScore,
        metadata: Option<&VideoMetadata>,
    ) -> EncodingProfile;

    fn select(&self, complexity: &ComplexityScore) -> EncodingProfile {
        self.select_with(complexity, None)
    }
}

/// Always returns the same complexity-independent profile.
#[derive(Debug, Clone)]
pub struct BaselineSelector {
    profile: EncodingProfile,
}

impl BaselineSelector {
    pub fn new(profile: EncodingProfile) -> Self {
        Self { profile }
    }
}

impl ParameterSelector for BaselineSelector {
    fn name(&self) -> &str {
        "baseline"
    }

    fn select_with(
        &self,
        _complexity: &ComplexityScore,
        _metadata: Option<&VideoMetadata>,
    ) -> EncodingProfile {
        self.profile.clone()
    }
}
