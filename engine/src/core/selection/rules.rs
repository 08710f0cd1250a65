//! Threshold table from complexity bands to encoder parameters.

use crate::core::{
    clamp_score, Codec, ComplexityScore, EncodingProfile, Preset, ProfileMode, VideoMetadata,
};

use super::ParameterSelector;

/// One complexity band: scores below `upper_bound` use this preset and CRF.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RuleBand {
    pub upper_bound: f64,
    pub preset: Preset,
    pub quality_factor: u8,
}

/// Bands in ascending order; the last one is unbounded so every score maps.
///
/// Simple content gets the fastest preset and the most compression; detailed
/// content a slower preset and a lower CRF.
pub const RULE_TABLE: [RuleBand; 3] = [
    RuleBand {
        upper_bound: 3.5,
        preset: Preset::Ultrafast,
        quality_factor: 28,
    },
    RuleBand {
        upper_bound: 7.0,
        preset: Preset::Superfast,
        quality_factor: 26,
    },
    RuleBand {
        upper_bound: f64::INFINITY,
        preset: Preset::Veryfast,
        quality_factor: 24,
    },
];

/// Deterministic complexity-band selector.
#[derive(Debug, Clone)]
pub struct RuleBasedSelector {
    codec: Codec,
}

impl Default for RuleBasedSelector {
    fn default() -> Self {
        Self::new(Codec::Libx264)
    }
}

impl RuleBasedSelector {
    pub fn new(codec: Codec) -> Self {
        Self { codec }
    }

    pub fn codec(&self) -> Codec {
        self.codec
    }

    /// Band for a score. NaN and negatives land in the first band.
    pub fn band_for(score: f64) -> &'static RuleBand {
        let score = clamp_score(score);
        RULE_TABLE
            .iter()
            .find(|band| score < band.upper_bound)
            .unwrap_or(&RULE_TABLE[RULE_TABLE.len() - 1])
    }
}

impl ParameterSelector for RuleBasedSelector {
    fn name(&self) -> &str {
        "rule_based"
    }

    fn select_with(
        &self,
        complexity: &ComplexityScore,
        _metadata: Option<&VideoMetadata>,
    ) -> EncodingProfile {
        let band = Self::band_for(complexity.combined);
        EncodingProfile::new(
            self.codec,
            band.preset,
            band.quality_factor,
            ProfileMode::RuleBased,
        )
        .with_rationale(format!(
            "Complexity-based: {} preset + CRF {} for complexity {:.1}/10",
            band.preset,
            band.quality_factor,
            clamp_score(complexity.combined)
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{MAX_QUALITY_FACTOR, MIN_QUALITY_FACTOR};

    fn score(combined: f64) -> ComplexityScore {
        ComplexityScore {
            edge_component: combined,
            motion_component: combined,
            combined,
            edge_density: 0.0,
            motion_ratio: 0.0,
        }
    }

    #[test]
    fn table_is_total_over_score_range() {
        let selector = RuleBasedSelector::default();
        for step in 0..=1000 {
            let value = step as f64 / 100.0;
            let profile = selector.select(&score(value));
            assert_eq!(profile.mode, ProfileMode::RuleBased);
            assert!(Preset::ALL.contains(&profile.preset));
            assert!((MIN_QUALITY_FACTOR..=MAX_QUALITY_FACTOR).contains(&profile.quality_factor));
        }
    }

    #[test]
    fn bands_match_thresholds() {
        let selector = RuleBasedSelector::default();
        let cases = [
            (0.0, Preset::Ultrafast, 28),
            (3.49, Preset::Ultrafast, 28),
            (3.5, Preset::Superfast, 26),
            (6.99, Preset::Superfast, 26),
            (7.0, Preset::Veryfast, 24),
            (10.0, Preset::Veryfast, 24),
        ];
        for (value, preset, crf) in cases {
            let profile = selector.select(&score(value));
            assert_eq!(profile.preset, preset, "score {value}");
            assert_eq!(profile.quality_factor, crf, "score {value}");
        }
    }

    #[test]
    fn higher_complexity_never_compresses_more() {
        let selector = RuleBasedSelector::default();
        let mut previous = selector.select(&score(0.0));
        for step in 1..=100 {
            let profile = selector.select(&score(step as f64 / 10.0));
            assert!(profile.preset >= previous.preset);
            assert!(profile.quality_factor <= previous.quality_factor);
            previous = profile;
        }
    }

    #[test]
    fn out_of_range_scores_are_clamped() {
        assert_eq!(RuleBasedSelector::band_for(-3.0).preset, Preset::Ultrafast);
        assert_eq!(RuleBasedSelector::band_for(f64::NAN).preset, Preset::Ultrafast);
        assert_eq!(RuleBasedSelector::band_for(42.0).preset, Preset::Veryfast);
        assert_eq!(RuleBasedSelector::band_for(f64::INFINITY).preset, Preset::Veryfast);
    }

    #[test]
    fn rationale_names_the_band() {
        let profile = RuleBasedSelector::default().select(&score(2.1));
        assert_eq!(
            profile.rationale,
            "Complexity-based: ultrafast preset + CRF 28 for complexity 2.1/10"
        );
    }
}
