//! Types for effect size representation

use std::fmt;

/// Types of effect sizes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectSizeType {
    /// Strength of association in a contingency table (Cramér's V)
    Association,
    /// Rank-biserial correlation between two independent samples
    RankBiserial,
    /// Correlation coefficient between two series
    Correlation,
}

impl EffectSizeType {
    /// Get the name of the effect size type
    pub fn name(&self) -> &'static str {
        match self {
            Self::Association => "Cramér's V",
            Self::RankBiserial => "Rank-biserial",
            Self::Correlation => "Correlation",
        }
    }
}

/// An effect size measurement with magnitude and interpretation
#[derive(Debug, Clone, PartialEq)]
pub struct EffectSize {
    /// The effect size magnitude
    pub magnitude: f64,
    /// The type of effect size
    pub effect_type: EffectSizeType,
    /// Interpretation of the magnitude
    pub interpretation: EffectSizeInterpretation,
    /// Sample sizes (group1, group2); paired measures repeat n
    pub sample_sizes: Option<(usize, usize)>,
}

impl EffectSize {
    /// Create a new effect size
    pub fn new(
        magnitude: f64,
        effect_type: EffectSizeType,
        sample_sizes: Option<(usize, usize)>,
    ) -> Self {
        let interpretation = EffectSizeInterpretation::from_magnitude(magnitude);

        Self {
            magnitude,
            effect_type,
            interpretation,
            sample_sizes,
        }
    }
}

impl fmt::Display for EffectSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {:.3} ({})",
            self.effect_type.name(),
            self.magnitude,
            self.interpretation
        )
    }
}

/// Interpretation of effect size magnitude following Cohen's conventions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectSizeInterpretation {
    Negligible,
    Small,
    Medium,
    Large,
}

impl EffectSizeInterpretation {
    /// Get interpretation from magnitude
    ///
    /// Every supported type uses the 0.1 / 0.3 / 0.5 cut points Cohen gives
    /// for correlations and for w in a 2-column table.
    pub fn from_magnitude(magnitude: f64) -> Self {
        let abs_magnitude = magnitude.abs();
        if abs_magnitude < 0.1 {
            Self::Negligible
        } else if abs_magnitude < 0.3 {
            Self::Small
        } else if abs_magnitude < 0.5 {
            Self::Medium
        } else {
            Self::Large
        }
    }
}

impl fmt::Display for EffectSizeInterpretation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Negligible => "negligible",
            Self::Small => "small",
            Self::Medium => "medium",
            Self::Large => "large",
        };
        write!(f, "{}", s)
    }
}
