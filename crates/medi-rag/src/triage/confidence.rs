use crate::config::TriageConfig;
use crate::types::ConfidenceLevel;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceThresholds {
    /// Scores at or above this are `High`.
    pub high: f32,
    /// Scores at or above this (and below `high`) are `Medium`.
    pub medium: f32,
}

impl ConfidenceThresholds {
    pub fn from_config(config: &TriageConfig) -> Self {
        Self {
            high: config.high_threshold,
            medium: config.medium_threshold,
        }
    }
}

impl Default for ConfidenceThresholds {
    fn default() -> Self {
        Self {
            high: 0.75,
            medium: 0.40,
        }
    }
}

/// Discretize a classifier score. Both thresholds are inclusive; NaN is `Low`.
pub fn compute_confidence(score: f32, thresholds: &ConfidenceThresholds) -> ConfidenceLevel {
    if score >= thresholds.high {
        ConfidenceLevel::High
    } else if score >= thresholds.medium {
        ConfidenceLevel::Medium
    } else {
        ConfidenceLevel::Low
    }
}
