use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Probability above which a verdict says "reorder".
pub const DECISION_THRESHOLD: f64 = 0.5;

/// Reorder verdict for one item.
///
/// `should_reorder` is always `probability > DECISION_THRESHOLD`. For model
/// output, `confidence` is the distance from the threshold rescaled to \[0, 1\]
/// (0 at the boundary, 1 at either extreme). Rule-based verdicts carry fixed
/// confidence constants instead; see [`Verdict::rule_based`].
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Verdict {
    pub probability: f64,
    pub should_reorder: bool,
    pub confidence: f64,
}

impl Verdict {
    /// Verdict from a model probability. Out-of-range input is clamped.
    pub fn from_probability(probability: f64) -> Self {
        let probability = probability.clamp(0.0, 1.0);
        Self {
            probability,
            should_reorder: probability > DECISION_THRESHOLD,
            confidence: confidence_for(probability),
        }
    }

    /// Verdict built from the rule with fixed marker values.
    ///
    /// `reorder_probability` is used when the rule says reorder and
    /// `skip_probability` otherwise; both must sit on the matching side of the
    /// threshold.
    pub fn rule_based(
        should_reorder: bool,
        reorder_probability: f64,
        skip_probability: f64,
        confidence: f64,
    ) -> Self {
        debug_assert!(reorder_probability > DECISION_THRESHOLD);
        debug_assert!(skip_probability <= DECISION_THRESHOLD);
        Self {
            probability: if should_reorder {
                reorder_probability
            } else {
                skip_probability
            },
            should_reorder,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }
}

/// `|p - 0.5| * 2`.
pub fn confidence_for(probability: f64) -> f64 {
    ((probability - DECISION_THRESHOLD).abs() * 2.0).clamp(0.0, 1.0)
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModelError {
    #[error("model not trained")]
    ModelNotTrained,

    #[error("training failed: {0}")]
    TrainingFailed(String),

    #[error("prediction failed: {0}")]
    PredictionFailed(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl ModelError {
    pub fn training(msg: impl Into<String>) -> Self {
        Self::TrainingFailed(msg.into())
    }

    pub fn prediction(msg: impl Into<String>) -> Self {
        Self::PredictionFailed(msg.into())
    }
}
