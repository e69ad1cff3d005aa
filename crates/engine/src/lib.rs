//! Reorder decision orchestration.
//!
//! Trains the classifier once per batch against rule labels, predicts per
//! item, and falls back to the rule whenever the model cannot answer. Model
//! failures are isolated here and never reach the caller.

pub mod decision;
pub mod engine;
pub mod report;

pub use decision::{Decision, DecisionSet, DecisionSource, DecisionWarning};
pub use engine::{
    FALLBACK_CONFIDENCE, FALLBACK_REORDER_PROBABILITY, FALLBACK_SKIP_PROBABILITY, ReorderEngine,
    SUBSTITUTE_CONFIDENCE, SUBSTITUTE_REORDER_PROBABILITY, SUBSTITUTE_SKIP_PROBABILITY,
};
pub use report::{DecisionSummary, ReorderLine, critical_items, reorder_list};
