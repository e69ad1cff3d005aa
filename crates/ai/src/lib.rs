//! `restock-ai`
//!
//! **Responsibility:** learned reorder scoring.
//!
//! This crate is intentionally a *secondary* path:
//! - It never decides on its own; the rule in `restock-inventory` is the safety net.
//! - It never mutates item snapshots.
//! - Its only ground truth is the rule's label; it never trains against anything else.

pub mod classifier;
pub mod config;
pub mod model;
pub mod result;

pub use classifier::MlpClassifier;
pub use config::TrainingConfig;
pub use model::{ReorderModel, TrainingReport};
pub use result::{DECISION_THRESHOLD, ModelError, Verdict};
