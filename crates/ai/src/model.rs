use serde::{Deserialize, Serialize};

use restock_inventory::Item;

use crate::result::{ModelError, Verdict};

/// A trainable reorder scorer.
///
/// Implementations own their parameters and move from untrained to trained
/// only through `train`. A failed `train` must leave the previous parameters
/// in place.
pub trait ReorderModel: Send + 'static {
    /// Fit against rule-derived labels for `items`.
    fn train(&mut self, items: &[Item]) -> Result<TrainingReport, ModelError>;

    /// Score one item. Fails with `ModelNotTrained` before a successful `train`.
    fn predict(&self, item: &Item) -> Result<Verdict, ModelError>;

    fn is_trained(&self) -> bool;
}

/// Outcome of a successful training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingReport {
    pub samples: usize,
    /// Items the rule labels "reorder".
    pub positives: usize,
    pub negatives: usize,
    pub epochs_run: usize,
    /// Mean training loss of the last epoch.
    pub train_loss: f64,
    /// Best validation loss (`None` when the batch is too small to hold one out).
    pub validation_loss: Option<f64>,
    pub validation_accuracy: Option<f64>,
}
