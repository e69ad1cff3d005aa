use std::borrow::Cow;
use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use restock_ai::{MlpClassifier, ModelError, ReorderModel, TrainingConfig, Verdict};
use restock_core::{DomainError, Entity, ItemId};
use restock_inventory::{Item, policy};

use crate::decision::{Decision, DecisionSet, DecisionSource, DecisionWarning};

/// Rule substitute for a single item the classifier could not score.
pub const SUBSTITUTE_REORDER_PROBABILITY: f64 = 0.7;
pub const SUBSTITUTE_SKIP_PROBABILITY: f64 = 0.3;
pub const SUBSTITUTE_CONFIDENCE: f64 = 0.8;

/// Whole-batch rule fallback after training failed.
pub const FALLBACK_REORDER_PROBABILITY: f64 = 0.8;
pub const FALLBACK_SKIP_PROBABILITY: f64 = 0.2;
pub const FALLBACK_CONFIDENCE: f64 = 0.9;

/// Reorder decision engine.
///
/// Owns one model behind a mutex: training and prediction for a batch run
/// under the same lock, so concurrent `decide` calls on one engine serialise.
/// Construct one per session; there is no process-wide instance.
#[derive(Debug)]
pub struct ReorderEngine<M: ReorderModel = MlpClassifier> {
    model: Mutex<M>,
}

impl ReorderEngine<MlpClassifier> {
    pub fn new(config: TrainingConfig) -> Self {
        Self::with_model(MlpClassifier::new(config))
    }

    /// Engine configured from `RESTOCK_*` environment variables.
    pub fn from_env() -> Self {
        Self::new(TrainingConfig::from_env())
    }

    /// Drop the trained parameters, keeping the training configuration.
    pub fn reset(&self) {
        let mut model = self.lock();
        let config = model.config().clone();
        *model = MlpClassifier::new(config);
    }
}

impl Default for ReorderEngine<MlpClassifier> {
    fn default() -> Self {
        Self::new(TrainingConfig::default())
    }
}

impl<M: ReorderModel> ReorderEngine<M> {
    pub fn with_model(model: M) -> Self {
        Self {
            model: Mutex::new(model),
        }
    }

    /// Cheap verdict straight from the rule; never touches the model.
    pub fn classify_by_rule(&self, item: &Item) -> bool {
        policy::should_reorder(item)
    }

    pub fn is_trained(&self) -> bool {
        self.lock().is_trained()
    }

    /// Decide every item in `items`.
    ///
    /// Never fails: training problems fall back to the rule for the whole
    /// batch, per-item prediction problems to a rule substitute for that item.
    /// Items that break the input contract (and repeated ids) are left out and
    /// reported in `warnings`; every other id appears exactly once.
    pub fn decide(&self, items: &[Item]) -> DecisionSet {
        let mut set = DecisionSet::new();
        if items.is_empty() {
            return set;
        }

        let batch = admit(items, &mut set.warnings);
        if batch.is_empty() {
            warn!(run = %set.run_id, rejected = items.len(), "no valid items in batch");
            return set;
        }

        let mut model = self.lock();
        match model.train(&batch) {
            Ok(report) => {
                info!(
                    run = %set.run_id,
                    samples = report.samples,
                    positives = report.positives,
                    epochs = report.epochs_run,
                    train_loss = report.train_loss,
                    validation_accuracy = ?report.validation_accuracy,
                    "reorder classifier trained"
                );
                set.training = Some(report);

                for item in batch.iter() {
                    let decision = match model.predict(item) {
                        Ok(verdict) => Decision::new(item, verdict, DecisionSource::Model),
                        Err(e) => {
                            debug!(run = %set.run_id, item = %item.id, error = %e, "substituting rule verdict");
                            set.warnings.push(DecisionWarning::PredictionFailed {
                                id: item.id.clone(),
                                reason: e.to_string(),
                            });
                            Decision::new(item, substitute_verdict(item), DecisionSource::RuleSubstitute)
                        }
                    };
                    set.decisions.insert(item.id.clone(), decision);
                }
            }
            Err(e) => {
                warn!(run = %set.run_id, items = batch.len(), error = %e, "training failed; using rule for whole batch");
                set.warnings.push(DecisionWarning::TrainingFailed {
                    reason: training_reason(e),
                });
                for item in batch.iter() {
                    let decision =
                        Decision::new(item, fallback_verdict(item), DecisionSource::RuleFallback);
                    set.decisions.insert(item.id.clone(), decision);
                }
            }
        }
        drop(model);

        let substituted = set.count_by_source(DecisionSource::RuleSubstitute);
        if substituted > 0 {
            warn!(run = %set.run_id, substituted, "some items fell back to the rule");
        }

        set
    }

    fn lock(&self) -> MutexGuard<'_, M> {
        // Models only publish complete parameters, so a panic mid-call cannot
        // leave a half-written state behind.
        self.model.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Validate and de-duplicate. Borrows the input when nothing is rejected.
fn admit<'a>(items: &'a [Item], warnings: &mut Vec<DecisionWarning>) -> Cow<'a, [Item]> {
    let mut seen: BTreeSet<&ItemId> = BTreeSet::new();
    let mut rejected = vec![false; items.len()];

    for (idx, item) in items.iter().enumerate() {
        let reason = match item.validate() {
            Err(e) => Some(e.to_string()),
            Ok(()) if !seen.insert(item.id()) => {
                Some(DomainError::conflict(format!("duplicate id {}", item.id)).to_string())
            }
            Ok(()) => None,
        };
        if let Some(reason) = reason {
            warn!(item = %item.id, %reason, "rejecting item");
            warnings.push(DecisionWarning::InvalidItem {
                id: item.id.clone(),
                reason,
            });
            rejected[idx] = true;
        }
    }

    if rejected.iter().any(|r| *r) {
        Cow::Owned(
            items
                .iter()
                .zip(&rejected)
                .filter(|(_, r)| !**r)
                .map(|(item, _)| item.clone())
                .collect(),
        )
    } else {
        Cow::Borrowed(items)
    }
}

fn substitute_verdict(item: &Item) -> Verdict {
    Verdict::rule_based(
        policy::should_reorder(item),
        SUBSTITUTE_REORDER_PROBABILITY,
        SUBSTITUTE_SKIP_PROBABILITY,
        SUBSTITUTE_CONFIDENCE,
    )
}

fn fallback_verdict(item: &Item) -> Verdict {
    Verdict::rule_based(
        policy::should_reorder(item),
        FALLBACK_REORDER_PROBABILITY,
        FALLBACK_SKIP_PROBABILITY,
        FALLBACK_CONFIDENCE,
    )
}

fn training_reason(err: ModelError) -> String {
    match err {
        ModelError::TrainingFailed(reason) => reason,
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitute_and_fallback_follow_rule() {
        let urgent = Item::new("u", 5, 50.0, 10);
        let idle = Item::new("i", 500, 1.0, 3);

        let v = substitute_verdict(&urgent);
        assert_eq!((v.probability, v.should_reorder, v.confidence), (0.7, true, 0.8));
        let v = substitute_verdict(&idle);
        assert_eq!((v.probability, v.should_reorder, v.confidence), (0.3, false, 0.8));

        let v = fallback_verdict(&urgent);
        assert_eq!((v.probability, v.should_reorder, v.confidence), (0.8, true, 0.9));
        let v = fallback_verdict(&idle);
        assert_eq!((v.probability, v.should_reorder, v.confidence), (0.2, false, 0.9));
    }

    #[test]
    fn admit_borrows_clean_batches() {
        let items = vec![Item::new("a", 1, 1.0, 1), Item::new("b", 2, 2.0, 2)];
        let mut warnings = Vec::new();
        assert!(matches!(admit(&items, &mut warnings), Cow::Borrowed(_)));
        assert!(warnings.is_empty());
    }

    #[test]
    fn admit_drops_invalid_and_duplicate_items() {
        let items = vec![
            Item::new("a", 1, 1.0, 1),
            Item::new("a", 9, 9.0, 9),
            Item::new("neg", 1, -2.0, 1),
            Item::new("", 1, 1.0, 1),
            Item::new("b", 2, 2.0, 2),
        ];
        let mut warnings = Vec::new();
        let kept = admit(&items, &mut warnings);

        let ids: Vec<&str> = kept.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(kept[0].current_inventory, 1);
        assert_eq!(warnings.len(), 3);
    }

    #[test]
    fn duplicate_ids_are_reported_as_conflicts() {
        let items = vec![Item::new("a", 1, 1.0, 1), Item::new("a", 9, 9.0, 9)];
        let mut warnings = Vec::new();
        admit(&items, &mut warnings);

        let expected = DomainError::conflict("duplicate id a").to_string();
        match warnings.as_slice() {
            [DecisionWarning::InvalidItem { id, reason }] => {
                assert_eq!(id.as_str(), "a");
                assert_eq!(reason, &expected);
            }
            other => panic!("Expected one InvalidItem warning, got {other:?}"),
        }
    }
}
