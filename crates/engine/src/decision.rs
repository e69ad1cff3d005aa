use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use restock_ai::{TrainingReport, Verdict};
use restock_core::{ItemId, RunId};
use restock_inventory::features::{self, DaysOfSupply, UrgencyTier};
use restock_inventory::Item;

/// Where a verdict came from.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionSource {
    /// Classifier output.
    Model,
    /// Rule verdict standing in for one item the classifier could not score.
    RuleSubstitute,
    /// Rule verdict for the whole batch after training failed.
    RuleFallback,
}

/// Verdict for one item plus the rule-derived stock metrics shown alongside it.
///
/// `urgency` and `days_of_supply` always come from the rule, whatever the
/// verdict's source. A model verdict can therefore say "no reorder" on an item
/// whose urgency is `High`; readers that want urgent reorders should check
/// both fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    pub verdict: Verdict,
    pub source: DecisionSource,
    pub urgency: UrgencyTier,
    pub days_of_supply: DaysOfSupply,
}

impl Decision {
    pub(crate) fn new(item: &Item, verdict: Verdict, source: DecisionSource) -> Self {
        let derived = features::derive(item);
        Self {
            verdict,
            source,
            urgency: derived.urgency,
            days_of_supply: derived.days_of_supply,
        }
    }

    pub fn should_reorder(&self) -> bool {
        self.verdict.should_reorder
    }
}

/// Recoverable problems met while deciding a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DecisionWarning {
    /// The item broke the input contract and got no verdict.
    InvalidItem { id: ItemId, reason: String },
    /// The classifier could not be trained; every item got the rule fallback.
    TrainingFailed { reason: String },
    /// The classifier could not score this item; it got a rule substitute.
    PredictionFailed { id: ItemId, reason: String },
}

/// Output of one `decide` pass: a verdict for every accepted item id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionSet {
    pub run_id: RunId,
    pub decided_at: DateTime<Utc>,
    pub decisions: BTreeMap<ItemId, Decision>,
    pub warnings: Vec<DecisionWarning>,
    pub training: Option<TrainingReport>,
}

impl DecisionSet {
    pub(crate) fn new() -> Self {
        Self {
            run_id: RunId::new(),
            decided_at: Utc::now(),
            decisions: BTreeMap::new(),
            warnings: Vec::new(),
            training: None,
        }
    }

    pub fn get(&self, id: &ItemId) -> Option<&Decision> {
        self.decisions.get(id)
    }

    pub fn verdict(&self, id: &ItemId) -> Option<&Verdict> {
        self.decisions.get(id).map(|d| &d.verdict)
    }

    /// Plain `id -> verdict` view for callers that ignore provenance.
    pub fn verdicts(&self) -> BTreeMap<ItemId, Verdict> {
        self.decisions
            .iter()
            .map(|(id, d)| (id.clone(), d.verdict))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.decisions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decisions.is_empty()
    }

    /// True when anything fell back to the rule or was rejected.
    pub fn is_degraded(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn count_by_source(&self, source: DecisionSource) -> usize {
        self.decisions.values().filter(|d| d.source == source).count()
    }
}
