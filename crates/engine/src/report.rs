//! Batch-level views over items and decisions.
//!
//! Rendering (dashboards, CSV files, alerts) belongs to callers; these are the
//! numbers and rows they render.

use serde::{Deserialize, Serialize};

use restock_core::ItemId;
use restock_inventory::features::{DaysOfSupply, UrgencyTier};
use restock_inventory::{Item, policy};

use crate::decision::DecisionSet;

/// Items that will run out before a replenishment could arrive.
///
/// Rule-only, so critical-alert scans work regardless of model state.
pub fn critical_items(items: &[Item]) -> Vec<&Item> {
    items
        .iter()
        .filter(|item| item.validate().is_ok() && policy::urgency(item) == UrgencyTier::High)
        .collect()
}

/// Headline counts for a decided batch.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionSummary {
    pub total: usize,
    pub reorder: usize,
    pub ok: usize,
    /// Reorder verdicts whose rule urgency is `High`.
    pub high_urgency: usize,
    /// `reorder / total`, 0 for an empty batch.
    pub reorder_ratio: f64,
}

impl DecisionSummary {
    pub fn from_decisions(set: &DecisionSet) -> Self {
        let total = set.len();
        let reorder = set.decisions.values().filter(|d| d.should_reorder()).count();
        let high_urgency = set
            .decisions
            .values()
            .filter(|d| d.should_reorder() && d.urgency == UrgencyTier::High)
            .count();
        Self {
            total,
            reorder,
            ok: total - reorder,
            high_urgency,
            reorder_ratio: if total == 0 {
                0.0
            } else {
                reorder as f64 / total as f64
            },
        }
    }
}

/// One row of the reorder list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReorderLine {
    pub id: ItemId,
    pub name: Option<String>,
    pub category: Option<String>,
    pub current_inventory: u64,
    pub average_sales: f64,
    pub lead_time: u32,
    /// Whole days; `None` when nothing sells.
    pub days_of_supply: Option<u64>,
    pub urgency: UrgencyTier,
    pub probability: f64,
    pub confidence: f64,
}

/// Items whose decision says reorder, most urgent (fewest days of supply) first.
///
/// Items without a decision in `set` are skipped.
pub fn reorder_list(items: &[Item], set: &DecisionSet) -> Vec<ReorderLine> {
    let mut rows: Vec<(DaysOfSupply, ReorderLine)> = items
        .iter()
        .filter_map(|item| {
            let decision = set.get(&item.id)?;
            if !decision.should_reorder() {
                return None;
            }
            Some((
                decision.days_of_supply,
                ReorderLine {
                    id: item.id.clone(),
                    name: item.name.clone(),
                    category: item.category.clone(),
                    current_inventory: item.current_inventory,
                    average_sales: item.average_sales,
                    lead_time: item.lead_time,
                    days_of_supply: decision.days_of_supply.rounded(),
                    urgency: decision.urgency,
                    probability: decision.verdict.probability,
                    confidence: decision.verdict.confidence,
                },
            ))
        })
        .collect();

    rows.sort_by(|(a_days, a), (b_days, b)| {
        a_days
            .value()
            .total_cmp(&b_days.value())
            .then_with(|| a.id.cmp(&b.id))
    });
    rows.into_iter().map(|(_, row)| row).collect()
}
