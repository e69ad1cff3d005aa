//! Rule-based reorder policy.
//!
//! Deterministic and always available. It is both the fallback verdict source
//! and the only label source for classifier training, so every caller goes
//! through [`should_reorder`].

use crate::features::{DaysOfSupply, UrgencyTier};
use crate::item::Item;

/// Cushion added to the lead time before a reorder triggers, in days.
pub const SAFETY_STOCK_DAYS: f64 = 7.0;

/// Days-of-supply at or below which the item should be reordered.
pub fn reorder_point(lead_time: u32) -> f64 {
    f64::from(lead_time) + SAFETY_STOCK_DAYS
}

/// Reorder when `days_of_supply <= lead_time + 7`.
pub fn should_reorder(item: &Item) -> bool {
    triggers(DaysOfSupply::of(item), item.lead_time)
}

/// Training label for `item`: `1.0` when the rule says reorder.
pub fn label(item: &Item) -> f64 {
    if should_reorder(item) { 1.0 } else { 0.0 }
}

pub fn urgency(item: &Item) -> UrgencyTier {
    urgency_for(DaysOfSupply::of(item), item.lead_time)
}

/// `High` only when stock depletes strictly before the lead time elapses;
/// `days_of_supply == lead_time` is `Medium`.
pub fn urgency_for(days_of_supply: DaysOfSupply, lead_time: u32) -> UrgencyTier {
    if !triggers(days_of_supply, lead_time) {
        return UrgencyTier::Low;
    }
    if days_of_supply.value() < f64::from(lead_time) {
        UrgencyTier::High
    } else {
        UrgencyTier::Medium
    }
}

fn triggers(days_of_supply: DaysOfSupply, lead_time: u32) -> bool {
    days_of_supply.value() <= reorder_point(lead_time)
}
