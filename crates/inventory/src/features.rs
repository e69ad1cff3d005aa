//! Feature derivation: raw item attributes to model inputs and stock metrics.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::item::Item;
use crate::policy;

/// Length of the period `average_sales` is measured over, in days.
pub const DAYS_PER_PERIOD: f64 = 7.0;

/// Model input in fixed order: `[current_inventory, average_sales, lead_time]`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct FeatureVector(pub [f64; FeatureVector::LEN]);

impl FeatureVector {
    pub const LEN: usize = 3;

    pub fn from_item(item: &Item) -> Self {
        Self([
            item.current_inventory as f64,
            item.average_sales,
            f64::from(item.lead_time),
        ])
    }

    pub fn as_array(&self) -> &[f64; Self::LEN] {
        &self.0
    }

    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|v| v.is_finite())
    }
}

/// Days until stock runs out at the current sales rate.
///
/// Unbounded (`f64::INFINITY`) when nothing sells. Serialized as `null` in that
/// case since JSON has no infinity.
#[derive(Debug, Copy, Clone, PartialEq, PartialOrd)]
pub struct DaysOfSupply(f64);

impl DaysOfSupply {
    pub const UNBOUNDED: DaysOfSupply = DaysOfSupply(f64::INFINITY);

    /// `current_inventory / (average_sales / 7)`.
    ///
    /// Zero sales is handled explicitly: the item never depletes, so the result
    /// is [`DaysOfSupply::UNBOUNDED`] and the rule never triggers a reorder.
    /// Multiplying first keeps a subnormal sales rate from underflowing the
    /// daily demand to zero.
    pub fn of(item: &Item) -> Self {
        if item.average_sales <= 0.0 {
            return Self::UNBOUNDED;
        }
        Self(item.current_inventory as f64 * DAYS_PER_PERIOD / item.average_sales)
    }

    pub fn value(&self) -> f64 {
        self.0
    }

    pub fn is_unbounded(&self) -> bool {
        self.0.is_infinite()
    }

    /// Whole days, as shown on reorder lists. `None` when unbounded.
    pub fn rounded(&self) -> Option<u64> {
        if self.0.is_finite() {
            Some(self.0.round() as u64)
        } else {
            None
        }
    }
}

impl Serialize for DaysOfSupply {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let finite = self.0.is_finite().then_some(self.0);
        finite.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for DaysOfSupply {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Option::<f64>::deserialize(deserializer)?;
        Ok(value.map_or(Self::UNBOUNDED, Self))
    }
}

/// How soon an item needs attention.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UrgencyTier {
    /// Stock runs out before a replenishment could arrive.
    High,
    /// Inside the safety-stock window but still covers the lead time.
    Medium,
    Low,
}

impl UrgencyTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            UrgencyTier::High => "HIGH",
            UrgencyTier::Medium => "MEDIUM",
            UrgencyTier::Low => "LOW",
        }
    }
}

impl core::fmt::Display for UrgencyTier {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything derived from one item.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ItemFeatures {
    pub vector: FeatureVector,
    pub days_of_supply: DaysOfSupply,
    pub urgency: UrgencyTier,
}

pub fn derive(item: &Item) -> ItemFeatures {
    let days_of_supply = DaysOfSupply::of(item);
    ItemFeatures {
        vector: FeatureVector::from_item(item),
        days_of_supply,
        urgency: policy::urgency_for(days_of_supply, item.lead_time),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feature_vector_keeps_fixed_order() {
        let item = Item::new("a", 200, 7.5, 3);
        assert_eq!(FeatureVector::from_item(&item).0, [200.0, 7.5, 3.0]);
    }

    #[test]
    fn days_of_supply_uses_weekly_rate() {
        let item = Item::new("a", 200, 7.0, 3);
        assert_eq!(DaysOfSupply::of(&item).value(), 200.0);

        let item = Item::new("b", 70, 70.0, 7);
        assert_eq!(DaysOfSupply::of(&item).value(), 7.0);
    }

    #[test]
    fn zero_sales_is_unbounded_not_nan() {
        let dos = DaysOfSupply::of(&Item::new("idle", 0, 0.0, 5));
        assert!(dos.is_unbounded());
        assert!(dos.rounded().is_none());
    }

    #[test]
    fn tiny_sales_rate_with_empty_shelf_still_reorders() {
        let item = Item::new("p", 0, f64::from_bits(1), 5);
        let features = derive(&item);
        assert_eq!(features.days_of_supply.value(), 0.0);
        assert!(policy::should_reorder(&item));
        assert_eq!(features.urgency, UrgencyTier::High);
    }

    #[test]
    fn tiny_sales_rate_with_stock_never_depletes() {
        let dos = DaysOfSupply::of(&Item::new("p", 10, f64::from_bits(1), 5));
        assert!(!dos.value().is_nan());
        assert!(dos.value() > 1e300);
    }

    #[test]
    fn derive_reports_low_urgency_for_idle_item() {
        let features = derive(&Item::new("idle", 40, 0.0, 5));
        assert_eq!(features.urgency, UrgencyTier::Low);
    }

    #[test]
    fn unbounded_days_serialize_as_null() {
        assert_eq!(serde_json::to_string(&DaysOfSupply::UNBOUNDED).unwrap(), "null");
        let back: DaysOfSupply = serde_json::from_str("null").unwrap();
        assert!(back.is_unbounded());
    }

    #[test]
    fn urgency_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&UrgencyTier::Medium).unwrap(), "\"MEDIUM\"");
    }
}
