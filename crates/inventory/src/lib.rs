//! Inventory snapshot model, feature derivation and the reorder rule.
//!
//! This crate contains business rules for replenishment, implemented purely as
//! deterministic logic (no IO, no model state).

pub mod features;
pub mod item;
pub mod policy;

pub use features::{DaysOfSupply, FeatureVector, ItemFeatures, UrgencyTier};
pub use item::Item;
pub use policy::{SAFETY_STOCK_DAYS, should_reorder};
