use serde::{Deserialize, Serialize};

use restock_core::{DomainError, DomainResult, Entity, ItemId};

/// Immutable snapshot of one inventory unit, supplied by the caller per batch.
///
/// Field names follow the caller-facing contract
/// (`id`, `currentInventory`, `averageSales`, `leadTime`, `category`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: ItemId,
    /// Units on hand.
    pub current_inventory: u64,
    /// Units sold per 7-day period.
    pub average_sales: f64,
    /// Supplier lead time in days.
    pub lead_time: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Item {
    pub fn new(
        id: impl Into<ItemId>,
        current_inventory: u64,
        average_sales: f64,
        lead_time: u32,
    ) -> Self {
        Self {
            id: id.into(),
            current_inventory,
            average_sales,
            lead_time,
            category: None,
            name: None,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Display label: the name when present, otherwise the id.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(self.id.as_str())
    }

    /// Check the input contract for a single snapshot.
    ///
    /// Quantities and lead time are non-negative by type; only the id and the
    /// sales rate need runtime checks.
    pub fn validate(&self) -> DomainResult<()> {
        if self.id.is_blank() {
            return Err(DomainError::invalid_id("item id cannot be empty"));
        }
        if !self.average_sales.is_finite() {
            return Err(DomainError::validation(format!(
                "item {}: average sales must be finite (got {})",
                self.id, self.average_sales
            )));
        }
        if self.average_sales < 0.0 {
            return Err(DomainError::validation(format!(
                "item {}: average sales cannot be negative (got {})",
                self.id, self.average_sales
            )));
        }
        Ok(())
    }
}

impl Entity for Item {
    type Id = ItemId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
