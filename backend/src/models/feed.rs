//! Feed stock and consumption.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::validation::{
    not_before, optional_name, optional_positive, require_positive, Validate, ValidationResult,
};
use crate::api::{CoopId, FeedConsumptionId, FeedInventoryId};
use crate::define_string_enum;

define_string_enum!(FeedType {
    Starter => "starter",
    Grower => "grower",
    Layer => "layer",
    Breeder => "breeder",
    Finisher => "finisher",
    Supplement => "supplement",
    Other => "other",
});

/// A purchased feed lot. `quantity_kg` is the remaining stock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedInventory {
    pub id: FeedInventoryId,
    pub feed_type: FeedType,
    pub brand: Option<String>,
    pub quantity_kg: f64,
    pub unit_cost: Option<f64>,
    pub purchase_date: NaiveDate,
    pub expiry_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedInventoryInput {
    pub feed_type: FeedType,
    #[serde(default)]
    pub brand: Option<String>,
    pub quantity_kg: f64,
    #[serde(default)]
    pub unit_cost: Option<f64>,
    pub purchase_date: NaiveDate,
    #[serde(default)]
    pub expiry_date: Option<NaiveDate>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl Validate for FeedInventoryInput {
    fn validate(&self) -> ValidationResult {
        optional_name("brand", self.brand.as_deref())?;
        require_positive("quantityKg", self.quantity_kg)?;
        optional_positive("unitCost", self.unit_cost)?;
        not_before(
            "expiryDate",
            self.expiry_date,
            Some(self.purchase_date),
            "purchaseDate",
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedConsumption {
    pub id: FeedConsumptionId,
    pub inventory_id: FeedInventoryId,
    pub coop_id: Option<CoopId>,
    pub quantity_kg: f64,
    pub consumed_on: NaiveDate,
    pub notes: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedConsumptionInput {
    pub inventory_id: FeedInventoryId,
    #[serde(default)]
    pub coop_id: Option<CoopId>,
    pub quantity_kg: f64,
    pub consumed_on: NaiveDate,
    #[serde(default)]
    pub notes: Option<String>,
}

impl Validate for FeedConsumptionInput {
    fn validate(&self) -> ValidationResult {
        require_positive("quantityKg", self.quantity_kg)
    }
}

/// Filters for the consumption listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumptionFilter {
    #[serde(default)]
    pub inventory_id: Option<FeedInventoryId>,
    #[serde(default)]
    pub coop_id: Option<CoopId>,
}

impl ConsumptionFilter {
    pub fn matches(&self, record: &FeedConsumption) -> bool {
        self.inventory_id.map_or(true, |id| id == record.inventory_id)
            && (self.coop_id.is_none() || self.coop_id == record.coop_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inventory_expiry_after_purchase() {
        let input = FeedInventoryInput {
            feed_type: FeedType::Layer,
            brand: Some("Betagro".into()),
            quantity_kg: 25.0,
            unit_cost: None,
            purchase_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            expiry_date: NaiveDate::from_ymd_opt(2024, 5, 1),
            notes: None,
        };
        assert_eq!(input.validate().unwrap_err().field, "expiryDate");
    }

    #[test]
    fn test_consumption_quantity_positive() {
        let input = FeedConsumptionInput {
            inventory_id: FeedInventoryId(1),
            coop_id: None,
            quantity_kg: 0.0,
            consumed_on: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            notes: None,
        };
        assert_eq!(input.validate().unwrap_err().field, "quantityKg");
    }

    #[test]
    fn test_feed_type_wire_names() {
        assert_eq!(FeedType::Supplement.as_str(), "supplement");
        assert_eq!("grower".parse::<FeedType>().unwrap(), FeedType::Grower);
    }
}
