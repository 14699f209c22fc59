//! Reference Data Entities
//!
//! Relational reference data joined onto orders during enrichment:
//! customers, inventory, pricing, and partner/unit master records.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Customer pricing tier. Unknown values decode as `Standard`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CustomerTier {
    #[default]
    Standard,
    Premium,
    Gold,
}

impl CustomerTier {
    /// Additional discount applied on top of the order's own discount.
    pub fn discount_bonus(&self) -> Decimal {
        match self {
            CustomerTier::Gold => Decimal::new(10, 2),    // 0.10
            CustomerTier::Premium => Decimal::new(5, 2),  // 0.05
            CustomerTier::Standard => Decimal::ZERO,
        }
    }
}

impl FromStr for CustomerTier {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "GOLD" => Ok(CustomerTier::Gold),
            "PREMIUM" => Ok(CustomerTier::Premium),
            _ => Ok(CustomerTier::Standard),
        }
    }
}

impl fmt::Display for CustomerTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CustomerTier::Standard => write!(f, "STANDARD"),
            CustomerTier::Premium => write!(f, "PREMIUM"),
            CustomerTier::Gold => write!(f, "GOLD"),
        }
    }
}

/// Lifecycle status of a trading partner or business unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntityStatus {
    Active,
    Inactive,
    Suspended,
}

impl EntityStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, EntityStatus::Active)
    }
}

impl FromStr for EntityStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "ACTIVE" => Ok(EntityStatus::Active),
            "SUSPENDED" => Ok(EntityStatus::Suspended),
            _ => Ok(EntityStatus::Inactive),
        }
    }
}

impl fmt::Display for EntityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityStatus::Active => write!(f, "ACTIVE"),
            EntityStatus::Inactive => write!(f, "INACTIVE"),
            EntityStatus::Suspended => write!(f, "SUSPENDED"),
        }
    }
}

/// Customer record, keyed by order id in the processing context.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub customer_id: String,
    pub name: String,
    pub email: Option<String>,
    pub tier: CustomerTier,
}

/// Inventory availability for one order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Inventory {
    pub order_id: String,
    pub sku: String,
    pub quantity_available: i32,
    pub warehouse_location: Option<String>,
}

/// Pricing inputs for one order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pricing {
    pub order_id: String,
    pub base_price: Decimal,
    /// Fractional discount in [0, 1].
    pub discount: Decimal,
    /// Fractional tax rate in [0, 1].
    pub tax_rate: Decimal,
}

/// Trading partner master record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartnerStatus {
    pub id: i64,
    pub name: String,
    pub status: EntityStatus,
    pub updated_at: DateTime<Utc>,
}

/// Business unit master record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitStatus {
    pub id: i64,
    pub name: String,
    pub status: EntityStatus,
    pub updated_at: DateTime<Utc>,
}

/// Preloaded reference data for one pipeline run, keyed by order id.
///
/// Any key may be absent; the transform degrades deterministically for
/// missing values.
#[derive(Debug, Clone, Default)]
pub struct ProcessingContext {
    pub customers: HashMap<String, Customer>,
    pub inventory: HashMap<String, Inventory>,
    pub pricing: HashMap<String, Pricing>,
}

impl ProcessingContext {
    pub fn customer_for(&self, order_id: &str) -> Option<&Customer> {
        self.customers.get(order_id)
    }

    pub fn inventory_for(&self, order_id: &str) -> Option<&Inventory> {
        self.inventory.get(order_id)
    }

    pub fn pricing_for(&self, order_id: &str) -> Option<&Pricing> {
        self.pricing.get(order_id)
    }
}
