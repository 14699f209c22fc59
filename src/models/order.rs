//! Order and Result Types
//!
//! Pending orders read from the document store, the per-order outputs of
//! the transform stage, and the per-event pipeline result.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::reference::CustomerTier;

/// Order status value required for pickup by the pipeline.
pub const PENDING_STATUS: &str = "PENDING";

/// A pending order snapshot read from the document store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub order_id: String,
    pub customer_id: String,
    pub status: String,
    pub amount: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Shipping disposition derived from inventory availability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShippingStatus {
    ReadyToShip,
    LowStock,
    Backorder,
    PendingInventory,
}

impl fmt::Display for ShippingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShippingStatus::ReadyToShip => write!(f, "READY_TO_SHIP"),
            ShippingStatus::LowStock => write!(f, "LOW_STOCK"),
            ShippingStatus::Backorder => write!(f, "BACKORDER"),
            ShippingStatus::PendingInventory => write!(f, "PENDING_INVENTORY"),
        }
    }
}

/// Final per-order output of the transform stage.
///
/// Timestamps serialize as ISO-8601 strings on the outbound queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedOrder {
    pub order_id: String,
    pub customer_id: String,
    pub customer_name: String,
    pub customer_tier: CustomerTier,
    pub final_price: Decimal,
    pub warehouse_location: Option<String>,
    pub status: ShippingStatus,
    pub processed_at: DateTime<Utc>,
    pub processed_by: String,
}

/// A per-order transform failure. Does not fail the batch.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedOrder {
    pub order: Order,
    pub error_message: String,
    pub exception_type: String,
}

/// A batch of processed orders published as one message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupedMessage {
    pub group_id: Uuid,
    pub grouping_key: String,
    pub group_type: String,
    pub orders: Vec<ProcessedOrder>,
    pub order_count: usize,
    pub total_amount: Decimal,
    pub grouped_at: DateTime<Utc>,
    pub grouped_by: String,
}

/// Wall-clock stage timings for one pipeline run, in milliseconds.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct StageTimings {
    pub preload_ms: u64,
    pub processing_ms: u64,
    pub publish_ms: u64,
    pub total_ms: u64,
}

/// Outcome of one pipeline run over a list of orders.
///
/// Every input order lands in exactly one of `successes` or `failures`.
#[derive(Debug, Default)]
pub struct PipelineResult {
    pub successes: Vec<ProcessedOrder>,
    pub failures: Vec<FailedOrder>,
    pub timings: StageTimings,
}

impl PipelineResult {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn total(&self) -> usize {
        self.successes.len() + self.failures.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_shipping_status_serializes_screaming_snake() {
        let s = serde_json::to_string(&ShippingStatus::ReadyToShip).unwrap();
        assert_eq!(s, "\"READY_TO_SHIP\"");
    }

    #[test]
    fn test_processed_order_uses_iso8601_timestamps() {
        let order = ProcessedOrder {
            order_id: "O1".to_string(),
            customer_id: "CUST-1".to_string(),
            customer_name: "Acme".to_string(),
            customer_tier: CustomerTier::Gold,
            final_price: dec!(48.60),
            warehouse_location: Some("WH-EAST".to_string()),
            status: ShippingStatus::ReadyToShip,
            processed_at: "2024-03-01T12:00:00Z".parse().unwrap(),
            processed_by: "orderflow-pipeline@worker-0".to_string(),
        };
        let json = serde_json::to_string(&order).unwrap();
        assert!(json.contains("\"processedAt\":\"2024-03-01T12:00:00Z\""));
        assert!(json.contains("\"customerTier\":\"GOLD\""));
    }

    #[test]
    fn test_order_document_shape_roundtrip() {
        let json = r#"{
            "orderId": "O1",
            "customerId": "CUST-1",
            "status": "PENDING",
            "amount": "150.00",
            "createdAt": "2024-03-01T10:00:00Z"
        }"#;
        let order: Order = serde_json::from_str(json).unwrap();
        assert_eq!(order.order_id, "O1");
        assert_eq!(order.amount, dec!(150.00));
    }
}
