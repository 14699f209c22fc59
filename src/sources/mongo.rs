//! MongoDB Order Source
//!
//! Reads the pending-order collection by (partner, unit) scope. Documents
//! carry `{ orderId, customerId, tradingPartnerName, businessUnitName,
//! status, amount, createdAt, items }`; only the pipeline's order fields
//! are materialized.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::bson::{doc, Bson, Document};
use mongodb::{Client, Collection};
use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::models::{Order, OrderEvent, PENDING_STATUS};

use super::{FetchError, OrderSource};

const COLLECTION: &str = "pending_orders";

pub struct MongoOrderSource {
    collection: Collection<Document>,
    /// Query cap for the scope-less fallback.
    pending_limit: i64,
}

impl MongoOrderSource {
    pub async fn connect(
        uri: &str,
        database: &str,
        pending_limit: i64,
    ) -> Result<Self, FetchError> {
        let client = Client::with_uri_str(uri).await?;
        let collection = client.database(database).collection::<Document>(COLLECTION);
        Ok(Self {
            collection,
            pending_limit,
        })
    }

    fn scope_filter(event: &OrderEvent) -> (Document, bool) {
        let partner = non_empty(&event.trading_partner_name);
        let unit = non_empty(&event.business_unit_name);
        match (partner, unit) {
            (Some(p), Some(u)) => (
                doc! { "tradingPartnerName": p, "businessUnitName": u, "status": PENDING_STATUS },
                false,
            ),
            (Some(p), None) => (doc! { "tradingPartnerName": p, "status": PENDING_STATUS }, false),
            (None, Some(u)) => (doc! { "businessUnitName": u, "status": PENDING_STATUS }, false),
            (None, None) => (doc! { "status": PENDING_STATUS }, true),
        }
    }
}

#[async_trait]
impl OrderSource for MongoOrderSource {
    async fn fetch_orders_for_event(&self, event: &OrderEvent) -> Result<Vec<Order>, FetchError> {
        let (filter, capped) = Self::scope_filter(event);

        let find = self.collection.find(filter).sort(doc! { "createdAt": 1 });
        let find = if capped {
            find.limit(self.pending_limit)
        } else {
            find
        };

        let mut cursor = find.await?;
        let mut orders = Vec::new();
        while let Some(document) = cursor.try_next().await? {
            match document_to_order(&document) {
                Some(order) => orders.push(order),
                None => {
                    warn!(
                        event_id = %event.event_id,
                        "skipping malformed pending-order document"
                    );
                }
            }
        }

        debug!(
            event_id = %event.event_id,
            partner = %event.trading_partner_name,
            unit = %event.business_unit_name,
            count = orders.len(),
            "fetched pending orders"
        );
        Ok(orders)
    }

    async fn batch_update_order_status(
        &self,
        ids: &[String],
        status: &str,
    ) -> Result<u64, FetchError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let result = self
            .collection
            .update_many(
                doc! { "orderId": { "$in": ids } },
                doc! { "$set": { "status": status, "updatedAt": Bson::DateTime(mongodb::bson::DateTime::now()) } },
            )
            .await?;
        Ok(result.modified_count)
    }
}

fn non_empty(s: &str) -> Option<&str> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

/// Map one pending-order document onto the pipeline's order shape,
/// tolerating the numeric representations the collection has accumulated
/// (Decimal128, double, string).
fn document_to_order(document: &Document) -> Option<Order> {
    let order_id = document.get_str("orderId").ok()?.to_string();
    let customer_id = document.get_str("customerId").ok()?.to_string();
    let status = document.get_str("status").unwrap_or(PENDING_STATUS).to_string();
    let amount = bson_decimal(document.get("amount"))?;
    let created_at = bson_datetime(document.get("createdAt"))?;

    Some(Order {
        order_id,
        customer_id,
        status,
        amount,
        created_at,
    })
}

fn bson_decimal(value: Option<&Bson>) -> Option<Decimal> {
    match value {
        Some(Bson::Decimal128(d)) => d.to_string().parse().ok(),
        Some(Bson::Double(f)) => Decimal::from_f64_retain(*f),
        Some(Bson::String(s)) => s.parse().ok(),
        Some(Bson::Int32(i)) => Some(Decimal::from(*i)),
        Some(Bson::Int64(i)) => Some(Decimal::from(*i)),
        _ => None,
    }
}

fn bson_datetime(value: Option<&Bson>) -> Option<DateTime<Utc>> {
    match value {
        Some(Bson::DateTime(dt)) => Some(dt.to_chrono()),
        Some(Bson::String(s)) => s.parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn event(partner: &str, unit: &str) -> OrderEvent {
        OrderEvent {
            event_id: "e1".to_string(),
            event_type: "SINGLE_ORDER".to_string(),
            trading_partner_name: partner.to_string(),
            business_unit_name: unit.to_string(),
        }
    }

    #[test]
    fn test_scope_filter_ladder() {
        let (f, capped) = MongoOrderSource::scope_filter(&event("ACME", "WEST"));
        assert_eq!(f.get_str("tradingPartnerName").unwrap(), "ACME");
        assert_eq!(f.get_str("businessUnitName").unwrap(), "WEST");
        assert!(!capped);

        let (f, capped) = MongoOrderSource::scope_filter(&event("ACME", ""));
        assert_eq!(f.get_str("tradingPartnerName").unwrap(), "ACME");
        assert!(f.get_str("businessUnitName").is_err());
        assert!(!capped);

        let (f, capped) = MongoOrderSource::scope_filter(&event("", "WEST"));
        assert_eq!(f.get_str("businessUnitName").unwrap(), "WEST");
        assert!(!capped);

        let (f, capped) = MongoOrderSource::scope_filter(&event("", " "));
        assert_eq!(f.get_str("status").unwrap(), PENDING_STATUS);
        assert!(capped);
    }

    #[test]
    fn test_document_to_order_handles_mixed_numerics() {
        let document = doc! {
            "orderId": "O1",
            "customerId": "CUST-1",
            "status": "PENDING",
            "amount": "150.00",
            "createdAt": "2024-03-01T10:00:00Z",
        };
        let order = document_to_order(&document).unwrap();
        assert_eq!(order.amount, dec!(150.00));

        let document = doc! {
            "orderId": "O2",
            "customerId": "CUST-1",
            "status": "PENDING",
            "amount": 99.5_f64,
            "createdAt": "2024-03-01T10:00:00Z",
        };
        let order = document_to_order(&document).unwrap();
        assert_eq!(order.amount, dec!(99.5));
    }

    #[test]
    fn test_malformed_document_is_rejected() {
        let document = doc! { "customerId": "CUST-1" };
        assert!(document_to_order(&document).is_none());
    }
}
