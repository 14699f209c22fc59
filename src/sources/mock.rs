//! Mock Order Source
//!
//! In-memory stand-in for the document store, used when
//! `app.mongodb.enabled` is false. Serves seeded orders when provided,
//! otherwise fabricates a small batch of pending orders per scope.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use tracing::info;

use crate::models::{Order, OrderEvent, PENDING_STATUS};

use super::{FetchError, OrderSource};

pub struct MockOrderSource {
    seeded: Mutex<Vec<Order>>,
    orders_per_event: usize,
    status_updates: Mutex<Vec<(Vec<String>, String)>>,
}

impl MockOrderSource {
    pub fn new(orders_per_event: usize) -> Self {
        Self {
            seeded: Mutex::new(Vec::new()),
            orders_per_event,
            status_updates: Mutex::new(Vec::new()),
        }
    }

    /// Serve exactly these orders instead of fabricated ones.
    pub fn with_orders(self, orders: Vec<Order>) -> Self {
        *self.seeded.lock().unwrap() = orders;
        self
    }

    /// Status updates recorded so far, newest last.
    pub fn recorded_updates(&self) -> Vec<(Vec<String>, String)> {
        self.status_updates.lock().unwrap().clone()
    }

    fn fabricate(&self, event: &OrderEvent) -> Vec<Order> {
        let mut rng = rand::thread_rng();
        let now = Utc::now();
        (0..self.orders_per_event)
            .map(|i| Order {
                order_id: format!(
                    "ORD-{}-{}-{}",
                    event.trading_partner_name, event.business_unit_name, i
                ),
                customer_id: format!("CUST-{}", rng.gen_range(1..=20)),
                status: PENDING_STATUS.to_string(),
                amount: Decimal::new(rng.gen_range(1_000..500_000), 2),
                created_at: now - Duration::minutes(rng.gen_range(1..720)),
            })
            .collect()
    }
}

#[async_trait]
impl OrderSource for MockOrderSource {
    async fn fetch_orders_for_event(&self, event: &OrderEvent) -> Result<Vec<Order>, FetchError> {
        let seeded = self.seeded.lock().unwrap().clone();
        if !seeded.is_empty() {
            return Ok(seeded);
        }
        let orders = self.fabricate(event);
        info!(
            event_id = %event.event_id,
            count = orders.len(),
            "mock source fabricated pending orders"
        );
        Ok(orders)
    }

    async fn batch_update_order_status(
        &self,
        ids: &[String],
        status: &str,
    ) -> Result<u64, FetchError> {
        self.status_updates
            .lock()
            .unwrap()
            .push((ids.to_vec(), status.to_string()));
        Ok(ids.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn event() -> OrderEvent {
        OrderEvent {
            event_id: "e1".to_string(),
            event_type: "SINGLE_ORDER".to_string(),
            trading_partner_name: "ACME".to_string(),
            business_unit_name: "WEST".to_string(),
        }
    }

    #[tokio::test]
    async fn test_fabricates_requested_count() {
        let source = MockOrderSource::new(5);
        let orders = source.fetch_orders_for_event(&event()).await.unwrap();
        assert_eq!(orders.len(), 5);
        assert!(orders.iter().all(|o| o.status == PENDING_STATUS));
    }

    #[tokio::test]
    async fn test_seeded_orders_take_precedence() {
        let source = MockOrderSource::new(5).with_orders(vec![Order {
            order_id: "O1".to_string(),
            customer_id: "CUST-1".to_string(),
            status: PENDING_STATUS.to_string(),
            amount: dec!(50),
            created_at: Utc::now(),
        }]);
        let orders = source.fetch_orders_for_event(&event()).await.unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].order_id, "O1");
    }

    #[tokio::test]
    async fn test_status_updates_are_recorded() {
        let source = MockOrderSource::new(0);
        let updated = source
            .batch_update_order_status(&["O1".to_string(), "O2".to_string()], "PROCESSED")
            .await
            .unwrap();
        assert_eq!(updated, 2);
        let recorded = source.recorded_updates();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].1, "PROCESSED");
    }
}
