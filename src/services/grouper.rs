//! Order Grouping
//!
//! Partitions processed orders into grouped messages and individual
//! publishes according to the configured strategy. Keys whose sets fall
//! below the minimum group size degrade to individual publishes.

use std::collections::HashMap;

use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::models::{GroupedMessage, ProcessedOrder};

/// Grouping key for orders without a warehouse.
const UNKNOWN_WAREHOUSE: &str = "UNKNOWN";
/// Grouping key for the high-value bucket.
const HIGH_VALUE_KEY: &str = "HIGH_VALUE";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupingStrategy {
    ByCustomer,
    ByWarehouse,
    ByTier,
    HighValue,
    None,
}

impl GroupingStrategy {
    /// Parse the configuration spelling (e.g. "BY_CUSTOMER").
    pub fn from_config(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "BY_CUSTOMER" => Some(GroupingStrategy::ByCustomer),
            "BY_WAREHOUSE" => Some(GroupingStrategy::ByWarehouse),
            "BY_TIER" => Some(GroupingStrategy::ByTier),
            "HIGH_VALUE" => Some(GroupingStrategy::HighValue),
            "NONE" => Some(GroupingStrategy::None),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GroupingStrategy::ByCustomer => "BY_CUSTOMER",
            GroupingStrategy::ByWarehouse => "BY_WAREHOUSE",
            GroupingStrategy::ByTier => "BY_TIER",
            GroupingStrategy::HighValue => "HIGH_VALUE",
            GroupingStrategy::None => "NONE",
        }
    }
}

/// Output of one grouping pass. Every input order appears exactly once,
/// either inside a group or as an individual.
#[derive(Debug, Default)]
pub struct GroupingOutcome {
    pub groups: Vec<GroupedMessage>,
    pub individuals: Vec<ProcessedOrder>,
}

pub struct OrderGrouper {
    strategy: GroupingStrategy,
    min_group_size: usize,
    high_value_threshold: Decimal,
    grouped_by: String,
}

impl OrderGrouper {
    pub fn new(
        strategy: GroupingStrategy,
        min_group_size: usize,
        high_value_threshold: Decimal,
        grouped_by: String,
    ) -> Self {
        Self {
            strategy,
            min_group_size: min_group_size.max(1),
            high_value_threshold,
            grouped_by,
        }
    }

    pub fn strategy(&self) -> GroupingStrategy {
        self.strategy
    }

    pub fn group(&self, orders: Vec<ProcessedOrder>) -> GroupingOutcome {
        match self.strategy {
            GroupingStrategy::None => GroupingOutcome {
                groups: Vec::new(),
                individuals: orders,
            },
            GroupingStrategy::HighValue => self.group_high_value(orders),
            GroupingStrategy::ByCustomer => {
                self.group_by_key(orders, |o| o.customer_id.clone())
            }
            GroupingStrategy::ByWarehouse => self.group_by_key(orders, |o| {
                o.warehouse_location
                    .clone()
                    .unwrap_or_else(|| UNKNOWN_WAREHOUSE.to_string())
            }),
            GroupingStrategy::ByTier => {
                self.group_by_key(orders, |o| o.customer_tier.to_string())
            }
        }
    }

    fn group_by_key<F>(&self, orders: Vec<ProcessedOrder>, key_fn: F) -> GroupingOutcome
    where
        F: Fn(&ProcessedOrder) -> String,
    {
        let mut buckets: HashMap<String, Vec<ProcessedOrder>> = HashMap::new();
        for order in orders {
            buckets.entry(key_fn(&order)).or_default().push(order);
        }

        let mut outcome = GroupingOutcome::default();
        for (key, bucket) in buckets {
            if bucket.len() >= self.min_group_size {
                outcome.groups.push(self.build_group(key, bucket));
            } else {
                outcome.individuals.extend(bucket);
            }
        }
        outcome
    }

    fn group_high_value(&self, orders: Vec<ProcessedOrder>) -> GroupingOutcome {
        let (high, rest): (Vec<_>, Vec<_>) = orders
            .into_iter()
            .partition(|o| o.final_price >= self.high_value_threshold);

        let mut outcome = GroupingOutcome {
            groups: Vec::new(),
            individuals: rest,
        };
        if high.len() >= self.min_group_size {
            outcome
                .groups
                .push(self.build_group(HIGH_VALUE_KEY.to_string(), high));
        } else {
            outcome.individuals.extend(high);
        }
        outcome
    }

    fn build_group(&self, key: String, orders: Vec<ProcessedOrder>) -> GroupedMessage {
        let total_amount = orders.iter().map(|o| o.final_price).sum();
        GroupedMessage {
            group_id: Uuid::new_v4(),
            grouping_key: key,
            group_type: self.strategy.as_str().to_string(),
            order_count: orders.len(),
            total_amount,
            orders,
            grouped_at: Utc::now(),
            grouped_by: self.grouped_by.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CustomerTier, ShippingStatus};
    use rust_decimal_macros::dec;

    fn processed(id: &str, customer: &str, price: Decimal, warehouse: Option<&str>, tier: CustomerTier) -> ProcessedOrder {
        ProcessedOrder {
            order_id: id.to_string(),
            customer_id: customer.to_string(),
            customer_name: format!("Customer {}", customer),
            customer_tier: tier,
            final_price: price,
            warehouse_location: warehouse.map(|w| w.to_string()),
            status: ShippingStatus::ReadyToShip,
            processed_at: Utc::now(),
            processed_by: "worker-0".to_string(),
        }
    }

    fn grouper(strategy: GroupingStrategy, min: usize, threshold: Decimal) -> OrderGrouper {
        OrderGrouper::new(strategy, min, threshold, "worker-0".to_string())
    }

    fn count_all(outcome: &GroupingOutcome) -> usize {
        outcome.groups.iter().map(|g| g.orders.len()).sum::<usize>() + outcome.individuals.len()
    }

    #[test]
    fn test_strategy_parsing() {
        assert_eq!(
            GroupingStrategy::from_config("by_customer"),
            Some(GroupingStrategy::ByCustomer)
        );
        assert_eq!(GroupingStrategy::from_config("NONE"), Some(GroupingStrategy::None));
        assert_eq!(GroupingStrategy::from_config("bogus"), None);
    }

    #[test]
    fn test_by_customer_groups_shared_customer() {
        let g = grouper(GroupingStrategy::ByCustomer, 2, dec!(500));
        let outcome = g.group(vec![
            processed("O1", "CUST-1", dec!(48.60), None, CustomerTier::Gold),
            processed("O2", "CUST-1", dec!(145.80), None, CustomerTier::Gold),
            processed("O3", "CUST-1", dec!(972.00), None, CustomerTier::Gold),
        ]);
        assert_eq!(outcome.groups.len(), 1);
        assert!(outcome.individuals.is_empty());
        let group = &outcome.groups[0];
        assert_eq!(group.order_count, 3);
        assert_eq!(group.total_amount, dec!(1166.40));
        assert_eq!(group.grouping_key, "CUST-1");
        assert_eq!(group.group_type, "BY_CUSTOMER");
    }

    #[test]
    fn test_small_buckets_degrade_to_individuals() {
        let g = grouper(GroupingStrategy::ByCustomer, 2, dec!(500));
        let outcome = g.group(vec![
            processed("O1", "CUST-1", dec!(10), None, CustomerTier::Standard),
            processed("O2", "CUST-2", dec!(20), None, CustomerTier::Standard),
            processed("O3", "CUST-1", dec!(30), None, CustomerTier::Standard),
        ]);
        assert_eq!(outcome.groups.len(), 1);
        assert_eq!(outcome.individuals.len(), 1);
        assert_eq!(outcome.individuals[0].order_id, "O2");
        assert_eq!(count_all(&outcome), 3);
    }

    #[test]
    fn test_by_warehouse_uses_unknown_for_missing() {
        let g = grouper(GroupingStrategy::ByWarehouse, 2, dec!(500));
        let outcome = g.group(vec![
            processed("O1", "CUST-1", dec!(10), None, CustomerTier::Standard),
            processed("O2", "CUST-2", dec!(20), None, CustomerTier::Standard),
        ]);
        assert_eq!(outcome.groups.len(), 1);
        assert_eq!(outcome.groups[0].grouping_key, "UNKNOWN");
    }

    #[test]
    fn test_by_tier_keys_on_tier_name() {
        let g = grouper(GroupingStrategy::ByTier, 2, dec!(500));
        let outcome = g.group(vec![
            processed("O1", "CUST-1", dec!(10), None, CustomerTier::Gold),
            processed("O2", "CUST-2", dec!(20), None, CustomerTier::Gold),
            processed("O3", "CUST-3", dec!(30), None, CustomerTier::Standard),
        ]);
        assert_eq!(outcome.groups.len(), 1);
        assert_eq!(outcome.groups[0].grouping_key, "GOLD");
        assert_eq!(outcome.individuals.len(), 1);
    }

    #[test]
    fn test_high_value_partitions_on_threshold() {
        let g = grouper(GroupingStrategy::HighValue, 2, dec!(100));
        let outcome = g.group(vec![
            processed("O1", "CUST-1", dec!(250), None, CustomerTier::Standard),
            processed("O2", "CUST-2", dec!(100), None, CustomerTier::Standard),
            processed("O3", "CUST-3", dec!(99.99), None, CustomerTier::Standard),
        ]);
        assert_eq!(outcome.groups.len(), 1);
        let group = &outcome.groups[0];
        assert_eq!(group.grouping_key, "HIGH_VALUE");
        assert_eq!(group.order_count, 2);
        assert_eq!(outcome.individuals.len(), 1);
    }

    #[test]
    fn test_high_value_below_min_size_degrades() {
        let g = grouper(GroupingStrategy::HighValue, 3, dec!(100));
        let outcome = g.group(vec![
            processed("O1", "CUST-1", dec!(250), None, CustomerTier::Standard),
            processed("O2", "CUST-2", dec!(150), None, CustomerTier::Standard),
            processed("O3", "CUST-3", dec!(10), None, CustomerTier::Standard),
        ]);
        assert!(outcome.groups.is_empty());
        assert_eq!(outcome.individuals.len(), 3);
    }

    #[test]
    fn test_none_strategy_emits_only_individuals() {
        let g = grouper(GroupingStrategy::None, 1, dec!(0));
        let outcome = g.group(vec![
            processed("O1", "CUST-1", dec!(10), None, CustomerTier::Standard),
            processed("O2", "CUST-1", dec!(20), None, CustomerTier::Standard),
        ]);
        assert!(outcome.groups.is_empty());
        assert_eq!(outcome.individuals.len(), 2);
    }

    #[test]
    fn test_no_order_is_lost_or_duplicated() {
        let g = grouper(GroupingStrategy::ByCustomer, 2, dec!(500));
        let orders: Vec<ProcessedOrder> = (0..17)
            .map(|i| {
                processed(
                    &format!("O{}", i),
                    &format!("CUST-{}", i % 4),
                    dec!(10),
                    None,
                    CustomerTier::Standard,
                )
            })
            .collect();
        let outcome = g.group(orders);
        assert_eq!(count_all(&outcome), 17);

        let mut seen: Vec<String> = outcome
            .groups
            .iter()
            .flat_map(|g| g.orders.iter().map(|o| o.order_id.clone()))
            .chain(outcome.individuals.iter().map(|o| o.order_id.clone()))
            .collect();
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 17);
    }
}
