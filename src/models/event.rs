//! Inbound Order Events
//!
//! Wire shape of the Kafka input topic plus the routing rules that decide
//! whether a message takes the grouped or individual publish path.

use serde::{Deserialize, Serialize};

/// Event types whose results are published as grouped messages.
const GROUPED_EVENT_TYPES: &[&str] = &["BULK_ORDER", "BATCH_ORDER"];

/// Event types explicitly routed to individual publishes. Anything not in
/// either set is treated as individual as well.
const INDIVIDUAL_EVENT_TYPES: &[&str] = &["SINGLE_ORDER", "PROCESS_ORDERS"];

/// An order-processing trigger consumed from the input topic.
///
/// Each event identifies a (trading partner, business unit) scope; the
/// pipeline resolves the scope to a set of pending orders.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderEvent {
    pub event_id: String,
    pub event_type: String,
    pub trading_partner_name: String,
    pub business_unit_name: String,
}

impl OrderEvent {
    /// Key used to suppress duplicate events for the same scope.
    pub fn dedup_key(&self) -> String {
        format!("{}::{}", self.trading_partner_name, self.business_unit_name)
    }

    /// Whether results for this event should be routed through the grouper.
    ///
    /// Matching is case-insensitive; unknown types fall through to the
    /// individual path.
    pub fn is_grouped(&self) -> bool {
        let ty = self.event_type.to_uppercase();
        GROUPED_EVENT_TYPES.iter().any(|g| *g == ty)
    }

    /// Whether the event type is one of the known routing types.
    pub fn is_known_type(&self) -> bool {
        let ty = self.event_type.to_uppercase();
        GROUPED_EVENT_TYPES.iter().any(|g| *g == ty)
            || INDIVIDUAL_EVENT_TYPES.iter().any(|i| *i == ty)
    }
}
