//! Result Publisher
//!
//! Serializes processed orders (optionally grouped) and fans the sends
//! out under the publish semaphore. A failed send is counted and logged
//! but never fails the batch; per-order transform failures are handled
//! by the dead-letter path instead.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::models::ProcessedOrder;
use crate::queue::{MessageKind, OutboundMessage, QueueSink};

use super::grouper::OrderGrouper;

/// Send totals for one publish pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishStats {
    pub sent: usize,
    pub failed: usize,
}

pub struct OrderPublisher {
    sink: Arc<dyn QueueSink>,
    grouper: OrderGrouper,
    semaphore: Arc<Semaphore>,
}

impl OrderPublisher {
    pub fn new(sink: Arc<dyn QueueSink>, grouper: OrderGrouper, publish_concurrency: usize) -> Self {
        Self {
            sink,
            grouper,
            semaphore: Arc::new(Semaphore::new(publish_concurrency.max(1))),
        }
    }

    /// Publish the batch. With grouping enabled the orders route through
    /// the grouper first; otherwise every order publishes individually.
    /// An empty batch sends nothing and takes no permits.
    pub async fn publish(
        &self,
        orders: &[ProcessedOrder],
        use_grouping: bool,
        trace_id: &str,
    ) -> PublishStats {
        if orders.is_empty() {
            return PublishStats::default();
        }

        let messages = self.build_messages(orders, use_grouping, trace_id);
        let mut tasks = JoinSet::new();
        for message in messages {
            let sink = self.sink.clone();
            let semaphore = self.semaphore.clone();
            tasks.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return false,
                };
                match sink.send(&message).await {
                    Ok(()) => {
                        crate::metrics::record_publish(message.kind.as_str());
                        true
                    }
                    Err(err) => {
                        warn!(
                            kind = message.kind.as_str(),
                            error = %err,
                            "publish failed, continuing with batch"
                        );
                        crate::metrics::record_publish_failure(message.kind.as_str());
                        false
                    }
                }
            });
        }

        let mut stats = PublishStats::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(true) => stats.sent += 1,
                Ok(false) => stats.failed += 1,
                Err(join_err) => {
                    warn!(error = %join_err, "publish task failed");
                    stats.failed += 1;
                }
            }
        }
        debug!(sent = stats.sent, failed = stats.failed, "publish stage finished");
        stats
    }

    fn build_messages(
        &self,
        orders: &[ProcessedOrder],
        use_grouping: bool,
        trace_id: &str,
    ) -> Vec<OutboundMessage> {
        let mut messages = Vec::new();

        if use_grouping {
            let outcome = self.grouper.group(orders.to_vec());
            for group in &outcome.groups {
                match serde_json::to_string(group) {
                    Ok(body) => {
                        messages.push(OutboundMessage::new(MessageKind::Grouped, body, trace_id))
                    }
                    Err(err) => {
                        warn!(group_id = %group.group_id, error = %err, "grouped message serialization failed");
                        crate::metrics::record_publish_failure(MessageKind::Grouped.as_str());
                    }
                }
            }
            for order in &outcome.individuals {
                push_individual(&mut messages, order, trace_id);
            }
        } else {
            for order in orders {
                push_individual(&mut messages, order, trace_id);
            }
        }
        messages
    }
}

fn push_individual(messages: &mut Vec<OutboundMessage>, order: &ProcessedOrder, trace_id: &str) {
    match serde_json::to_string(order) {
        Ok(body) => messages.push(OutboundMessage::new(MessageKind::Individual, body, trace_id)),
        Err(err) => {
            warn!(order_id = %order.order_id, error = %err, "order serialization failed");
            crate::metrics::record_publish_failure(MessageKind::Individual.as_str());
        }
    }
}
