//! Pipeline Orchestrator
//!
//! Composes preload → transform → publish for one event's orders and
//! wall-clocks each stage into the result.

use std::sync::Arc;

use tracing::info;

use crate::error::PipelineError;
use crate::metrics::Timer;
use crate::models::{Order, PipelineResult, StageTimings};

use super::preloader::Preloader;
use super::publisher::OrderPublisher;
use super::transformer::OrderTransformer;

pub struct PipelineOrchestrator {
    preloader: Arc<dyn Preloader>,
    transformer: Arc<OrderTransformer>,
    publisher: Arc<OrderPublisher>,
}

impl PipelineOrchestrator {
    pub fn new(
        preloader: Arc<dyn Preloader>,
        transformer: Arc<OrderTransformer>,
        publisher: Arc<OrderPublisher>,
    ) -> Self {
        Self {
            preloader,
            transformer,
            publisher,
        }
    }

    pub async fn run(
        &self,
        orders: Vec<Order>,
        use_grouping: bool,
        trace_id: &str,
    ) -> Result<PipelineResult, PipelineError> {
        if orders.is_empty() {
            return Ok(PipelineResult::empty());
        }

        let total = Timer::new();
        let order_ids: Vec<String> = orders.iter().map(|o| o.order_id.clone()).collect();

        let stage = Timer::new();
        let ctx = self.preloader.preload(&order_ids).await?;
        let preload_ms = stage.elapsed_ms();
        crate::metrics::record_stage_duration("preload", stage.elapsed_secs());

        let stage = Timer::new();
        let (successes, failures) = self
            .transformer
            .process_orders(orders, Arc::new(ctx))
            .await;
        let processing_ms = stage.elapsed_ms();
        crate::metrics::record_stage_duration("processing", stage.elapsed_secs());

        let stage = Timer::new();
        let publish = self.publisher.publish(&successes, use_grouping, trace_id).await;
        let publish_ms = stage.elapsed_ms();
        crate::metrics::record_stage_duration("publish", stage.elapsed_secs());

        let timings = StageTimings {
            preload_ms,
            processing_ms,
            publish_ms,
            total_ms: total.elapsed_ms(),
        };
        info!(
            orders = order_ids.len(),
            successes = successes.len(),
            failures = failures.len(),
            sent = publish.sent,
            publish_failed = publish.failed,
            preload_ms,
            processing_ms,
            publish_ms,
            "pipeline run finished"
        );

        Ok(PipelineResult {
            successes,
            failures,
            timings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Customer, CustomerTier, Inventory, Pricing, ProcessingContext};
    use crate::queue::RecordingQueueSink;
    use crate::services::grouper::{GroupingStrategy, OrderGrouper};
    use async_trait::async_trait;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    struct FixedPreloader {
        ctx: ProcessingContext,
    }

    #[async_trait]
    impl Preloader for FixedPreloader {
        async fn preload(&self, _ids: &[String]) -> Result<ProcessingContext, PipelineError> {
            Ok(self.ctx.clone())
        }
    }

    struct FailingPreloader;

    #[async_trait]
    impl Preloader for FailingPreloader {
        async fn preload(&self, _ids: &[String]) -> Result<ProcessingContext, PipelineError> {
            Err(PipelineError::Fatal("preload blew up".to_string()))
        }
    }

    fn order(id: &str, amount: rust_decimal::Decimal) -> Order {
        Order {
            order_id: id.to_string(),
            customer_id: "CUST-1".to_string(),
            status: "PENDING".to_string(),
            amount,
            created_at: Utc::now(),
        }
    }

    fn gold_ctx(ids: &[&str]) -> ProcessingContext {
        let mut ctx = ProcessingContext::default();
        for id in ids {
            ctx.customers.insert(
                id.to_string(),
                Customer {
                    customer_id: "CUST-1".to_string(),
                    name: "Acme".to_string(),
                    email: None,
                    tier: CustomerTier::Gold,
                },
            );
            ctx.inventory.insert(
                id.to_string(),
                Inventory {
                    order_id: id.to_string(),
                    sku: "SKU-1".to_string(),
                    quantity_available: 20,
                    warehouse_location: Some("WH-1".to_string()),
                },
            );
        }
        ctx
    }

    fn orchestrator(
        preloader: Arc<dyn Preloader>,
        sink: Arc<RecordingQueueSink>,
    ) -> PipelineOrchestrator {
        PipelineOrchestrator::new(
            preloader,
            Arc::new(OrderTransformer::new(8, "worker-0".to_string())),
            Arc::new(OrderPublisher::new(
                sink,
                OrderGrouper::new(GroupingStrategy::ByCustomer, 2, dec!(500), "worker-0".to_string()),
                4,
            )),
        )
    }

    #[tokio::test]
    async fn test_empty_input_returns_empty_result() {
        let sink = Arc::new(RecordingQueueSink::new());
        let orch = orchestrator(
            Arc::new(FixedPreloader {
                ctx: ProcessingContext::default(),
            }),
            sink.clone(),
        );
        let result = orch.run(Vec::new(), false, "trace").await.unwrap();
        assert_eq!(result.total(), 0);
        assert_eq!(result.timings.total_ms, 0);
        assert!(sink.messages().is_empty());
    }

    #[tokio::test]
    async fn test_successes_and_failures_partition_the_input() {
        let mut ctx = gold_ctx(&["O1", "O2", "O3"]);
        // O2 gets a broken pricing row.
        for id in ["O1", "O2", "O3"] {
            ctx.pricing.insert(
                id.to_string(),
                Pricing {
                    order_id: id.to_string(),
                    base_price: dec!(100),
                    discount: if id == "O2" { dec!(5) } else { dec!(0) },
                    tax_rate: dec!(0.08),
                },
            );
        }
        let sink = Arc::new(RecordingQueueSink::new());
        let orch = orchestrator(Arc::new(FixedPreloader { ctx }), sink.clone());

        let orders = vec![order("O1", dec!(100)), order("O2", dec!(100)), order("O3", dec!(100))];
        let result = orch.run(orders, false, "trace").await.unwrap();

        assert_eq!(result.successes.len(), 2);
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.total(), 3);
        // Only successes are published.
        assert_eq!(sink.messages().len(), 2);
    }

    #[tokio::test]
    async fn test_preload_failure_is_fatal() {
        let sink = Arc::new(RecordingQueueSink::new());
        let orch = orchestrator(Arc::new(FailingPreloader), sink.clone());
        let result = orch.run(vec![order("O1", dec!(10))], false, "trace").await;
        assert!(result.is_err());
        assert!(sink.messages().is_empty());
    }
}
