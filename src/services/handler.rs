//! Event Handler
//!
//! Per-message entry point. Walks the event through dedup, validation,
//! fetch, orchestration and dead-lettering, and tells the consumer
//! whether the offset may be committed. Any error returned here prevents
//! the commit so the broker redelivers the event.

use std::sync::Arc;

use tracing::{error, info};

use crate::error::PipelineError;
use crate::models::{OrderEvent, PipelineResult};
use crate::sources::OrderSource;

use super::dedup::DedupService;
use super::dead_letter::DeadLetterSink;
use super::orchestrator::PipelineOrchestrator;
use super::validator::{PartnerValidator, ValidationDecision};

/// Status written back to the document store after a successful run.
const PROCESSED_STATUS: &str = "PROCESSED";

/// How an event left the handler. Every variant is committable.
#[derive(Debug)]
pub enum EventOutcome {
    /// Another event holds the scope claim.
    Duplicate,
    /// Partner and unit were both non-active.
    Skipped(String),
    /// The scope resolved to zero pending orders.
    NoOrders,
    Completed(PipelineResult),
}

pub struct EventHandler {
    dedup: DedupService,
    validator: PartnerValidator,
    source: Arc<dyn OrderSource>,
    orchestrator: PipelineOrchestrator,
    dead_letter: Arc<dyn DeadLetterSink>,
}

impl EventHandler {
    pub fn new(
        dedup: DedupService,
        validator: PartnerValidator,
        source: Arc<dyn OrderSource>,
        orchestrator: PipelineOrchestrator,
        dead_letter: Arc<dyn DeadLetterSink>,
    ) -> Self {
        Self {
            dedup,
            validator,
            source,
            orchestrator,
            dead_letter,
        }
    }

    pub async fn handle(
        &self,
        event: &OrderEvent,
        trace_id: &str,
    ) -> Result<EventOutcome, PipelineError> {
        if !self.dedup.try_acquire(event) {
            crate::metrics::record_event("duplicate");
            return Ok(EventOutcome::Duplicate);
        }

        match self.validator.validate_event(event).await? {
            ValidationDecision::Skip(reason) => {
                info!(event_id = %event.event_id, %reason, "event skipped by validation");
                crate::metrics::record_event("skipped");
                return Ok(EventOutcome::Skipped(reason));
            }
            ValidationDecision::Process => {}
        }

        let orders = self.source.fetch_orders_for_event(event).await?;
        if orders.is_empty() {
            info!(event_id = %event.event_id, "no pending orders for scope");
            crate::metrics::record_event("no_orders");
            return Ok(EventOutcome::NoOrders);
        }

        let result = self
            .orchestrator
            .run(orders, event.is_grouped(), trace_id)
            .await?;

        if !result.failures.is_empty() {
            self.dead_letter.publish(event, &result.failures).await?;
        }

        // Best-effort status write-back; never awaited before the commit.
        let processed_ids: Vec<String> =
            result.successes.iter().map(|o| o.order_id.clone()).collect();
        if !processed_ids.is_empty() {
            let source = self.source.clone();
            let event_id = event.event_id.clone();
            tokio::spawn(async move {
                if let Err(err) = source
                    .batch_update_order_status(&processed_ids, PROCESSED_STATUS)
                    .await
                {
                    error!(%event_id, error = %err, "order status write-back failed");
                }
            });
        }

        crate::metrics::record_event("processed");
        crate::metrics::record_orders(result.successes.len(), result.failures.len());
        Ok(EventOutcome::Completed(result))
    }
}
