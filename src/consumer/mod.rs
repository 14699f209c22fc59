//! Kafka Event Consumer
//!
//! Pulls order events off the input topic with auto-commit disabled. The
//! offset for a record is committed only after the handler finishes the
//! whole pipeline for it; a fatal pipeline error seeks back to the record
//! so the broker redelivers it. Payloads that cannot be parsed are logged
//! and committed, since redelivery can never fix them.

use std::sync::Arc;
use std::time::Duration;

use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::{BorrowedMessage, Headers, Message};
use rdkafka::Offset;
use tracing::{error, info, info_span, warn, Instrument};

use crate::config::KafkaConfig;
use crate::error::PipelineError;
use crate::models::OrderEvent;
use crate::services::EventHandler;
use crate::trace::{TraceContext, TRACE_HEADER};

/// Pause before retrying a record that failed fatally.
const REDELIVERY_BACKOFF: Duration = Duration::from_secs(1);

pub struct EventConsumer {
    consumer: StreamConsumer,
    handler: Arc<EventHandler>,
}

impl EventConsumer {
    pub fn new(cfg: &KafkaConfig, handler: Arc<EventHandler>) -> Result<Self, PipelineError> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &cfg.brokers)
            .set("group.id", &cfg.group_id)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest")
            .set("session.timeout.ms", "30000")
            .set("max.poll.interval.ms", "300000")
            .set("enable.partition.eof", "false")
            .create()
            .map_err(|e| PipelineError::Kafka(format!("failed to create consumer: {}", e)))?;

        consumer
            .subscribe(&[&cfg.topic])
            .map_err(|e| PipelineError::Kafka(format!("failed to subscribe: {}", e)))?;

        info!(
            brokers = %cfg.brokers,
            topic = %cfg.topic,
            group = %cfg.group_id,
            "kafka consumer initialized"
        );

        Ok(Self { consumer, handler })
    }

    /// Consume forever. Driver-level receive errors back off and retry.
    pub async fn run(&self) -> Result<(), PipelineError> {
        loop {
            match self.consumer.recv().await {
                Ok(message) => self.process_record(&message).await,
                Err(err) => {
                    error!(error = %err, "kafka receive error");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    }

    async fn process_record(&self, message: &BorrowedMessage<'_>) {
        let payload = match message.payload() {
            Some(payload) => payload,
            None => {
                warn!(
                    offset = message.offset(),
                    partition = message.partition(),
                    "empty record payload, committing past it"
                );
                self.commit(message);
                return;
            }
        };

        let event: OrderEvent = match serde_json::from_slice(payload) {
            Ok(event) => event,
            Err(err) => {
                warn!(
                    offset = message.offset(),
                    partition = message.partition(),
                    error = %err,
                    "unparseable event payload, committing past it"
                );
                self.commit(message);
                return;
            }
        };

        let trace = match upstream_trace_id(message) {
            Some(id) => TraceContext::from_upstream(&id),
            None => TraceContext::generate(),
        };
        let span = info_span!(
            "order_event",
            event_id = %event.event_id,
            event_type = %event.event_type,
            trace_id = %trace.trace_id,
            span_id = %trace.span_id,
        );

        let outcome = self
            .handler
            .handle(&event, &trace.trace_id)
            .instrument(span)
            .await;

        match outcome {
            Ok(outcome) => {
                info!(
                    event_id = %event.event_id,
                    trace_id = %trace.trace_id,
                    outcome = outcome_label(&outcome),
                    "event finished, committing offset"
                );
                self.commit(message);
            }
            Err(err) => {
                error!(
                    event_id = %event.event_id,
                    trace_id = %trace.trace_id,
                    error = %err,
                    "event failed, offset not committed"
                );
                crate::metrics::record_event("failed");
                // Rewind so the next poll redelivers this record.
                if let Err(seek_err) = self.consumer.seek(
                    message.topic(),
                    message.partition(),
                    Offset::Offset(message.offset()),
                    Duration::from_secs(5),
                ) {
                    error!(error = %seek_err, "seek back to failed record failed");
                }
                tokio::time::sleep(REDELIVERY_BACKOFF).await;
            }
        }
    }

    fn commit(&self, message: &BorrowedMessage<'_>) {
        if let Err(err) = self.consumer.commit_message(message, CommitMode::Sync) {
            // At-least-once: an uncommitted success only risks a
            // redelivery, which dedup absorbs.
            error!(
                offset = message.offset(),
                partition = message.partition(),
                error = %err,
                "offset commit failed"
            );
        }
    }
}

fn upstream_trace_id(message: &BorrowedMessage<'_>) -> Option<String> {
    let headers = message.headers()?;
    for header in headers.iter() {
        if header.key.eq_ignore_ascii_case(TRACE_HEADER) {
            return header
                .value
                .and_then(|v| std::str::from_utf8(v).ok())
                .map(|s| s.to_string());
        }
    }
    None
}

fn outcome_label(outcome: &crate::services::EventOutcome) -> &'static str {
    use crate::services::EventOutcome::*;
    match outcome {
        Duplicate => "duplicate",
        Skipped(_) => "skipped",
        NoOrders => "no_orders",
        Completed(_) => "completed",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_labels() {
        assert_eq!(outcome_label(&crate::services::EventOutcome::Duplicate), "duplicate");
        assert_eq!(
            outcome_label(&crate::services::EventOutcome::NoOrders),
            "no_orders"
        );
    }

    #[test]
    fn test_event_payload_parsing_matches_topic_schema() {
        let payload = br#"{
            "eventId": "evt-9",
            "eventType": "PROCESS_ORDERS",
            "tradingPartnerName": "ACME",
            "businessUnitName": "WEST"
        }"#;
        let event: OrderEvent = serde_json::from_slice(payload).unwrap();
        assert_eq!(event.event_id, "evt-9");
        assert!(!event.is_grouped());
    }
}
