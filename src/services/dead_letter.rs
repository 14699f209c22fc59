//! Dead-Letter Sink
//!
//! Per-order transform failures are handed off here after the pipeline
//! run. The default sink only logs; the seam exists so a real DLQ topic
//! can be wired in without touching the event handler.

use async_trait::async_trait;
use tracing::warn;

use crate::error::PipelineError;
use crate::models::{FailedOrder, OrderEvent};

#[async_trait]
pub trait DeadLetterSink: Send + Sync {
    async fn publish(
        &self,
        event: &OrderEvent,
        failures: &[FailedOrder],
    ) -> Result<(), PipelineError>;
}

/// Log-only dead-letter sink.
#[derive(Default)]
pub struct LogDeadLetterSink;

impl LogDeadLetterSink {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DeadLetterSink for LogDeadLetterSink {
    async fn publish(
        &self,
        event: &OrderEvent,
        failures: &[FailedOrder],
    ) -> Result<(), PipelineError> {
        for failure in failures {
            warn!(
                event_id = %event.event_id,
                order_id = %failure.order.order_id,
                exception_type = %failure.exception_type,
                error = %failure.error_message,
                "order dead-lettered"
            );
        }
        crate::metrics::record_dead_lettered(failures.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_log_sink_accepts_failures() {
        let sink = LogDeadLetterSink::new();
        let event = OrderEvent {
            event_id: "e1".to_string(),
            event_type: "SINGLE_ORDER".to_string(),
            trading_partner_name: "ACME".to_string(),
            business_unit_name: "WEST".to_string(),
        };
        let failures = vec![FailedOrder {
            order: crate::models::Order {
                order_id: "O1".to_string(),
                customer_id: "CUST-1".to_string(),
                status: "PENDING".to_string(),
                amount: dec!(10),
                created_at: Utc::now(),
            },
            error_message: "boom".to_string(),
            exception_type: "TransformError".to_string(),
        }];
        assert!(sink.publish(&event, &failures).await.is_ok());
    }
}
