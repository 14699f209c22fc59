//! Pending-Order Sources
//!
//! The document-store seam the pipeline fetches pending orders through.
//! A failed fetch is fatal for the event so the offset is never committed.

pub mod mock;
pub mod mongo;

use async_trait::async_trait;
use thiserror::Error;

use crate::error::PipelineError;
use crate::models::{Order, OrderEvent};

pub use mock::MockOrderSource;
pub use mongo::MongoOrderSource;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("document store error: {0}")]
    Store(#[from] mongodb::error::Error),

    #[error("malformed order document: {0}")]
    Malformed(String),
}

impl From<FetchError> for PipelineError {
    fn from(err: FetchError) -> Self {
        PipelineError::Fetch(err.to_string())
    }
}

/// Source of pending orders for an event scope.
#[async_trait]
pub trait OrderSource: Send + Sync {
    /// Resolve the event's scope to its pending orders.
    ///
    /// Resolution ladder by presence: (partner ∧ unit) → partner → unit →
    /// oldest-first cap of pending orders. All variants filter to
    /// `status == "PENDING"`.
    async fn fetch_orders_for_event(&self, event: &OrderEvent) -> Result<Vec<Order>, FetchError>;

    /// Best-effort multi-document status update. Not on the critical path;
    /// callers fire it without awaiting before commit.
    async fn batch_update_order_status(
        &self,
        ids: &[String],
        status: &str,
    ) -> Result<u64, FetchError>;
}
