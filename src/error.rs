//! Pipeline Error Taxonomy
//!
//! One typed error per failure class. Transient errors are retried close to
//! the driver call; exhausted chunks degrade to absent keys; fetch and
//! uncaught errors are fatal for the event and prevent the offset commit.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// A relational read failed in a way retrying cannot fix.
    #[error("data access error: {0}")]
    Database(#[from] sqlx::Error),

    /// Retries exceeded for one chunk; the partial result is still usable.
    #[error("data access retries exhausted after {attempts} attempts: {source}")]
    ExhaustedData {
        attempts: u32,
        #[source]
        source: sqlx::Error,
    },

    /// Document-store read failed. Fatal for the event.
    #[error("order fetch failed: {0}")]
    Fetch(String),

    /// Per-order transform failure. Collected, never fatal for the batch.
    #[error("transform failed for order {order_id}: {message}")]
    Transform { order_id: String, message: String },

    /// Per-message send failure. Counted and logged, never fatal.
    #[error("publish failed: {0}")]
    Publish(String),

    /// Consumer driver failure.
    #[error("kafka error: {0}")]
    Kafka(String),

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Anything else uncaught on the event path; prevents the commit.
    #[error("fatal pipeline error: {0}")]
    Fatal(String),
}

impl PipelineError {
    /// Classify a driver error as retryable or not.
    ///
    /// Row/column decoding problems are programming errors and retrying
    /// them cannot help; everything else coming out of the pool or the
    /// wire is treated as transient.
    pub fn is_transient_sqlx(err: &sqlx::Error) -> bool {
        !matches!(
            err,
            sqlx::Error::RowNotFound
                | sqlx::Error::ColumnNotFound(_)
                | sqlx::Error::ColumnDecode { .. }
                | sqlx::Error::Decode(_)
                | sqlx::Error::TypeNotFound { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_errors_are_not_transient() {
        assert!(!PipelineError::is_transient_sqlx(&sqlx::Error::RowNotFound));
        assert!(!PipelineError::is_transient_sqlx(&sqlx::Error::ColumnNotFound(
            "tier".to_string()
        )));
    }

    #[test]
    fn test_pool_errors_are_transient() {
        assert!(PipelineError::is_transient_sqlx(&sqlx::Error::PoolTimedOut));
    }
}
