//! Data-Access Retry
//!
//! Wraps each chunked driver call in a bounded retry loop with exponential
//! backoff and uniform jitter. Backoff for attempt n is
//! `retry_delay_ms * 2^(n-1)` plus jitter in `[0, min(1000, base))`,
//! capped at 60 seconds.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, warn};

use crate::config::DbTuningConfig;
use crate::error::PipelineError;

/// Hard ceiling on a single backoff sleep.
const MAX_BACKOFF_MS: u64 = 60_000;
/// Ceiling on the jitter band.
const MAX_JITTER_MS: u64 = 1_000;

/// Backoff base (pre-jitter) before retry number `attempt` (1-based).
pub fn backoff_base_ms(retry_delay_ms: u64, attempt: u32) -> u64 {
    let factor = 1u64 << (attempt.saturating_sub(1)).min(16);
    retry_delay_ms.saturating_mul(factor).min(MAX_BACKOFF_MS)
}

/// Backoff with jitter applied, still respecting the hard ceiling.
pub fn backoff_with_jitter(retry_delay_ms: u64, attempt: u32) -> Duration {
    let base = backoff_base_ms(retry_delay_ms, attempt);
    let jitter_band = base.min(MAX_JITTER_MS);
    let jitter = if jitter_band == 0 {
        0
    } else {
        rand::thread_rng().gen_range(0..jitter_band)
    };
    Duration::from_millis(base.saturating_add(jitter).min(MAX_BACKOFF_MS))
}

/// Run `op` with up to `max_retries` retries on transient errors.
///
/// Total attempts are `max_retries + 1`. Non-retryable driver errors
/// surface immediately; retryable errors that outlive the budget surface
/// as `ExhaustedData`. Task cancellation aborts the backoff sleep because
/// the sleep itself is a cancellation point.
pub async fn with_retry<T, F, Fut>(
    op_name: &'static str,
    cfg: DbTuningConfig,
    mut op: F,
) -> Result<T, PipelineError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, sqlx::Error>>,
{
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(op = op_name, attempt, "data access recovered after retry");
                }
                return Ok(value);
            }
            Err(err) if !PipelineError::is_transient_sqlx(&err) => {
                return Err(PipelineError::Database(err));
            }
            Err(err) if attempt > cfg.max_retries => {
                return Err(PipelineError::ExhaustedData {
                    attempts: attempt,
                    source: err,
                });
            }
            Err(err) => {
                let delay = backoff_with_jitter(cfg.retry_delay_ms, attempt);
                warn!(
                    op = op_name,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "transient data access error, backing off"
                );
                crate::metrics::record_db_retry(op_name);
                tokio::time::sleep(delay).await;
            }
        }
    }
}
