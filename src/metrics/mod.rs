//! Pipeline Metrics
//!
//! Prometheus-compatible metrics for the event pipeline:
//! - Event outcomes and per-stage latency
//! - Per-order transform successes/failures
//! - Cache hits/misses
//! - Data-access retries and dropped chunks
//! - Publish counts and failures

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Instant;

/// Metric names as constants for consistency
pub mod names {
    pub const EVENTS_TOTAL: &str = "pipeline_events_total";
    pub const STAGE_DURATION_SECONDS: &str = "pipeline_stage_duration_seconds";
    pub const ORDERS_TOTAL: &str = "pipeline_orders_total";
    pub const CACHE_HITS_TOTAL: &str = "cache_hits_total";
    pub const CACHE_MISSES_TOTAL: &str = "cache_misses_total";
    pub const DB_RETRIES_TOTAL: &str = "db_retries_total";
    pub const DB_CHUNKS_DROPPED_TOTAL: &str = "db_chunks_dropped_total";
    pub const PUBLISHES_TOTAL: &str = "queue_publishes_total";
    pub const PUBLISH_FAILURES_TOTAL: &str = "queue_publish_failures_total";
    pub const DEAD_LETTERED_ORDERS_TOTAL: &str = "dead_lettered_orders_total";
}

/// Label keys
pub mod labels {
    pub const OUTCOME: &str = "outcome";
    pub const STAGE: &str = "stage";
    pub const RESULT: &str = "result";
    pub const CACHE_TYPE: &str = "cache_type";
    pub const OPERATION: &str = "op";
    pub const READER: &str = "reader";
    pub const KIND: &str = "kind";
}

/// Initialize Prometheus metrics exporter
///
/// Returns a handle that can be used to render metrics
pub fn init_metrics() -> PrometheusHandle {
    let builder = PrometheusBuilder::new()
        // Stage latency buckets (in seconds): preload and publish touch
        // external stores, so the tail is long
        .set_buckets_for_metric(
            Matcher::Full(names::STAGE_DURATION_SECONDS.to_string()),
            &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0],
        )
        .expect("invalid histogram buckets");

    builder
        .install_recorder()
        .expect("Failed to install Prometheus recorder")
}

// ============================================================================
// Event Metrics
// ============================================================================

/// Record a finished event with its outcome
/// (processed, duplicate, skipped, no_orders, failed).
pub fn record_event(outcome: &'static str) {
    counter!(names::EVENTS_TOTAL, labels::OUTCOME => outcome).increment(1);
}

/// Record one pipeline stage duration
pub fn record_stage_duration(stage: &'static str, duration_secs: f64) {
    histogram!(names::STAGE_DURATION_SECONDS, labels::STAGE => stage).record(duration_secs);
}

/// Record per-order transform results
pub fn record_orders(successes: usize, failures: usize) {
    counter!(names::ORDERS_TOTAL, labels::RESULT => "success").increment(successes as u64);
    counter!(names::ORDERS_TOTAL, labels::RESULT => "failure").increment(failures as u64);
}

// ============================================================================
// Cache Metrics
// ============================================================================

pub fn record_cache_hit(cache_type: &'static str) {
    counter!(names::CACHE_HITS_TOTAL, labels::CACHE_TYPE => cache_type).increment(1);
}

pub fn record_cache_miss(cache_type: &'static str) {
    counter!(names::CACHE_MISSES_TOTAL, labels::CACHE_TYPE => cache_type).increment(1);
}

// ============================================================================
// Data-Access Metrics
// ============================================================================

/// Record one retry of a chunked reader call
pub fn record_db_retry(op: &'static str) {
    counter!(names::DB_RETRIES_TOTAL, labels::OPERATION => op).increment(1);
}

/// Record a chunk dropped after exhausting its retries
pub fn record_chunk_failure(reader: &'static str) {
    counter!(names::DB_CHUNKS_DROPPED_TOTAL, labels::READER => reader).increment(1);
}

// ============================================================================
// Publish Metrics
// ============================================================================

pub fn record_publish(kind: &'static str) {
    counter!(names::PUBLISHES_TOTAL, labels::KIND => kind).increment(1);
}

pub fn record_publish_failure(kind: &'static str) {
    counter!(names::PUBLISH_FAILURES_TOTAL, labels::KIND => kind).increment(1);
}

pub fn record_dead_lettered(count: usize) {
    counter!(names::DEAD_LETTERED_ORDERS_TOTAL).increment(count as u64);
}

// ============================================================================
// Timer Helper
// ============================================================================

/// Timer for measuring durations
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
