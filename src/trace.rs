//! Trace Propagation
//!
//! Every event carries a 32-hex trace id and a 16-hex span id through all
//! spawned tasks so log lines correlate, and the trace id is echoed on
//! outbound messages via the `X-Trace-Id` header.

use rand::Rng;
use uuid::Uuid;

pub const TRACE_HEADER: &str = "X-Trace-Id";

/// Per-event trace identity.
#[derive(Debug, Clone)]
pub struct TraceContext {
    pub trace_id: String,
    pub span_id: String,
}

impl TraceContext {
    /// Fresh trace identity for an event that arrived without headers.
    pub fn generate() -> Self {
        Self {
            trace_id: Uuid::new_v4().simple().to_string(),
            span_id: new_span_id(),
        }
    }

    /// Adopt an upstream trace id, starting a new span under it.
    pub fn from_upstream(trace_id: &str) -> Self {
        if trace_id.len() == 32 && trace_id.chars().all(|c| c.is_ascii_hexdigit()) {
            Self {
                trace_id: trace_id.to_lowercase(),
                span_id: new_span_id(),
            }
        } else {
            Self::generate()
        }
    }
}

fn new_span_id() -> String {
    let bytes: [u8; 8] = rand::thread_rng().gen();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
