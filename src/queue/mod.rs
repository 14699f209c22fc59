//! Downstream Queue Seam
//!
//! The publisher emits serialized messages through a `QueueSink`. The real
//! queue client lives outside the core; when `app.wmq.enabled` is false
//! the logging sink stands in, and tests use the recording sink.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::error::PipelineError;
use crate::trace::TRACE_HEADER;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue send failed: {0}")]
    Send(String),
}

impl From<QueueError> for PipelineError {
    fn from(err: QueueError) -> Self {
        PipelineError::Publish(err.to_string())
    }
}

/// Publish shape of one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Grouped,
    Individual,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Grouped => "grouped",
            MessageKind::Individual => "individual",
        }
    }
}

/// One serialized message bound for the downstream queue.
#[derive(Debug, Clone)]
pub struct OutboundMessage {
    pub kind: MessageKind,
    pub body: String,
    pub headers: HashMap<String, String>,
}

impl OutboundMessage {
    pub fn new(kind: MessageKind, body: String, trace_id: &str) -> Self {
        let mut headers = HashMap::new();
        headers.insert(TRACE_HEADER.to_string(), trace_id.to_string());
        Self {
            kind,
            body,
            headers,
        }
    }
}

#[async_trait]
pub trait QueueSink: Send + Sync {
    async fn send(&self, message: &OutboundMessage) -> Result<(), QueueError>;
}

/// Sink used when the queue is disabled: logs the payload and counts it.
#[derive(Default)]
pub struct LoggingQueueSink {
    sent: AtomicU64,
}

impl LoggingQueueSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent_count(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl QueueSink for LoggingQueueSink {
    async fn send(&self, message: &OutboundMessage) -> Result<(), QueueError> {
        self.sent.fetch_add(1, Ordering::Relaxed);
        debug!(
            kind = message.kind.as_str(),
            trace_id = message.headers.get(TRACE_HEADER).map(String::as_str).unwrap_or(""),
            bytes = message.body.len(),
            "queue disabled, message logged"
        );
        Ok(())
    }
}

/// Sink that captures messages for assertions; can be told to fail.
#[derive(Default)]
pub struct RecordingQueueSink {
    messages: Mutex<Vec<OutboundMessage>>,
    fail_all: bool,
}

impl RecordingQueueSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            messages: Mutex::new(Vec::new()),
            fail_all: true,
        }
    }

    pub fn messages(&self) -> Vec<OutboundMessage> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl QueueSink for RecordingQueueSink {
    async fn send(&self, message: &OutboundMessage) -> Result<(), QueueError> {
        if self.fail_all {
            return Err(QueueError::Send("recording sink set to fail".to_string()));
        }
        self.messages.lock().unwrap().push(message.clone());
        Ok(())
    }
}
