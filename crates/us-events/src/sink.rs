//! Event Sinks
//!
//! The publish-only capability the notifier sends through, plus the
//! in-process implementations.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use async_trait::async_trait;
use parking_lot::Mutex;
use thiserror::Error;
use tracing::info;
use us_common::EventEnvelope;

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Rejected by channel: HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Sink unavailable: {0}")]
    Unavailable(String),
}

/// A serialized envelope addressed to a topic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub topic: String,
    /// Message key, the user id
    pub key: String,
    /// JSON-encoded envelope
    pub payload: String,
}

#[async_trait]
pub trait EventSink: Send + Sync {
    /// Short identifier used in logs
    fn name(&self) -> &str;

    async fn publish(&self, message: OutboundMessage) -> Result<(), SinkError>;
}

/// Writes every message to the log
#[derive(Debug, Default)]
pub struct LoggingEventSink;

impl LoggingEventSink {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EventSink for LoggingEventSink {
    fn name(&self) -> &str {
        "log"
    }

    async fn publish(&self, message: OutboundMessage) -> Result<(), SinkError> {
        info!(
            topic = %message.topic,
            key = %message.key,
            payload = %message.payload,
            "Event published"
        );
        Ok(())
    }
}

/// Discards everything
#[derive(Debug, Default)]
pub struct NoopEventSink;

#[async_trait]
impl EventSink for NoopEventSink {
    fn name(&self) -> &str {
        "none"
    }

    async fn publish(&self, _message: OutboundMessage) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Keeps published messages in memory.
///
/// Can be told to fail or stall so callers can observe how failures are
/// absorbed.
#[derive(Debug, Default)]
pub struct InMemoryEventSink {
    published: Mutex<Vec<OutboundMessage>>,
    failing: AtomicBool,
    delay: Mutex<Option<Duration>>,
}

impl InMemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every publish fails with [`SinkError::Unavailable`] while set
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Sleep before each publish
    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock() = delay;
    }

    pub fn messages(&self) -> Vec<OutboundMessage> {
        self.published.lock().clone()
    }

    pub fn messages_for(&self, topic: &str) -> Vec<OutboundMessage> {
        self.published
            .lock()
            .iter()
            .filter(|m| m.topic == topic)
            .cloned()
            .collect()
    }

    /// Decode every stored payload back into an envelope.
    /// Payloads that fail to decode are skipped.
    pub fn envelopes(&self) -> Vec<EventEnvelope> {
        self.published
            .lock()
            .iter()
            .filter_map(|m| serde_json::from_str(&m.payload).ok())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.published.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.published.lock().is_empty()
    }

    pub fn clear(&self) {
        self.published.lock().clear();
    }
}

#[async_trait]
impl EventSink for InMemoryEventSink {
    fn name(&self) -> &str {
        "memory"
    }

    async fn publish(&self, message: OutboundMessage) -> Result<(), SinkError> {
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing.load(Ordering::SeqCst) {
            return Err(SinkError::Unavailable("in-memory sink set to fail".to_string()));
        }

        self.published.lock().push(message);
        Ok(())
    }
}
