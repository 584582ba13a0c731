//! Change Notifier
//!
//! Turns a committed mutation into an envelope and hands it to the sink.
//! `notify` never reports failure: the mutation has already been applied
//! and its outcome is decided, so serialization errors, sink errors and
//! timeouts are logged and counted, then dropped.

use std::sync::Arc;
use std::time::Duration;
use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};

use us_common::{
    Clock, EventEnvelope, IdGenerator, SystemClock, User, UserEvent, UuidGenerator,
};
use us_config::{DispatchMode, EventsConfig, TopicConfig};

use crate::sink::{EventSink, OutboundMessage};

pub struct ChangeNotifier {
    sink: Arc<dyn EventSink>,
    topics: TopicConfig,
    publish_timeout: Duration,
    dispatch_mode: DispatchMode,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
}

impl ChangeNotifier {
    pub fn new(sink: Arc<dyn EventSink>, topics: TopicConfig) -> Self {
        Self {
            sink,
            topics,
            publish_timeout: Duration::from_secs(5),
            dispatch_mode: DispatchMode::Background,
            clock: Arc::new(SystemClock),
            ids: Arc::new(UuidGenerator),
        }
    }

    pub fn from_config(sink: Arc<dyn EventSink>, config: &EventsConfig) -> Self {
        Self::new(sink, config.topics.clone())
            .with_publish_timeout(config.publish_timeout())
            .with_dispatch_mode(config.dispatch_mode)
    }

    pub fn with_publish_timeout(mut self, timeout: Duration) -> Self {
        self.publish_timeout = timeout;
        self
    }

    pub fn with_dispatch_mode(mut self, mode: DispatchMode) -> Self {
        self.dispatch_mode = mode;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    /// Wrap an event with a fresh id and the current time
    pub fn envelope(&self, event: UserEvent) -> EventEnvelope {
        EventEnvelope::new(event, self.ids.generate(), self.clock.now())
    }

    /// Announce a committed mutation. Best-effort; never fails.
    pub async fn notify(&self, event: UserEvent) {
        let event_type = event.event_type();
        let key = event.user_id().to_string();
        let topic = self.topics.topic_for(event_type).to_string();
        let envelope = self.envelope(event);
        let event_id = envelope.event_id().to_string();

        let payload = match envelope.to_json() {
            Ok(json) => json,
            Err(e) => {
                error!(
                    topic = %topic,
                    event_type = %event_type,
                    event_id = %event_id,
                    error = %e,
                    "Failed to serialize event"
                );
                metrics::counter!("user_events_failed_total", "topic" => topic).increment(1);
                return;
            }
        };

        let message = OutboundMessage { topic, key, payload };
        let sink = self.sink.clone();
        let timeout = self.publish_timeout;

        match self.dispatch_mode {
            DispatchMode::Inline => deliver(sink, message, timeout, event_id).await,
            DispatchMode::Background => {
                debug!(event_id = %event_id, "Dispatching event in background");
                tokio::spawn(deliver(sink, message, timeout, event_id));
            }
        }
    }

    pub async fn user_created(&self, user: &User) {
        self.notify(UserEvent::Created(user.clone())).await
    }

    pub async fn user_updated(&self, user: &User) {
        self.notify(UserEvent::Updated(user.clone())).await
    }

    pub async fn user_deleted(&self, user: &User) {
        self.notify(UserEvent::Deleted(user.clone())).await
    }

    pub async fn profile_updated(&self, user: &User, updates: &Map<String, Value>) {
        self.notify(UserEvent::ProfileUpdated {
            user: user.clone(),
            updates: updates.clone(),
        })
        .await
    }
}

/// One bounded send attempt; every outcome ends here
async fn deliver(
    sink: Arc<dyn EventSink>,
    message: OutboundMessage,
    timeout: Duration,
    event_id: String,
) {
    let topic = message.topic.clone();
    let key = message.key.clone();

    match tokio::time::timeout(timeout, sink.publish(message)).await {
        Ok(Ok(())) => {
            info!(
                sink = sink.name(),
                topic = %topic,
                user_id = %key,
                event_id = %event_id,
                "Sent event"
            );
            metrics::counter!("user_events_published_total", "topic" => topic).increment(1);
        }
        Ok(Err(e)) => {
            error!(
                sink = sink.name(),
                topic = %topic,
                user_id = %key,
                event_id = %event_id,
                error = %e,
                "Error sending event"
            );
            metrics::counter!("user_events_failed_total", "topic" => topic).increment(1);
        }
        Err(_) => {
            warn!(
                sink = sink.name(),
                topic = %topic,
                user_id = %key,
                event_id = %event_id,
                timeout_ms = timeout.as_millis() as u64,
                "Timed out sending event"
            );
            metrics::counter!("user_events_failed_total", "topic" => topic).increment(1);
        }
    }
}
