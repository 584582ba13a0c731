//! User Change Events
//!
//! Announces committed user mutations to downstream consumers:
//! - Envelope construction (event id, capture time, payload by event type)
//! - Topic selection per event type
//! - Best-effort dispatch through an [`EventSink`], with failures logged and swallowed
//!
//! Delivery is at-most-once. Nothing here retries, orders, or waits for
//! consumer acknowledgment.

pub mod sink;
pub mod http_sink;
pub mod notifier;

pub use sink::{
    EventSink, SinkError, OutboundMessage,
    LoggingEventSink, NoopEventSink, InMemoryEventSink,
};
pub use http_sink::{HttpEventSink, HttpSinkConfig};
pub use notifier::ChangeNotifier;

use std::sync::Arc;
use tracing::info;
use us_config::{EventsConfig, SinkKind};

/// Create the sink selected by configuration
pub fn create_sink(config: &EventsConfig) -> Result<Arc<dyn EventSink>, SinkError> {
    match config.sink {
        SinkKind::Log => {
            info!("Using logging event sink");
            Ok(Arc::new(LoggingEventSink::new()))
        }
        SinkKind::Http => {
            let url = config.sink_url.as_ref()
                .ok_or_else(|| SinkError::Unavailable("HTTP sink requires events.sink_url".to_string()))?;
            info!(url = %url, "Using HTTP event sink");
            let sink = HttpEventSink::new(HttpSinkConfig {
                base_url: url.clone(),
                api_token: config.sink_token.clone(),
                request_timeout: config.publish_timeout(),
                ..HttpSinkConfig::default()
            })?;
            Ok(Arc::new(sink))
        }
        SinkKind::None => {
            info!("Event publishing disabled");
            Ok(Arc::new(NoopEventSink))
        }
    }
}
