//! HTTP Event Sink
//!
//! Posts each envelope to a topic endpoint on an HTTP event gateway
//! (`POST {base_url}/topics/{topic}`), e.g. a Kafka REST proxy or webhook
//! relay. The message key travels in the `X-Event-Key` header.

use std::time::Duration;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, warn};

use crate::sink::{EventSink, OutboundMessage, SinkError};

pub const EVENT_KEY_HEADER: &str = "X-Event-Key";

#[derive(Debug, Clone)]
pub struct HttpSinkConfig {
    /// Gateway base URL, without trailing slash
    pub base_url: String,
    /// Optional Bearer token
    pub api_token: Option<String>,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for HttpSinkConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8082".to_string(),
            api_token: None,
            connect_timeout: Duration::from_secs(2),
            request_timeout: Duration::from_secs(5),
        }
    }
}

pub struct HttpEventSink {
    config: HttpSinkConfig,
    client: reqwest::Client,
}

impl HttpEventSink {
    pub fn new(config: HttpSinkConfig) -> Result<Self, SinkError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| SinkError::Transport(e.to_string()))?;

        Ok(Self { config, client })
    }

    pub fn topic_url(&self, topic: &str) -> String {
        format!(
            "{}/topics/{}",
            self.config.base_url.trim_end_matches('/'),
            topic.trim_start_matches('/')
        )
    }
}

#[async_trait]
impl EventSink for HttpEventSink {
    fn name(&self) -> &str {
        "http"
    }

    async fn publish(&self, message: OutboundMessage) -> Result<(), SinkError> {
        let url = self.topic_url(&message.topic);
        debug!(url = %url, key = %message.key, "Posting event");

        let mut request = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .header(EVENT_KEY_HEADER, &message.key)
            .body(message.payload);

        if let Some(ref token) = self.config.api_token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        let response = request
            .send()
            .await
            .map_err(|e| SinkError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        warn!(status = %status, body = %body, "Event gateway rejected message");
        Err(SinkError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}
