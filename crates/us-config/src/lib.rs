//! User Service Configuration
//!
//! Configuration is layered:
//! 1. Built-in defaults
//! 2. Optional TOML file
//! 3. `US_*` environment variables
//!
//! ## Environment Variables
//!
//! | Variable | Section key |
//! |----------|-------------|
//! | `US_BIND_ADDRESS` | `server.bind_address` |
//! | `US_API_PORT` | `server.api_port` |
//! | `US_METRICS_PORT` | `server.metrics_port` |
//! | `US_EVENT_SINK` | `events.sink` (`log`, `http`, `none`) |
//! | `US_EVENT_SINK_URL` | `events.sink_url` |
//! | `US_EVENT_SINK_TOKEN` | `events.sink_token` |
//! | `US_PUBLISH_TIMEOUT_MS` | `events.publish_timeout_ms` |
//! | `US_DISPATCH_MODE` | `events.dispatch_mode` (`background`, `inline`) |
//! | `US_TOPIC_USER_CREATED` | `events.topics.user_created` |
//! | `US_TOPIC_USER_UPDATED` | `events.topics.user_updated` |
//! | `US_TOPIC_USER_DELETED` | `events.topics.user_deleted` |
//! | `US_TOPIC_PROFILE_UPDATED` | `events.topics.profile_updated` |
//! | `US_CONFLICT_POLICY` | `store.conflict_policy` (`reject`, `overwrite`, `regenerate`) |
//! | `US_NON_POSITIVE_LIMIT` | `store.non_positive_limit` (`empty`, `use_default`) |
//! | `US_DEFAULT_PAGE_LIMIT` | `store.default_page_limit` |
//! | `US_SEED_SAMPLE_DATA` | `store.seed_sample_data` |

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use us_common::UserEventType;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Missing required setting: {0}")]
    Missing(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

// ============================================================================
// Policy Enums
// ============================================================================

/// Which event sink receives published envelopes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkKind {
    #[default]
    Log,
    Http,
    None,
}

impl FromStr for SinkKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "log" => Ok(Self::Log),
            "http" => Ok(Self::Http),
            "none" => Ok(Self::None),
            other => Err(other.to_string()),
        }
    }
}

/// Whether the notifier waits for the bounded send before returning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    #[default]
    Background,
    Inline,
}

impl FromStr for DispatchMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "background" => Ok(Self::Background),
            "inline" => Ok(Self::Inline),
            other => Err(other.to_string()),
        }
    }
}

/// What create does when a caller-supplied id is already taken
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    #[default]
    Reject,
    Overwrite,
    Regenerate,
}

impl FromStr for ConflictPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "reject" => Ok(Self::Reject),
            "overwrite" => Ok(Self::Overwrite),
            "regenerate" => Ok(Self::Regenerate),
            other => Err(other.to_string()),
        }
    }
}

/// How list treats a zero or negative limit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NonPositiveLimit {
    #[default]
    Empty,
    UseDefault,
}

impl FromStr for NonPositiveLimit {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "empty" => Ok(Self::Empty),
            "use_default" => Ok(Self::UseDefault),
            other => Err(other.to_string()),
        }
    }
}

// ============================================================================
// Sections
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub api_port: u16,
    pub metrics_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            api_port: 8080,
            metrics_port: 9090,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopicConfig {
    pub user_created: String,
    pub user_updated: String,
    pub user_deleted: String,
    pub profile_updated: String,
}

impl Default for TopicConfig {
    fn default() -> Self {
        Self {
            user_created: "user/created".to_string(),
            user_updated: "user/updated".to_string(),
            user_deleted: "user/deleted".to_string(),
            profile_updated: "user/profile-updated".to_string(),
        }
    }
}

impl TopicConfig {
    pub fn topic_for(&self, event_type: UserEventType) -> &str {
        match event_type {
            UserEventType::UserCreated => &self.user_created,
            UserEventType::UserUpdated => &self.user_updated,
            UserEventType::UserDeleted => &self.user_deleted,
            UserEventType::ProfileUpdated => &self.profile_updated,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    pub sink: SinkKind,
    pub sink_url: Option<String>,
    /// Bearer token for the HTTP sink
    pub sink_token: Option<String>,
    pub publish_timeout_ms: u64,
    pub dispatch_mode: DispatchMode,
    pub topics: TopicConfig,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            sink: SinkKind::Log,
            sink_url: None,
            sink_token: None,
            publish_timeout_ms: 5000,
            dispatch_mode: DispatchMode::Background,
            topics: TopicConfig::default(),
        }
    }
}

impl EventsConfig {
    pub fn publish_timeout(&self) -> Duration {
        Duration::from_millis(self.publish_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub conflict_policy: ConflictPolicy,
    pub non_positive_limit: NonPositiveLimit,
    pub default_page_limit: i64,
    pub seed_sample_data: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            conflict_policy: ConflictPolicy::Reject,
            non_positive_limit: NonPositiveLimit::Empty,
            default_page_limit: 10,
            seed_sample_data: true,
        }
    }
}

// ============================================================================
// Top-level Config
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub events: EventsConfig,
    pub store: StoreConfig,
}

impl AppConfig {
    /// Load defaults, then the TOML file if given, then environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        debug!(path = %path.display(), "Loaded config file");
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply `US_*` overrides from an arbitrary lookup
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("US_BIND_ADDRESS") {
            self.server.bind_address = v;
        }
        override_parsed(&lookup, "US_API_PORT", &mut self.server.api_port)?;
        override_parsed(&lookup, "US_METRICS_PORT", &mut self.server.metrics_port)?;

        override_parsed(&lookup, "US_EVENT_SINK", &mut self.events.sink)?;
        if let Some(v) = lookup("US_EVENT_SINK_URL") {
            self.events.sink_url = Some(v);
        }
        if let Some(v) = lookup("US_EVENT_SINK_TOKEN") {
            self.events.sink_token = Some(v);
        }
        override_parsed(&lookup, "US_PUBLISH_TIMEOUT_MS", &mut self.events.publish_timeout_ms)?;
        override_parsed(&lookup, "US_DISPATCH_MODE", &mut self.events.dispatch_mode)?;

        let topics = &mut self.events.topics;
        for (key, slot) in [
            ("US_TOPIC_USER_CREATED", &mut topics.user_created),
            ("US_TOPIC_USER_UPDATED", &mut topics.user_updated),
            ("US_TOPIC_USER_DELETED", &mut topics.user_deleted),
            ("US_TOPIC_PROFILE_UPDATED", &mut topics.profile_updated),
        ] {
            if let Some(v) = lookup(key) {
                *slot = v;
            }
        }

        override_parsed(&lookup, "US_CONFLICT_POLICY", &mut self.store.conflict_policy)?;
        override_parsed(&lookup, "US_NON_POSITIVE_LIMIT", &mut self.store.non_positive_limit)?;
        override_parsed(&lookup, "US_DEFAULT_PAGE_LIMIT", &mut self.store.default_page_limit)?;
        if let Some(v) = lookup("US_SEED_SAMPLE_DATA") {
            self.store.seed_sample_data = parse_bool("US_SEED_SAMPLE_DATA", &v)?;
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.events.sink == SinkKind::Http && self.events.sink_url.is_none() {
            return Err(ConfigError::Missing("events.sink_url".to_string()));
        }
        if self.events.publish_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "events.publish_timeout_ms".to_string(),
                value: "0".to_string(),
            });
        }
        if self.store.default_page_limit <= 0 {
            return Err(ConfigError::InvalidValue {
                key: "store.default_page_limit".to_string(),
                value: self.store.default_page_limit.to_string(),
            });
        }
        Ok(())
    }
}

fn override_parsed<F, T>(lookup: &F, key: &str, slot: &mut T) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    if let Some(raw) = lookup(key) {
        *slot = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw.clone(),
        })?;
    }
    Ok(())
}

fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw.to_string(),
        }),
    }
}
