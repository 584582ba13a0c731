use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use utoipa::ToSchema;

/// Status assigned to users that do not carry one
pub const DEFAULT_STATUS: &str = "ACTIVE";

// ============================================================================
// User Records
// ============================================================================

/// A stored user record.
///
/// Values of this type handed out by the store are snapshots; mutating one
/// never touches the authoritative copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "userId")]
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone_number: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Build a record from a candidate, stamping both timestamps with `now`
    pub fn from_candidate(id: String, candidate: NewUser, now: DateTime<Utc>) -> Self {
        let status = candidate.status_or_default();
        Self {
            id,
            name: candidate.name,
            email: candidate.email,
            phone_number: candidate.phone_number,
            status,
            created_at: now,
            updated_at: now,
        }
    }

    /// Replace every mutable field from a full replacement body.
    /// Identifier and creation time are left alone.
    pub fn apply_replacement(&mut self, replacement: NewUser, now: DateTime<Utc>) {
        self.status = replacement.status_or_default();
        self.name = replacement.name;
        self.email = replacement.email;
        self.phone_number = replacement.phone_number;
        self.updated_at = now;
    }

    /// Apply only the fields present in a profile update
    pub fn apply_profile(&mut self, update: &ProfileUpdate, now: DateTime<Utc>) {
        if let Some(name) = &update.name {
            self.name = name.clone();
        }
        if let Some(phone_number) = &update.phone_number {
            self.phone_number = phone_number.clone();
        }
        self.updated_at = now;
    }
}

/// Candidate record for create and full update.
///
/// Every field is optional on the wire so that missing values reach
/// validation instead of failing deserialization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    #[serde(default, rename = "userId", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl NewUser {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_phone_number(mut self, phone_number: impl Into<String>) -> Self {
        self.phone_number = Some(phone_number.into());
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn status_or_default(&self) -> String {
        self.status
            .clone()
            .unwrap_or_else(|| DEFAULT_STATUS.to_string())
    }
}

/// Rejected profile field
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Field '{field}' must be {expected}")]
pub struct InvalidProfileField {
    pub field: &'static str,
    pub expected: &'static str,
}

/// Typed view over a partial profile map.
///
/// Recognized keys are `name` and `phoneNumber`; anything else is ignored.
/// `phone_number` is doubly optional so that an explicit `null` clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub phone_number: Option<Option<String>>,
}

impl ProfileUpdate {
    pub fn from_map(map: &Map<String, Value>) -> Result<Self, InvalidProfileField> {
        let name = match map.get("name") {
            None => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(_) => {
                return Err(InvalidProfileField { field: "name", expected: "a string" });
            }
        };

        let phone_number = match map.get("phoneNumber") {
            None => None,
            Some(Value::Null) => Some(None),
            Some(Value::String(s)) => Some(Some(s.clone())),
            Some(_) => {
                return Err(InvalidProfileField {
                    field: "phoneNumber",
                    expected: "a string or null",
                });
            }
        };

        Ok(Self { name, phone_number })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_phone_number(mut self, phone_number: impl Into<String>) -> Self {
        self.phone_number = Some(Some(phone_number.into()));
        self
    }

    /// True when no recognized field is present
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.phone_number.is_none()
    }
}

// ============================================================================
// Change Events
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum UserEventType {
    UserCreated,
    UserUpdated,
    UserDeleted,
    ProfileUpdated,
}

impl UserEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserEventType::UserCreated => "UserCreated",
            UserEventType::UserUpdated => "UserUpdated",
            UserEventType::UserDeleted => "UserDeleted",
            UserEventType::ProfileUpdated => "ProfileUpdated",
        }
    }
}

impl fmt::Display for UserEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A committed mutation, ready to be announced
#[derive(Debug, Clone, PartialEq)]
pub enum UserEvent {
    Created(User),
    Updated(User),
    Deleted(User),
    ProfileUpdated {
        user: User,
        updates: Map<String, Value>,
    },
}

impl UserEvent {
    pub fn event_type(&self) -> UserEventType {
        match self {
            UserEvent::Created(_) => UserEventType::UserCreated,
            UserEvent::Updated(_) => UserEventType::UserUpdated,
            UserEvent::Deleted(_) => UserEventType::UserDeleted,
            UserEvent::ProfileUpdated { .. } => UserEventType::ProfileUpdated,
        }
    }

    pub fn user_id(&self) -> &str {
        match self {
            UserEvent::Created(u) | UserEvent::Updated(u) | UserEvent::Deleted(u) => &u.id,
            UserEvent::ProfileUpdated { user, .. } => &user.id,
        }
    }

    /// Select the payload shape for this event type
    pub fn into_payload(self) -> EventPayload {
        match self {
            UserEvent::Created(user) | UserEvent::Updated(user) => EventPayload::Record(user),
            UserEvent::Deleted(user) => EventPayload::Deleted(DeletedPayload {
                user_id: user.id,
                email: user.email,
            }),
            UserEvent::ProfileUpdated { user, updates } => {
                EventPayload::Profile(ProfileUpdatedPayload {
                    user_id: user.id,
                    updates,
                })
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedPayload {
    pub user_id: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdatedPayload {
    pub user_id: String,
    pub updates: Map<String, Value>,
}

/// Event data, shaped by event type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventPayload {
    Record(User),
    Deleted(DeletedPayload),
    Profile(ProfileUpdatedPayload),
}

/// Envelope sent to the event channel.
///
/// Fields are private; an envelope does not change after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEnvelope {
    event_type: UserEventType,
    event_id: String,
    timestamp: DateTime<Utc>,
    data: EventPayload,
}

impl EventEnvelope {
    pub fn new(event: UserEvent, event_id: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            event_type: event.event_type(),
            event_id: event_id.into(),
            timestamp,
            data: event.into_payload(),
        }
    }

    pub fn event_type(&self) -> UserEventType {
        self.event_type
    }

    pub fn event_id(&self) -> &str {
        &self.event_id
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn data(&self) -> &EventPayload {
        &self.data
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

// ============================================================================
// Clock and Identifier Capabilities
// ============================================================================

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for tests
#[derive(Debug)]
pub struct FixedClock {
    now: parking_lot::Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now: parking_lot::Mutex::new(now) }
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock();
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// Source of user ids. Successive calls should yield distinct values;
/// the store gives up after a bounded number of taken ids.
pub trait IdGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// Random UUID v4 identifiers
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn generate(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

/// Predictable `{prefix}{n}` identifiers, starting at 1
#[derive(Debug)]
pub struct SequentialIdGenerator {
    prefix: String,
    next: AtomicU64,
}

impl SequentialIdGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(1),
        }
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn generate(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        format!("{}{}", self.prefix, n)
    }
}
