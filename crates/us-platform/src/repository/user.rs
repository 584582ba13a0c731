//! User Repository
//!
//! The record store: the authoritative map from user id to user record.
//!
//! The in-memory implementation keeps everything in one `IndexMap` behind a
//! `parking_lot::RwLock`. Each operation is a single critical section, so
//! callers always observe a whole operation or none of it. Records leave the
//! store as clones and never alias the stored copy.

use std::sync::Arc;
use async_trait::async_trait;
use indexmap::IndexMap;
use parking_lot::RwLock;
use thiserror::Error;

use us_common::{Clock, IdGenerator, NewUser, ProfileUpdate, SystemClock, User, UuidGenerator};
use us_config::{ConflictPolicy, NonPositiveLimit, StoreConfig};

/// Draws from the id generator before `create` gives up
pub const MAX_ID_ATTEMPTS: usize = 32;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("User {id} already exists")]
    Conflict { id: String },

    #[error("No unused user id after {attempts} attempts")]
    IdsExhausted { attempts: usize },
}

/// How `list` treats a zero or negative limit.
///
/// Store-side form of `NonPositiveLimit` with the default page size
/// already resolved, so the store never reads config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListPolicy {
    EmptyOnNonPositive,
    ClampToDefault(usize),
}

impl Default for ListPolicy {
    fn default() -> Self {
        Self::EmptyOnNonPositive
    }
}

impl ListPolicy {
    pub fn from_config(config: &StoreConfig) -> Self {
        match config.non_positive_limit {
            NonPositiveLimit::Empty => Self::EmptyOnNonPositive,
            NonPositiveLimit::UseDefault => {
                Self::ClampToDefault(usize::try_from(config.default_page_limit).unwrap_or(0))
            }
        }
    }

    pub fn effective_limit(&self, limit: i64) -> usize {
        if limit > 0 {
            return usize::try_from(limit).unwrap_or(usize::MAX);
        }
        match self {
            Self::EmptyOnNonPositive => 0,
            Self::ClampToDefault(n) => *n,
        }
    }
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Up to `limit` records after skipping `offset`, in insertion order
    async fn list(&self, limit: i64, offset: i64) -> Vec<User>;

    async fn count(&self) -> usize;

    /// The limit and offset `list` applies for these arguments
    fn page_bounds(&self, limit: i64, offset: i64) -> (i64, i64);

    async fn get_by_id(&self, id: &str) -> Option<User>;

    /// Insert a new record. Fails only on an id collision under
    /// [`ConflictPolicy::Reject`].
    async fn create(&self, candidate: NewUser) -> Result<User, StoreError>;

    /// Overwrite name, email, phone number and status
    async fn update(&self, id: &str, replacement: NewUser) -> Option<User>;

    async fn update_profile(&self, id: &str, update: &ProfileUpdate) -> Option<User>;

    /// Remove and return the record
    async fn delete(&self, id: &str) -> Option<User>;
}

pub struct InMemoryUserRepository {
    users: RwLock<IndexMap<String, User>>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    conflict_policy: ConflictPolicy,
    list_policy: ListPolicy,
}

impl Default for InMemoryUserRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self {
            users: RwLock::new(IndexMap::new()),
            clock: Arc::new(SystemClock),
            ids: Arc::new(UuidGenerator),
            conflict_policy: ConflictPolicy::default(),
            list_policy: ListPolicy::default(),
        }
    }

    pub fn from_config(config: &StoreConfig) -> Self {
        Self::new()
            .with_conflict_policy(config.conflict_policy)
            .with_list_policy(ListPolicy::from_config(config))
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn with_conflict_policy(mut self, policy: ConflictPolicy) -> Self {
        self.conflict_policy = policy;
        self
    }

    pub fn with_list_policy(mut self, policy: ListPolicy) -> Self {
        self.list_policy = policy;
        self
    }

    /// Insert records verbatim, replacing any with the same id
    pub fn seed(&self, users: impl IntoIterator<Item = User>) {
        let mut map = self.users.write();
        for user in users {
            map.insert(user.id.clone(), user);
        }
    }

    /// Generate an id not already in use
    fn fresh_id(&self, users: &IndexMap<String, User>) -> Result<String, StoreError> {
        for _ in 0..MAX_ID_ATTEMPTS {
            let id = self.ids.generate();
            if !users.contains_key(&id) {
                return Ok(id);
            }
        }
        Err(StoreError::IdsExhausted { attempts: MAX_ID_ATTEMPTS })
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn list(&self, limit: i64, offset: i64) -> Vec<User> {
        let limit = self.list_policy.effective_limit(limit);
        if limit == 0 {
            return Vec::new();
        }
        let offset = usize::try_from(offset).unwrap_or(0);

        self.users
            .read()
            .values()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect()
    }

    async fn count(&self) -> usize {
        self.users.read().len()
    }

    fn page_bounds(&self, limit: i64, offset: i64) -> (i64, i64) {
        let limit = i64::try_from(self.list_policy.effective_limit(limit)).unwrap_or(i64::MAX);
        (limit, offset.max(0))
    }

    async fn get_by_id(&self, id: &str) -> Option<User> {
        self.users.read().get(id).cloned()
    }

    async fn create(&self, mut candidate: NewUser) -> Result<User, StoreError> {
        let supplied = candidate.id.take().filter(|id| !id.trim().is_empty());

        let mut users = self.users.write();
        let id = match supplied {
            None => self.fresh_id(&users)?,
            Some(id) if !users.contains_key(&id) => id,
            Some(id) => match self.conflict_policy {
                ConflictPolicy::Reject => return Err(StoreError::Conflict { id }),
                ConflictPolicy::Overwrite => id,
                ConflictPolicy::Regenerate => self.fresh_id(&users)?,
            },
        };

        let user = User::from_candidate(id.clone(), candidate, self.clock.now());
        users.insert(id, user.clone());
        Ok(user)
    }

    async fn update(&self, id: &str, replacement: NewUser) -> Option<User> {
        let mut users = self.users.write();
        let existing = users.get_mut(id)?;
        existing.apply_replacement(replacement, self.clock.now());
        Some(existing.clone())
    }

    async fn update_profile(&self, id: &str, update: &ProfileUpdate) -> Option<User> {
        let mut users = self.users.write();
        let existing = users.get_mut(id)?;
        existing.apply_profile(update, self.clock.now());
        Some(existing.clone())
    }

    async fn delete(&self, id: &str) -> Option<User> {
        // shift_remove keeps the relative order of the remaining records
        self.users.write().shift_remove(id)
    }
}
