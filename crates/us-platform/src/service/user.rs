//! User Service
//!
//! Every mutating operation follows the same sequence: apply the mutation
//! to the store, and only if it succeeded, announce it exactly once. The
//! announcement never changes the returned outcome.

use std::sync::Arc;
use serde_json::{Map, Value};
use tracing::{debug, error, info};

use us_common::{NewUser, ProfileUpdate, User};
use us_events::ChangeNotifier;

use crate::error::{PlatformError, Result};
use crate::repository::{StoreError, UserRepository};

#[derive(Clone)]
pub struct UserService {
    repo: Arc<dyn UserRepository>,
    notifier: Arc<ChangeNotifier>,
}

impl UserService {
    pub fn new(repo: Arc<dyn UserRepository>, notifier: Arc<ChangeNotifier>) -> Self {
        Self { repo, notifier }
    }

    pub async fn list(&self, limit: i64, offset: i64) -> Vec<User> {
        self.repo.list(limit, offset).await
    }

    pub async fn count(&self) -> usize {
        self.repo.count().await
    }

    /// The limit and offset `list` applies, for echoing back to callers
    pub fn page_bounds(&self, limit: i64, offset: i64) -> (i64, i64) {
        self.repo.page_bounds(limit, offset)
    }

    pub async fn get(&self, id: &str) -> Option<User> {
        self.repo.get_by_id(id).await
    }

    pub async fn create(&self, candidate: NewUser) -> Result<User> {
        let user = self.repo.create(candidate).await.map_err(|e| match e {
            StoreError::Conflict { id } => PlatformError::duplicate("User", "userId", id),
            e @ StoreError::IdsExhausted { .. } => {
                error!(error = %e, "Could not allocate a user id");
                PlatformError::internal(e.to_string())
            }
        })?;

        record_mutation("create");
        info!(user_id = %user.id, "Created user");
        self.notifier.user_created(&user).await;
        Ok(user)
    }

    pub async fn update(&self, id: &str, replacement: NewUser) -> Option<User> {
        let user = self.repo.update(id, replacement).await?;

        record_mutation("update");
        info!(user_id = %user.id, "Updated user");
        self.notifier.user_updated(&user).await;
        Some(user)
    }

    /// Apply `update` and announce it with the submitted `updates` map
    pub async fn update_profile(
        &self,
        id: &str,
        update: &ProfileUpdate,
        updates: &Map<String, Value>,
    ) -> Option<User> {
        let user = self.repo.update_profile(id, update).await?;

        record_mutation("update_profile");
        info!(user_id = %user.id, "Updated user profile");
        self.notifier.profile_updated(&user, updates).await;
        Some(user)
    }

    pub async fn delete(&self, id: &str) -> Option<User> {
        let Some(user) = self.repo.delete(id).await else {
            debug!(user_id = %id, "Delete of unknown user");
            return None;
        };

        record_mutation("delete");
        info!(user_id = %user.id, "Deleted user");
        self.notifier.user_deleted(&user).await;
        Some(user)
    }
}

fn record_mutation(op: &'static str) {
    metrics::counter!("user_store_mutations_total", "op" => op).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use us_common::UserEventType;
    use us_config::{DispatchMode, TopicConfig};
    use us_events::InMemoryEventSink;

    use crate::repository::InMemoryUserRepository;

    struct ConstantIds;

    impl us_common::IdGenerator for ConstantIds {
        fn generate(&self) -> String {
            "same".to_string()
        }
    }

    fn service() -> (UserService, Arc<InMemoryEventSink>) {
        let sink = Arc::new(InMemoryEventSink::new());
        let notifier = ChangeNotifier::new(sink.clone(), TopicConfig::default())
            .with_dispatch_mode(DispatchMode::Inline);
        let service = UserService::new(Arc::new(InMemoryUserRepository::new()), Arc::new(notifier));
        (service, sink)
    }

    #[tokio::test]
    async fn test_each_mutation_notifies_once() {
        let (service, sink) = service();

        let user = service.create(NewUser::new("Anna Anna", "anna@example.com")).await.unwrap();
        service.update(&user.id, NewUser::new("Anna B", "anna@example.com")).await.unwrap();
        let updates = json!({ "name": "Anna C" });
        service
            .update_profile(&user.id, &ProfileUpdate::default().with_name("Anna C"), updates.as_object().unwrap())
            .await
            .unwrap();
        service.delete(&user.id).await.unwrap();

        let types: Vec<UserEventType> = sink.envelopes().iter().map(|e| e.event_type()).collect();
        assert_eq!(
            types,
            vec![
                UserEventType::UserCreated,
                UserEventType::UserUpdated,
                UserEventType::ProfileUpdated,
                UserEventType::UserDeleted,
            ]
        );
    }

    #[tokio::test]
    async fn test_absent_outcomes_do_not_notify() {
        let (service, sink) = service();

        assert!(service.get("missing").await.is_none());
        assert!(service.update("missing", NewUser::new("Anna", "a@example.com")).await.is_none());
        assert!(service
            .update_profile("missing", &ProfileUpdate::default(), &Map::new())
            .await
            .is_none());
        assert!(service.delete("missing").await.is_none());

        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn test_conflict_maps_to_duplicate_without_event() {
        let (service, sink) = service();
        service.create(NewUser::new("Anna", "a@example.com").with_id("7")).await.unwrap();
        sink.clear();

        let err = service.create(NewUser::new("Boris", "b@example.com").with_id("7")).await.unwrap_err();
        assert!(matches!(err, PlatformError::Duplicate { .. }));
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn test_exhausted_ids_map_to_internal_without_event() {
        let sink = Arc::new(InMemoryEventSink::new());
        let notifier = ChangeNotifier::new(sink.clone(), TopicConfig::default())
            .with_dispatch_mode(DispatchMode::Inline);
        let repo = InMemoryUserRepository::new().with_id_generator(Arc::new(ConstantIds));
        let service = UserService::new(Arc::new(repo), Arc::new(notifier));

        service.create(NewUser::new("Anna", "a@example.com")).await.unwrap();
        sink.clear();

        let err = service.create(NewUser::new("Boris", "b@example.com")).await.unwrap_err();
        assert!(matches!(err, PlatformError::Internal { .. }));
        assert!(sink.is_empty());
        assert_eq!(service.count().await, 1);
    }
}
