//! Users API
//!
//! REST endpoints for user records under `/api/v1/users`.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    routing::{get, patch},
    Json, Router,
};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use utoipa::ToSchema;

use us_common::{NewUser, User};

use crate::api::common::{ApiError, ListQuery, ListUsersResponse};
use crate::error::PlatformError;
use crate::service::UserService;
use crate::validation::{validate_new_user, validate_profile_updates};

/// Partial profile update. Only documents the recognized keys; the
/// handler accepts any JSON object and ignores other keys.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdateRequest {
    /// New display name (2 to 100 characters)
    pub name: Option<String>,

    /// New phone number, or null to clear it
    pub phone_number: Option<String>,
}

/// Users service state
#[derive(Clone)]
pub struct UsersState {
    pub user_service: Arc<UserService>,
    pub default_limit: i64,
}

fn body_error(rejection: JsonRejection) -> PlatformError {
    PlatformError::validation(rejection.body_text())
}

/// List users
#[utoipa::path(
    get,
    path = "",
    tag = "users",
    params(ListQuery),
    responses(
        (status = 200, description = "One page of users", body = ListUsersResponse),
        (status = 400, description = "Invalid query parameters", body = ApiError)
    )
)]
pub async fn list_users(
    State(state): State<UsersState>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Result<Json<ListUsersResponse>, PlatformError> {
    let Query(query) = query.map_err(|e| PlatformError::validation(e.body_text()))?;
    let limit = query.limit.unwrap_or(state.default_limit);
    let offset = query.offset.unwrap_or(0);

    let data = state.user_service.list(limit, offset).await;
    let total = state.user_service.count().await;
    let (limit, offset) = state.user_service.page_bounds(limit, offset);

    Ok(Json(ListUsersResponse { data, total, limit, offset }))
}

/// Create a user
#[utoipa::path(
    post,
    path = "",
    tag = "users",
    request_body = NewUser,
    responses(
        (status = 201, description = "User created", body = User),
        (status = 400, description = "Validation error", body = ApiError),
        (status = 409, description = "User id already taken", body = ApiError)
    )
)]
pub async fn create_user(
    State(state): State<UsersState>,
    body: Result<Json<NewUser>, JsonRejection>,
) -> Result<(StatusCode, Json<User>), PlatformError> {
    let Json(candidate) = body.map_err(body_error)?;
    validate_new_user(&candidate)?;

    let user = state.user_service.create(candidate).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// Get user by ID
#[utoipa::path(
    get,
    path = "/{id}",
    tag = "users",
    params(
        ("id" = String, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "User found", body = User),
        (status = 404, description = "User not found")
    )
)]
pub async fn get_user(
    State(state): State<UsersState>,
    Path(id): Path<String>,
) -> Result<Json<User>, PlatformError> {
    let user = state.user_service.get(&id).await
        .ok_or_else(|| PlatformError::not_found("User", &id))?;

    Ok(Json(user))
}

/// Replace a user's fields
#[utoipa::path(
    put,
    path = "/{id}",
    tag = "users",
    params(
        ("id" = String, Path, description = "User ID")
    ),
    request_body = NewUser,
    responses(
        (status = 200, description = "User updated", body = User),
        (status = 400, description = "Validation error", body = ApiError),
        (status = 404, description = "User not found")
    )
)]
pub async fn update_user(
    State(state): State<UsersState>,
    Path(id): Path<String>,
    body: Result<Json<NewUser>, JsonRejection>,
) -> Result<Json<User>, PlatformError> {
    let Json(replacement) = body.map_err(body_error)?;
    validate_new_user(&replacement)?;

    let user = state.user_service.update(&id, replacement).await
        .ok_or_else(|| PlatformError::not_found("User", &id))?;

    Ok(Json(user))
}

/// Partially update a user's profile
#[utoipa::path(
    patch,
    path = "/{id}/profile",
    tag = "users",
    params(
        ("id" = String, Path, description = "User ID")
    ),
    request_body = ProfileUpdateRequest,
    responses(
        (status = 200, description = "Profile updated", body = User),
        (status = 400, description = "Validation error", body = ApiError),
        (status = 404, description = "User not found")
    )
)]
pub async fn update_user_profile(
    State(state): State<UsersState>,
    Path(id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<User>, PlatformError> {
    let Json(body) = body.map_err(body_error)?;
    let Value::Object(updates) = body else {
        return Err(PlatformError::validation("Profile updates must be a JSON object"));
    };
    let update = validate_profile_updates(&updates)?;

    let user = state.user_service.update_profile(&id, &update, &updates).await
        .ok_or_else(|| PlatformError::not_found("User", &id))?;

    Ok(Json(user))
}

/// Delete a user
#[utoipa::path(
    delete,
    path = "/{id}",
    tag = "users",
    params(
        ("id" = String, Path, description = "User ID")
    ),
    responses(
        (status = 204, description = "User deleted"),
        (status = 404, description = "User not found")
    )
)]
pub async fn delete_user(
    State(state): State<UsersState>,
    Path(id): Path<String>,
) -> Result<StatusCode, PlatformError> {
    state.user_service.delete(&id).await
        .ok_or_else(|| PlatformError::not_found("User", &id))?;

    Ok(StatusCode::NO_CONTENT)
}

/// Create users router
pub fn users_router(state: UsersState) -> Router {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/:id", get(get_user).put(update_user).delete(delete_user))
        .route("/:id/profile", patch(update_user_profile))
        .with_state(state)
}
