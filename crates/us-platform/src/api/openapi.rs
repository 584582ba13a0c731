//! OpenAPI Documentation

use utoipa::OpenApi;

/// User Service OpenAPI Documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "User Service API",
        version = "1.0.0",
        description = "User records with change notifications"
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "users", description = "User management")
    ),
    paths(
        super::users::list_users,
        super::users::create_user,
        super::users::get_user,
        super::users::update_user,
        super::users::update_user_profile,
        super::users::delete_user,
    ),
    components(schemas(
        us_common::User,
        us_common::NewUser,
        super::users::ProfileUpdateRequest,
        super::common::ApiError,
        super::common::ListUsersResponse,
    ))
)]
pub struct UserServiceApiDoc;
