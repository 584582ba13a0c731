//! API Layer
//!
//! REST API endpoints for the user service.

pub mod common;
pub mod openapi;
pub mod users;

pub use common::*;
pub use openapi::UserServiceApiDoc;
pub use users::{users_router, UsersState};

use axum::Router;

pub const USERS_BASE_PATH: &str = "/api/v1/users";

/// All API routes, without middleware layers
pub fn create_router(state: UsersState) -> Router {
    Router::new().nest(USERS_BASE_PATH, users_router(state))
}
