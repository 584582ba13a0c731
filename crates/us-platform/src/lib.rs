//! User Service Platform
//!
//! Record store, change sequencing and the REST API for user records.
//!
//! - `repository`: the authoritative in-memory store
//! - `service`: applies mutations and announces them
//! - `validation`: request checks at the HTTP boundary
//! - `api`: axum routes and OpenAPI documentation

pub mod api;
pub mod error;
pub mod repository;
pub mod seed;
pub mod service;
pub mod validation;

pub use api::{create_router, users_router, UserServiceApiDoc, UsersState};
pub use error::{PlatformError, Result};
pub use repository::{InMemoryUserRepository, ListPolicy, StoreError, UserRepository};
pub use seed::sample_users;
pub use service::UserService;
