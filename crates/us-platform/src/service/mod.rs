//! Service Layer
//!
//! Sequences store mutations with change notifications.

pub mod user;

pub use user::UserService;
