//! Repository Layer
//!
//! Storage contracts and their in-memory implementations.

pub mod user;

pub use user::{InMemoryUserRepository, ListPolicy, StoreError, UserRepository};
