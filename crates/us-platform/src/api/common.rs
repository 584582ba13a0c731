//! Common API types and utilities

use serde::{de, Deserialize, Deserializer, Serialize};
use utoipa::{IntoParams, ToSchema};

use us_common::User;

/// Standard API error response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Paging parameters for the user list.
///
/// Both are signed so that zero or negative values reach the store's
/// list policy instead of failing extraction. An empty value (`?limit=`)
/// counts as absent.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListQuery {
    /// Maximum number of users to return (default 10)
    #[serde(default, deserialize_with = "blank_as_none")]
    pub limit: Option<i64>,
    /// Number of users to skip (default 0)
    #[serde(default, deserialize_with = "blank_as_none")]
    pub offset: Option<i64>,
}

fn blank_as_none<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value.parse().map(Some).map_err(de::Error::custom),
    }
}

/// One page of users
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ListUsersResponse {
    pub data: Vec<User>,
    pub total: usize,
    pub limit: i64,
    pub offset: i64,
}
