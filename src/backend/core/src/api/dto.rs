//! Request and response bodies that exist only at the HTTP boundary.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::Result;
use crate::pagination::PageQuery;
use crate::rbac::{Role, UserId, UserStatus};
use crate::services::UserQuery;

/// Success envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub phone_number: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StatusUpdateRequest {
    pub status: UserStatus,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignDirectorRequest {
    pub director_id: UserId,
}

/// `GET /users` query string. Everything arrives as text and is checked here.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserListParams {
    pub role: Option<String>,
    pub search: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
}

impl UserListParams {
    pub fn into_query(self) -> Result<UserQuery> {
        let role = match self.role.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(Role::from_str(raw)?),
        };
        Ok(UserQuery {
            role,
            search: self.search,
            page: PageQuery {
                page: self.page,
                limit: self.limit,
            },
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheClearResponse {
    pub cleared: bool,
    pub backend: String,
}
