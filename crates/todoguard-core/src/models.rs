//! Domain models shared by the store and the HTTP layer
//!
//! Field names serialize in camelCase to keep the wire format stable for
//! existing clients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::DomainError;

/// User role enum
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    #[default]
    User,
    Admin,
}

impl UserRole {
    /// Convert role to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::User => "user",
            UserRole::Admin => "admin",
        }
    }

    /// Lookup failure for this role
    pub fn not_found_error(&self) -> DomainError {
        match self {
            UserRole::User => DomainError::UserNotExist,
            UserRole::Admin => DomainError::AdminNotExist,
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for UserRole {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(UserRole::User),
            "admin" => Ok(UserRole::Admin),
            other => Err(DomainError::Internal(format!("unknown role: {other}"))),
        }
    }
}

/// User account
///
/// The password hash never leaves the process: it is skipped when the
/// record is serialized.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    /// Lowercased email, unique per role
    pub email: String,
    #[serde(skip_serializing, default)]
    #[schema(read_only)]
    pub password: Option<String>,
    pub role: UserRole,
    pub is_blocked: bool,
    /// Active flag
    pub status: bool,
    pub last_login_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Whether the account may open new sessions
    pub fn can_login(&self) -> bool {
        self.status && !self.is_blocked
    }
}

/// Input for user creation
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    /// Already-hashed password
    pub password_hash: Option<String>,
    pub role: UserRole,
}

/// Persisted session binding a user to a token pair
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub auth_token: String,
    pub refresh_token: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Todo item owned by a single user
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Todo {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for todo creation
#[derive(Debug, Clone)]
pub struct NewTodo {
    pub title: String,
    pub description: Option<String>,
    pub status: bool,
}

/// Partial todo update; `None` leaves the field untouched
#[derive(Debug, Clone, Default)]
pub struct TodoPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<bool>,
}

impl TodoPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none() && self.status.is_none()
    }

    pub(crate) fn apply(&self, todo: &mut Todo) {
        if let Some(title) = &self.title {
            todo.title = title.clone();
        }
        if let Some(description) = &self.description {
            todo.description = Some(description.clone());
        }
        if let Some(status) = self.status {
            todo.status = status;
        }
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Already-validated pagination parameters
#[derive(Debug, Clone)]
pub struct PageQuery {
    /// 1-based page number
    pub page: u32,
    /// Page size
    pub limit: u32,
    /// Case-insensitive substring filter
    pub search: Option<String>,
    /// Wire name of the sort field (e.g. `createdAt`)
    pub sort_field: Option<String>,
    pub sort_order: SortOrder,
}

impl Default for PageQuery {
    fn default() -> Self {
        Self {
            page: 1,
            limit: 10,
            search: None,
            sort_field: None,
            sort_order: SortOrder::Desc,
        }
    }
}

impl PageQuery {
    /// Rows to skip
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.limit)
    }

    /// Lowercased search term, if any
    pub fn search_term(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase)
    }
}

/// Todo listing filter
#[derive(Debug, Clone, Default)]
pub struct TodoQuery {
    /// Restrict to one owner; `None` lists every user's todos
    pub owner: Option<Uuid>,
    /// Restrict to completed / open todos
    pub status: Option<bool>,
    pub page: PageQuery,
}

/// One page of results plus the total match count
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[aliases(UserPage = Page<User>, TodoPage = Page<Todo>)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total: u64,
}
