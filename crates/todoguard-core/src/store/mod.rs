//! Repository traits and their backends
//!
//! Services talk to storage only through these traits. Two implementations
//! exist: [`PgStore`] for PostgreSQL and [`MemoryStore`] for development and
//! tests. Both make the session upsert a single conditional write so that
//! concurrent logins cannot create duplicate rows for one refresh token.

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::config::{DatabaseBackend, DatabaseConfig};
use crate::models::{
    NewTodo, NewUser, Page, PageQuery, Session, Todo, TodoPatch, TodoQuery, User, UserRole,
};
use crate::{DomainError, Result};

/// User persistence
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a user; fails with `UserAlreadyExist` when (email, role) is taken
    async fn create_user(&self, user: NewUser) -> Result<User>;

    /// Get user by ID
    async fn find_user(&self, id: Uuid) -> Result<Option<User>>;

    /// Get user by lowercased email and role
    async fn find_user_by_email_and_role(&self, email: &str, role: UserRole)
        -> Result<Option<User>>;

    /// List users, searching name and email
    async fn list_users(&self, query: &PageQuery) -> Result<Page<User>>;

    /// Stamp the last successful login
    async fn record_login(&self, id: Uuid, at: DateTime<Utc>) -> Result<()>;
}

/// Session (auth token) persistence
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Insert-or-update keyed by (user_id, refresh_token).
    ///
    /// An existing row only gets its access token replaced.
    async fn upsert_session(
        &self,
        user_id: Uuid,
        auth_token: &str,
        refresh_token: &str,
    ) -> Result<Session>;

    /// Active session whose current access token is `token`
    async fn find_active_session_by_access_token(
        &self,
        user_id: Uuid,
        token: &str,
    ) -> Result<Option<Session>>;

    /// Active session whose refresh token is `token`
    async fn find_active_session_by_refresh_token(
        &self,
        user_id: Uuid,
        token: &str,
    ) -> Result<Option<Session>>;

    /// Replace both tokens of an active session in place.
    ///
    /// Only succeeds while the row still holds `expected_refresh_token`, so
    /// two racing refreshes with the same token cannot both win.
    async fn rotate_session(
        &self,
        session_id: Uuid,
        expected_refresh_token: &str,
        auth_token: &str,
        refresh_token: &str,
    ) -> Result<Option<Session>>;

    /// Mark a session inactive
    async fn deactivate_session(&self, session_id: Uuid) -> Result<()>;

    /// Number of active sessions for a user
    async fn count_active_sessions(&self, user_id: Uuid) -> Result<u64>;
}

/// Todo persistence
#[async_trait]
pub trait TodoRepository: Send + Sync {
    async fn create_todo(&self, owner: Uuid, todo: NewTodo) -> Result<Todo>;

    async fn find_todo(&self, id: Uuid) -> Result<Option<Todo>>;

    /// List todos, searching titles
    async fn list_todos(&self, query: &TodoQuery) -> Result<Page<Todo>>;

    /// Apply a patch; `None` when the todo does not exist
    async fn update_todo(&self, id: Uuid, patch: &TodoPatch) -> Result<Option<Todo>>;

    /// Delete the todo if `owner` owns it; returns whether a row was removed
    async fn delete_todo(&self, id: Uuid, owner: Uuid) -> Result<bool>;
}

/// Everything the application needs from storage
#[async_trait]
pub trait Store: UserRepository + SessionRepository + TodoRepository {
    /// Round-trip to the backing store
    async fn ping(&self) -> Result<()>;

    /// Short backend name for logs
    fn backend_name(&self) -> &'static str;
}

/// Open the configured store
pub async fn connect(config: &DatabaseConfig) -> Result<Arc<dyn Store>> {
    match config.backend {
        DatabaseBackend::Postgres => {
            let store = PgStore::connect(&config.url, config.pool_size).await?;
            if config.run_migrations {
                store.migrate().await?;
            }
            Ok(Arc::new(store))
        }
        DatabaseBackend::Memory => {
            tracing::warn!("Using in-memory store; data is lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

/// Sortable user columns, keyed by wire name
pub(crate) fn user_sort_column(field: Option<&str>) -> Result<&'static str> {
    match field.unwrap_or("createdAt") {
        "createdAt" => Ok("created_at"),
        "updatedAt" => Ok("updated_at"),
        "name" => Ok("name"),
        "email" => Ok("email"),
        "lastLoginTime" => Ok("last_login_time"),
        other => Err(DomainError::BadRequest(format!(
            "sortField must be one of [createdAt, updatedAt, name, email, lastLoginTime], got {other}"
        ))),
    }
}

/// Sortable todo columns, keyed by wire name
pub(crate) fn todo_sort_column(field: Option<&str>) -> Result<&'static str> {
    match field.unwrap_or("createdAt") {
        "createdAt" => Ok("created_at"),
        "updatedAt" => Ok("updated_at"),
        "title" => Ok("title"),
        "status" => Ok("status"),
        other => Err(DomainError::BadRequest(format!(
            "sortField must be one of [createdAt, updatedAt, title, status], got {other}"
        ))),
    }
}
