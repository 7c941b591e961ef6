//! PostgreSQL store
//!
//! Runtime-checked queries over a shared `PgPool`. Sort columns are never
//! interpolated from user input directly: they come from the allow-lists in
//! the parent module.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::FromRow;
use uuid::Uuid;

use super::{
    todo_sort_column, user_sort_column, SessionRepository, Store, TodoRepository, UserRepository,
};
use crate::models::{
    NewTodo, NewUser, Page, PageQuery, Session, Todo, TodoPatch, TodoQuery, User, UserRole,
};
use crate::{DomainError, Result};

const USER_COLUMNS: &str = "id, name, email, password, role, is_blocked, status, \
                            last_login_time, created_at, updated_at";
const SESSION_COLUMNS: &str =
    "id, user_id, auth_token, refresh_token, is_active, created_at, updated_at";
const TODO_COLUMNS: &str = "id, user_id, title, description, status, created_at, updated_at";

/// PostgreSQL-backed store
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Create a new connection pool
    pub async fn connect(database_url: &str, pool_size: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(pool_size)
            .connect(database_url)
            .await
            .map_err(|e| DomainError::Database(format!("PostgreSQL connection failed: {e}")))?;

        tracing::info!(pool_size, "Connected to PostgreSQL");
        Ok(Self { pool })
    }

    /// Apply pending schema migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| DomainError::Database(format!("Migration failed: {e}")))?;
        tracing::info!("Database migrations applied");
        Ok(())
    }
}

/// `%term%` with LIKE wildcards in the term escaped
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    name: String,
    email: String,
    password: Option<String>,
    role: String,
    is_blocked: bool,
    status: bool,
    last_login_time: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = DomainError;

    fn try_from(row: UserRow) -> Result<Self> {
        Ok(User {
            id: row.id,
            name: row.name,
            email: row.email,
            password: row.password,
            role: row.role.parse()?,
            is_blocked: row.is_blocked,
            status: row.status,
            last_login_time: row.last_login_time,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct SessionRow {
    id: Uuid,
    user_id: Uuid,
    auth_token: String,
    refresh_token: String,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<SessionRow> for Session {
    fn from(row: SessionRow) -> Self {
        Session {
            id: row.id,
            user_id: row.user_id,
            auth_token: row.auth_token,
            refresh_token: row.refresh_token,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct TodoRow {
    id: Uuid,
    user_id: Uuid,
    title: String,
    description: Option<String>,
    status: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<TodoRow> for Todo {
    fn from(row: TodoRow) -> Self {
        Todo {
            id: row.id,
            user_id: row.user_id,
            title: row.title,
            description: row.description,
            status: row.status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl UserRepository for PgStore {
    async fn create_user(&self, user: NewUser) -> Result<User> {
        let sql = format!(
            "INSERT INTO users (id, name, email, password, role) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (email, role) DO NOTHING \
             RETURNING {USER_COLUMNS}"
        );
        let row: Option<UserRow> = sqlx::query_as(&sql)
            .bind(Uuid::new_v4())
            .bind(&user.name)
            .bind(user.email.to_lowercase())
            .bind(&user.password_hash)
            .bind(user.role.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    DomainError::UserAlreadyExist
                } else {
                    DomainError::Database(format!("Failed to create user: {e}"))
                }
            })?;

        row.ok_or(DomainError::UserAlreadyExist)?.try_into()
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row: Option<UserRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::Database(format!("Failed to get user: {e}")))?;

        row.map(User::try_from).transpose()
    }

    async fn find_user_by_email_and_role(
        &self,
        email: &str,
        role: UserRole,
    ) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1 AND role = $2");
        let row: Option<UserRow> = sqlx::query_as(&sql)
            .bind(email.to_lowercase())
            .bind(role.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::Database(format!("Failed to get user: {e}")))?;

        row.map(User::try_from).transpose()
    }

    async fn list_users(&self, query: &PageQuery) -> Result<Page<User>> {
        let column = user_sort_column(query.sort_field.as_deref())?;
        let pattern = query.search_term().map(|t| like_pattern(&t));
        let filter = "($1::text IS NULL \
                      OR LOWER(name) LIKE $1 ESCAPE '\\' \
                      OR LOWER(email) LIKE $1 ESCAPE '\\')";

        let total: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM users WHERE {filter}"))
            .bind(&pattern)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DomainError::Database(format!("Failed to count users: {e}")))?;

        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE {filter} \
             ORDER BY {column} {} NULLS LAST, id \
             LIMIT $2 OFFSET $3",
            query.sort_order.as_sql()
        );
        let rows: Vec<UserRow> = sqlx::query_as(&sql)
            .bind(&pattern)
            .bind(i64::from(query.limit))
            .bind(to_i64(query.offset()))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DomainError::Database(format!("Failed to list users: {e}")))?;

        Ok(Page {
            data: rows
                .into_iter()
                .map(User::try_from)
                .collect::<Result<Vec<_>>>()?,
            total: u64::try_from(total.0).unwrap_or_default(),
        })
    }

    async fn record_login(&self, id: Uuid, at: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE users SET last_login_time = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::Database(format!("Failed to record login: {e}")))?;

        Ok(())
    }
}

#[async_trait]
impl SessionRepository for PgStore {
    async fn upsert_session(
        &self,
        user_id: Uuid,
        auth_token: &str,
        refresh_token: &str,
    ) -> Result<Session> {
        let sql = format!(
            "INSERT INTO auth_token (id, user_id, auth_token, refresh_token) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (user_id, refresh_token) \
             DO UPDATE SET auth_token = EXCLUDED.auth_token, updated_at = NOW() \
             RETURNING {SESSION_COLUMNS}"
        );
        let row: SessionRow = sqlx::query_as(&sql)
            .bind(Uuid::new_v4())
            .bind(user_id)
            .bind(auth_token)
            .bind(refresh_token)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DomainError::Database(format!("Failed to upsert session: {e}")))?;

        Ok(row.into())
    }

    async fn find_active_session_by_access_token(
        &self,
        user_id: Uuid,
        token: &str,
    ) -> Result<Option<Session>> {
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM auth_token \
             WHERE user_id = $1 AND auth_token = $2 AND is_active"
        );
        let row: Option<SessionRow> = sqlx::query_as(&sql)
            .bind(user_id)
            .bind(token)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::Database(format!("Failed to get session: {e}")))?;

        Ok(row.map(Session::from))
    }

    async fn find_active_session_by_refresh_token(
        &self,
        user_id: Uuid,
        token: &str,
    ) -> Result<Option<Session>> {
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM auth_token \
             WHERE user_id = $1 AND refresh_token = $2 AND is_active"
        );
        let row: Option<SessionRow> = sqlx::query_as(&sql)
            .bind(user_id)
            .bind(token)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::Database(format!("Failed to get session: {e}")))?;

        Ok(row.map(Session::from))
    }

    async fn rotate_session(
        &self,
        session_id: Uuid,
        expected_refresh_token: &str,
        auth_token: &str,
        refresh_token: &str,
    ) -> Result<Option<Session>> {
        let sql = format!(
            "UPDATE auth_token \
             SET auth_token = $3, refresh_token = $4, updated_at = NOW() \
             WHERE id = $1 AND refresh_token = $2 AND is_active \
             RETURNING {SESSION_COLUMNS}"
        );
        let row: Option<SessionRow> = sqlx::query_as(&sql)
            .bind(session_id)
            .bind(expected_refresh_token)
            .bind(auth_token)
            .bind(refresh_token)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::Database(format!("Failed to rotate session: {e}")))?;

        Ok(row.map(Session::from))
    }

    async fn deactivate_session(&self, session_id: Uuid) -> Result<()> {
        sqlx::query("UPDATE auth_token SET is_active = FALSE, updated_at = NOW() WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::Database(format!("Failed to deactivate session: {e}")))?;

        Ok(())
    }

    async fn count_active_sessions(&self, user_id: Uuid) -> Result<u64> {
        let row: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM auth_token WHERE user_id = $1 AND is_active")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| DomainError::Database(format!("Failed to count sessions: {e}")))?;

        Ok(u64::try_from(row.0).unwrap_or_default())
    }
}

#[async_trait]
impl TodoRepository for PgStore {
    async fn create_todo(&self, owner: Uuid, todo: NewTodo) -> Result<Todo> {
        let sql = format!(
            "INSERT INTO todos (id, user_id, title, description, status) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {TODO_COLUMNS}"
        );
        let row: TodoRow = sqlx::query_as(&sql)
            .bind(Uuid::new_v4())
            .bind(owner)
            .bind(&todo.title)
            .bind(&todo.description)
            .bind(todo.status)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DomainError::Database(format!("Failed to create todo: {e}")))?;

        Ok(row.into())
    }

    async fn find_todo(&self, id: Uuid) -> Result<Option<Todo>> {
        let sql = format!("SELECT {TODO_COLUMNS} FROM todos WHERE id = $1");
        let row: Option<TodoRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::Database(format!("Failed to get todo: {e}")))?;

        Ok(row.map(Todo::from))
    }

    async fn list_todos(&self, query: &TodoQuery) -> Result<Page<Todo>> {
        let page = &query.page;
        let column = todo_sort_column(page.sort_field.as_deref())?;
        let pattern = page.search_term().map(|t| like_pattern(&t));
        let filter = "($1::uuid IS NULL OR user_id = $1) \
                      AND ($2::boolean IS NULL OR status = $2) \
                      AND ($3::text IS NULL OR LOWER(title) LIKE $3 ESCAPE '\\')";

        let total: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM todos WHERE {filter}"))
            .bind(query.owner)
            .bind(query.status)
            .bind(&pattern)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DomainError::Database(format!("Failed to count todos: {e}")))?;

        let sql = format!(
            "SELECT {TODO_COLUMNS} FROM todos WHERE {filter} \
             ORDER BY {column} {}, id \
             LIMIT $4 OFFSET $5",
            page.sort_order.as_sql()
        );
        let rows: Vec<TodoRow> = sqlx::query_as(&sql)
            .bind(query.owner)
            .bind(query.status)
            .bind(&pattern)
            .bind(i64::from(page.limit))
            .bind(to_i64(page.offset()))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DomainError::Database(format!("Failed to list todos: {e}")))?;

        Ok(Page {
            data: rows.into_iter().map(Todo::from).collect(),
            total: u64::try_from(total.0).unwrap_or_default(),
        })
    }

    async fn update_todo(&self, id: Uuid, patch: &TodoPatch) -> Result<Option<Todo>> {
        let sql = format!(
            "UPDATE todos SET \
                title = COALESCE($2, title), \
                description = COALESCE($3, description), \
                status = COALESCE($4, status), \
                updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {TODO_COLUMNS}"
        );
        let row: Option<TodoRow> = sqlx::query_as(&sql)
            .bind(id)
            .bind(&patch.title)
            .bind(&patch.description)
            .bind(patch.status)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::Database(format!("Failed to update todo: {e}")))?;

        Ok(row.map(Todo::from))
    }

    async fn delete_todo(&self, id: Uuid, owner: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM todos WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(owner)
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::Database(format!("Failed to delete todo: {e}")))?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::Database(format!("Ping failed: {e}")))?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}
