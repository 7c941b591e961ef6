//! In-memory store
//!
//! Backs development runs and the test suite. A single `RwLock` guards all
//! tables; every write that must be atomic (user uniqueness, session upsert,
//! rotation) happens inside one write-locked section.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    todo_sort_column, user_sort_column, SessionRepository, Store, TodoRepository, UserRepository,
};
use crate::models::{
    NewTodo, NewUser, Page, PageQuery, Session, SortOrder, Todo, TodoPatch, TodoQuery, User,
    UserRole,
};
use crate::{DomainError, Result};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    sessions: HashMap<Uuid, Session>,
    todos: HashMap<Uuid, Todo>,
}

/// In-memory store
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Sort, then cut one page out of `items`
fn paginate<T>(mut items: Vec<T>, query: &PageQuery, cmp: impl Fn(&T, &T) -> Ordering) -> Page<T> {
    items.sort_by(|a, b| match query.sort_order {
        SortOrder::Asc => cmp(a, b),
        SortOrder::Desc => cmp(b, a),
    });
    let total = items.len() as u64;
    let offset = usize::try_from(query.offset()).unwrap_or(usize::MAX);
    let data = items
        .into_iter()
        .skip(offset)
        .take(query.limit as usize)
        .collect();
    Page { data, total }
}

fn compare_users(column: &str, a: &User, b: &User) -> Ordering {
    let primary = match column {
        "name" => a.name.cmp(&b.name),
        "email" => a.email.cmp(&b.email),
        "updated_at" => a.updated_at.cmp(&b.updated_at),
        "last_login_time" => a.last_login_time.cmp(&b.last_login_time),
        _ => a.created_at.cmp(&b.created_at),
    };
    primary.then_with(|| a.id.cmp(&b.id))
}

fn compare_todos(column: &str, a: &Todo, b: &Todo) -> Ordering {
    let primary = match column {
        "title" => a.title.cmp(&b.title),
        "status" => a.status.cmp(&b.status),
        "updated_at" => a.updated_at.cmp(&b.updated_at),
        _ => a.created_at.cmp(&b.created_at),
    };
    primary.then_with(|| a.id.cmp(&b.id))
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn create_user(&self, user: NewUser) -> Result<User> {
        let email = user.email.to_lowercase();
        let mut tables = self.tables.write().await;
        if tables
            .users
            .values()
            .any(|u| u.email == email && u.role == user.role)
        {
            return Err(DomainError::UserAlreadyExist);
        }

        let now = Utc::now();
        let record = User {
            id: Uuid::new_v4(),
            name: user.name,
            email,
            password: user.password_hash,
            role: user.role,
            is_blocked: false,
            status: true,
            last_login_time: None,
            created_at: now,
            updated_at: now,
        };
        tables.users.insert(record.id, record.clone());
        Ok(record)
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_email_and_role(
        &self,
        email: &str,
        role: UserRole,
    ) -> Result<Option<User>> {
        let email = email.to_lowercase();
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .find(|u| u.email == email && u.role == role)
            .cloned())
    }

    async fn list_users(&self, query: &PageQuery) -> Result<Page<User>> {
        let column = user_sort_column(query.sort_field.as_deref())?;
        let term = query.search_term();
        let tables = self.tables.read().await;
        let matches: Vec<User> = tables
            .users
            .values()
            .filter(|u| match &term {
                Some(t) => u.name.to_lowercase().contains(t) || u.email.contains(t),
                None => true,
            })
            .cloned()
            .collect();

        Ok(paginate(matches, query, |a, b| compare_users(column, a, b)))
    }

    async fn record_login(&self, id: Uuid, at: DateTime<Utc>) -> Result<()> {
        let mut tables = self.tables.write().await;
        if let Some(user) = tables.users.get_mut(&id) {
            user.last_login_time = Some(at);
            user.updated_at = Utc::now();
        }
        Ok(())
    }
}

#[async_trait]
impl SessionRepository for MemoryStore {
    async fn upsert_session(
        &self,
        user_id: Uuid,
        auth_token: &str,
        refresh_token: &str,
    ) -> Result<Session> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();

        if let Some(existing) = tables
            .sessions
            .values_mut()
            .find(|s| s.user_id == user_id && s.refresh_token == refresh_token)
        {
            existing.auth_token = auth_token.to_string();
            existing.updated_at = now;
            return Ok(existing.clone());
        }

        let session = Session {
            id: Uuid::new_v4(),
            user_id,
            auth_token: auth_token.to_string(),
            refresh_token: refresh_token.to_string(),
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        tables.sessions.insert(session.id, session.clone());
        Ok(session)
    }

    async fn find_active_session_by_access_token(
        &self,
        user_id: Uuid,
        token: &str,
    ) -> Result<Option<Session>> {
        let tables = self.tables.read().await;
        Ok(tables
            .sessions
            .values()
            .find(|s| s.is_active && s.user_id == user_id && s.auth_token == token)
            .cloned())
    }

    async fn find_active_session_by_refresh_token(
        &self,
        user_id: Uuid,
        token: &str,
    ) -> Result<Option<Session>> {
        let tables = self.tables.read().await;
        Ok(tables
            .sessions
            .values()
            .find(|s| s.is_active && s.user_id == user_id && s.refresh_token == token)
            .cloned())
    }

    async fn rotate_session(
        &self,
        session_id: Uuid,
        expected_refresh_token: &str,
        auth_token: &str,
        refresh_token: &str,
    ) -> Result<Option<Session>> {
        let mut tables = self.tables.write().await;
        let Some(session) = tables.sessions.get_mut(&session_id) else {
            return Ok(None);
        };
        if !session.is_active || session.refresh_token != expected_refresh_token {
            return Ok(None);
        }

        session.auth_token = auth_token.to_string();
        session.refresh_token = refresh_token.to_string();
        session.updated_at = Utc::now();
        Ok(Some(session.clone()))
    }

    async fn deactivate_session(&self, session_id: Uuid) -> Result<()> {
        let mut tables = self.tables.write().await;
        if let Some(session) = tables.sessions.get_mut(&session_id) {
            session.is_active = false;
            session.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn count_active_sessions(&self, user_id: Uuid) -> Result<u64> {
        let tables = self.tables.read().await;
        Ok(tables
            .sessions
            .values()
            .filter(|s| s.is_active && s.user_id == user_id)
            .count() as u64)
    }
}

#[async_trait]
impl TodoRepository for MemoryStore {
    async fn create_todo(&self, owner: Uuid, todo: NewTodo) -> Result<Todo> {
        let now = Utc::now();
        let record = Todo {
            id: Uuid::new_v4(),
            user_id: owner,
            title: todo.title,
            description: todo.description,
            status: todo.status,
            created_at: now,
            updated_at: now,
        };
        self.tables
            .write()
            .await
            .todos
            .insert(record.id, record.clone());
        Ok(record)
    }

    async fn find_todo(&self, id: Uuid) -> Result<Option<Todo>> {
        Ok(self.tables.read().await.todos.get(&id).cloned())
    }

    async fn list_todos(&self, query: &TodoQuery) -> Result<Page<Todo>> {
        let column = todo_sort_column(query.page.sort_field.as_deref())?;
        let term = query.page.search_term();
        let tables = self.tables.read().await;
        let matches: Vec<Todo> = tables
            .todos
            .values()
            .filter(|t| query.owner.map_or(true, |owner| t.user_id == owner))
            .filter(|t| query.status.map_or(true, |status| t.status == status))
            .filter(|t| match &term {
                Some(term) => t.title.to_lowercase().contains(term),
                None => true,
            })
            .cloned()
            .collect();

        Ok(paginate(matches, &query.page, |a, b| {
            compare_todos(column, a, b)
        }))
    }

    async fn update_todo(&self, id: Uuid, patch: &TodoPatch) -> Result<Option<Todo>> {
        let mut tables = self.tables.write().await;
        let Some(todo) = tables.todos.get_mut(&id) else {
            return Ok(None);
        };
        patch.apply(todo);
        todo.updated_at = Utc::now();
        Ok(Some(todo.clone()))
    }

    async fn delete_todo(&self, id: Uuid, owner: Uuid) -> Result<bool> {
        let mut tables = self.tables.write().await;
        match tables.todos.get(&id) {
            Some(todo) if todo.user_id == owner => {
                tables.todos.remove(&id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
