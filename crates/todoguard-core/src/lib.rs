//! todoguard core - domain models, configuration and storage
//!
//! This crate defines the pieces shared by every todoguard binary:
//! - Domain error taxonomy
//! - User, session and todo models
//! - Pagination queries
//! - Configuration management
//! - Repository traits with PostgreSQL and in-memory backends

pub mod config;
pub mod models;
pub mod store;

pub use config::{
    AppConfig, AuthConfig, ConfigError, DatabaseBackend, DatabaseConfig, Environment,
    LoggingConfig, SecurityConfig, ServerConfig, ThrottleConfig,
};
pub use models::{
    NewTodo, NewUser, Page, PageQuery, Session, SortOrder, Todo, TodoPage, TodoPatch, TodoQuery,
    User, UserPage, UserRole,
};
pub use store::{
    connect, MemoryStore, PgStore, SessionRepository, Store, TodoRepository, UserRepository,
};

use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Domain failures raised by services and repositories.
///
/// Every variant is terminal for the request that produced it; the HTTP layer
/// maps each one to a status code and a uniform JSON body.
#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("User not exist")]
    UserNotExist,

    #[error("Admin not exist")]
    AdminNotExist,

    #[error("User already exists")]
    UserAlreadyExist,

    #[error("Password is empty")]
    EmptyPassword,

    #[error("User blocked")]
    UserBlocked,

    #[error("Session expired")]
    DeviceSessionExpired,

    #[error("Token missing")]
    JwtTokenMissing,

    #[error("Not Found")]
    NotFound,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        DomainError::Database(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DomainError>;
