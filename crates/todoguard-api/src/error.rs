//! API error handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use todoguard_core::DomainError;
use utoipa::ToSchema;
use validator::ValidationErrors;

/// API error response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// Error code
    pub code: String,
    /// Human-readable message
    pub message: String,
    /// Additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Object)]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Application error type
#[derive(Debug)]
pub enum AppError {
    /// Failure raised by a service or repository
    Domain(DomainError),
    /// Malformed request that never reached validation
    BadRequest(String),
    /// DTO validation failures, keyed by field
    Validation(BTreeMap<String, Vec<String>>),
    /// Sanitizer rejection on the named field
    InvalidContent(String),
    /// Missing or mismatched CSRF token
    Forbidden(String),
    TooManyRequests,
}

impl AppError {
    fn status_and_body(&self) -> (StatusCode, ApiError) {
        match self {
            AppError::Domain(err) => domain_status(err),
            AppError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                ApiError::new("BAD_REQUEST", msg.clone()),
            ),
            AppError::Validation(fields) => (
                StatusCode::PRECONDITION_FAILED,
                ApiError::new("VALIDATION_FAILED", "Validation failed")
                    .with_details(serde_json::json!(fields)),
            ),
            AppError::InvalidContent(field) => (
                StatusCode::FORBIDDEN,
                ApiError::new("INVALID_CONTENT", format!("Invalid content passed on {field}")),
            ),
            AppError::Forbidden(msg) => (
                StatusCode::FORBIDDEN,
                ApiError::new("FORBIDDEN", msg.clone()),
            ),
            AppError::TooManyRequests => (
                StatusCode::TOO_MANY_REQUESTS,
                ApiError::new("TOO_MANY_REQUESTS", "Too many requests"),
            ),
        }
    }
}

fn domain_status(err: &DomainError) -> (StatusCode, ApiError) {
    let message = err.to_string();
    match err {
        DomainError::InvalidCredentials => (
            StatusCode::UNAUTHORIZED,
            ApiError::new("INVALID_CREDENTIALS", message),
        ),
        DomainError::UserNotExist => (
            StatusCode::NOT_FOUND,
            ApiError::new("USER_NOT_EXIST", message),
        ),
        DomainError::AdminNotExist => (
            StatusCode::NOT_FOUND,
            ApiError::new("ADMIN_NOT_EXIST", message),
        ),
        DomainError::UserAlreadyExist => (
            StatusCode::CONFLICT,
            ApiError::new("USER_ALREADY_EXIST", message),
        ),
        DomainError::EmptyPassword => (
            StatusCode::UNAUTHORIZED,
            ApiError::new("EMPTY_PASSWORD", message),
        ),
        DomainError::UserBlocked => (
            StatusCode::UNAUTHORIZED,
            ApiError::new("USER_BLOCKED", message),
        ),
        DomainError::DeviceSessionExpired => (
            StatusCode::UNAUTHORIZED,
            ApiError::new("DEVICE_SESSION_EXPIRED", message),
        ),
        DomainError::JwtTokenMissing => (
            StatusCode::UNAUTHORIZED,
            ApiError::new("JWT_TOKEN_MISSING", message),
        ),
        DomainError::NotFound => (StatusCode::NOT_FOUND, ApiError::new("NOT_FOUND", message)),
        DomainError::Unauthorized => (
            StatusCode::UNAUTHORIZED,
            ApiError::new("UNAUTHORIZED", message),
        ),
        DomainError::BadRequest(msg) => (
            StatusCode::BAD_REQUEST,
            ApiError::new("BAD_REQUEST", msg.clone()),
        ),
        DomainError::Database(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::new("DATABASE_ERROR", "Database operation failed"),
        ),
        DomainError::Internal(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::new("INTERNAL_ERROR", "Internal Server Error"),
        ),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let AppError::Domain(err @ (DomainError::Database(_) | DomainError::Internal(_))) =
            &self
        {
            tracing::error!(error = %err, "Request failed");
        }

        let (status, error) = self.status_and_body();
        (status, Json(error)).into_response()
    }
}

impl From<DomainError> for AppError {
    fn from(err: DomainError) -> Self {
        AppError::Domain(err)
    }
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        let fields = errors
            .field_errors()
            .into_iter()
            .map(|(field, errs)| {
                let messages = errs
                    .iter()
                    .map(|e| {
                        e.message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| format!("{field} is invalid ({})", e.code))
                    })
                    .collect();
                (field.to_string(), messages)
            })
            .collect();
        AppError::Validation(fields)
    }
}
