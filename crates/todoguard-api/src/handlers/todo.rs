//! Todo API handlers
//!
//! Every route here is protected. Reads of the caller's own list and all
//! writes are scoped to the authenticated user.

use super::PaginationQuery;
use crate::auth::{AuthenticatedUser, MessageResponse};
use crate::error::AppError;
use crate::extract::{ValidatedJson, ValidatedQuery};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use todoguard_core::{
    DomainError, NewTodo, Todo, TodoPage, TodoPatch, TodoQuery, TodoRepository,
};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Create todo request
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateTodoRequest {
    #[validate(length(min = 1, message = "title should not be empty"))]
    #[schema(example = "Buy groceries")]
    pub title: String,

    #[validate(length(min = 1, message = "description should not be empty"))]
    #[schema(example = "Milk, eggs, bread")]
    pub description: String,

    /// Defaults to `false`
    #[serde(default)]
    #[schema(example = false)]
    pub status: bool,
}

/// Partial todo update; omitted fields are left untouched
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateTodoRequest {
    #[validate(length(min = 1, message = "title should not be empty"))]
    pub title: Option<String>,

    pub description: Option<String>,

    pub status: Option<bool>,
}

impl From<UpdateTodoRequest> for TodoPatch {
    fn from(request: UpdateTodoRequest) -> Self {
        Self {
            title: request.title,
            description: request.description,
            status: request.status,
        }
    }
}

/// Create a todo owned by the caller
#[utoipa::path(
    post,
    path = "/todo",
    tag = "todo",
    request_body = CreateTodoRequest,
    responses(
        (status = 201, description = "Data created", body = Todo),
        (status = 401, description = "Session expired", body = crate::error::ApiError),
        (status = 412, description = "Validation failed", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn create(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthenticatedUser>,
    ValidatedJson(request): ValidatedJson<CreateTodoRequest>,
) -> Result<impl IntoResponse, AppError> {
    let todo = state
        .store
        .create_todo(
            caller.user.id,
            NewTodo {
                title: request.title,
                description: Some(request.description),
                status: request.status,
            },
        )
        .await?;

    tracing::debug!(todo_id = %todo.id, user_id = %caller.user.id, "Todo created");
    Ok((StatusCode::CREATED, Json(todo)))
}

/// List the caller's todos
#[utoipa::path(
    get,
    path = "/todo",
    tag = "todo",
    params(PaginationQuery),
    responses(
        (status = 200, description = "Data fetched", body = TodoPage),
        (status = 400, description = "Unknown sort field", body = crate::error::ApiError),
        (status = 412, description = "Validation failed", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_own(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthenticatedUser>,
    ValidatedQuery(query): ValidatedQuery<PaginationQuery>,
) -> Result<Json<TodoPage>, AppError> {
    list(&state, Some(caller.user.id), &query).await
}

/// List every user's todos
#[utoipa::path(
    get,
    path = "/todo/allTodo",
    tag = "todo",
    params(PaginationQuery),
    responses(
        (status = 200, description = "Data fetched", body = TodoPage),
        (status = 400, description = "Unknown sort field", body = crate::error::ApiError),
        (status = 412, description = "Validation failed", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_all(
    State(state): State<Arc<AppState>>,
    ValidatedQuery(query): ValidatedQuery<PaginationQuery>,
) -> Result<Json<TodoPage>, AppError> {
    list(&state, None, &query).await
}

async fn list(
    state: &AppState,
    owner: Option<Uuid>,
    query: &PaginationQuery,
) -> Result<Json<TodoPage>, AppError> {
    let page = state
        .store
        .list_todos(&TodoQuery {
            owner,
            status: query.status,
            page: query.to_page_query(),
        })
        .await?;
    Ok(Json(page))
}

/// Update one of the caller's todos
#[utoipa::path(
    patch,
    path = "/todo/{id}",
    tag = "todo",
    params(("id" = Uuid, Path, description = "Todo id")),
    request_body = UpdateTodoRequest,
    responses(
        (status = 200, description = "Update successful", body = Todo),
        (status = 401, description = "Todo belongs to another user", body = crate::error::ApiError),
        (status = 404, description = "Not found", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn update(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
    ValidatedJson(request): ValidatedJson<UpdateTodoRequest>,
) -> Result<Json<Todo>, AppError> {
    let todo = state
        .store
        .find_todo(id)
        .await?
        .ok_or(DomainError::NotFound)?;
    if todo.user_id != caller.user.id {
        return Err(DomainError::Unauthorized.into());
    }

    let patch = TodoPatch::from(request);
    if patch.is_empty() {
        return Ok(Json(todo));
    }

    let updated = state
        .store
        .update_todo(id, &patch)
        .await?
        .ok_or(DomainError::NotFound)?;
    Ok(Json(updated))
}

/// Delete one of the caller's todos
#[utoipa::path(
    delete,
    path = "/todo/{id}",
    tag = "todo",
    params(("id" = Uuid, Path, description = "Todo id")),
    responses(
        (status = 200, description = "Delete successful", body = MessageResponse),
        (status = 404, description = "Not found or not owned", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<MessageResponse>, AppError> {
    if !state.store.delete_todo(id, caller.user.id).await? {
        return Err(DomainError::NotFound.into());
    }
    Ok(Json(MessageResponse::new("Delete Successful")))
}
