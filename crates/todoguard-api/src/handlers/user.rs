//! User API handlers

use super::PaginationQuery;
use crate::auth::AuthenticatedUser;
use crate::error::AppError;
use crate::extract::ValidatedQuery;
use crate::state::AppState;
use axum::{extract::State, Extension, Json};
use std::sync::Arc;
use todoguard_core::{DomainError, User, UserPage, UserRepository};

/// Current user profile
#[utoipa::path(
    get,
    path = "/user/get-user",
    tag = "user",
    responses(
        (status = 200, description = "User data fetched", body = User),
        (status = 401, description = "Session expired", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthenticatedUser>,
) -> Result<Json<User>, AppError> {
    // Re-read so the profile reflects writes made since the guard ran
    let user = state
        .store
        .find_user(caller.user.id)
        .await?
        .ok_or(DomainError::UserNotExist)?;
    Ok(Json(user))
}

/// Paginated user list
#[utoipa::path(
    get,
    path = "/user/get-all",
    tag = "user",
    params(PaginationQuery),
    responses(
        (status = 200, description = "Data fetched", body = UserPage),
        (status = 400, description = "Unknown sort field", body = crate::error::ApiError),
        (status = 412, description = "Validation failed", body = crate::error::ApiError),
    )
)]
pub async fn get_all(
    State(state): State<Arc<AppState>>,
    ValidatedQuery(query): ValidatedQuery<PaginationQuery>,
) -> Result<Json<UserPage>, AppError> {
    let page = state.store.list_users(&query.to_page_query()).await?;
    Ok(Json(page))
}
