//! Authentication API handlers

use crate::audit::{audit_log, AuditEvent, RequestContext};
use crate::auth::{
    AuthResponse, AuthenticatedUser, CsrfTokenResponse, LoginRequest, MessageResponse,
    SignupRequest, TokenPair,
};
use crate::error::AppError;
use crate::extract::ValidatedJson;
use crate::state::AppState;
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;
use todoguard_core::UserRole;

/// Sign up a new user
///
/// The password must be the base64 RSA ciphertext of the plaintext,
/// encrypted with the server's public key. New accounts get the `user` role.
#[utoipa::path(
    post,
    path = "/auth/signup",
    tag = "auth",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "User created", body = AuthResponse),
        (status = 401, description = "Password could not be decrypted", body = crate::error::ApiError),
        (status = 409, description = "User already exists", body = crate::error::ApiError),
        (status = 412, description = "Validation failed", body = crate::error::ApiError),
    )
)]
pub async fn signup(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    ValidatedJson(request): ValidatedJson<SignupRequest>,
) -> Result<impl IntoResponse, AppError> {
    let context = RequestContext::from_headers(&headers);
    let email = request.email.trim().to_lowercase();

    match state.auth.sign_up(request).await {
        Ok(response) => {
            audit_log(&AuditEvent::SignupSuccess {
                user_id: response.user.id,
                email,
                context,
            });
            Ok((StatusCode::CREATED, Json(response)))
        }
        Err(err) => {
            audit_log(&AuditEvent::SignupFailure {
                email,
                reason: err.to_string(),
                context,
            });
            Err(err.into())
        }
    }
}

/// Log in as a `user`
#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials or blocked user", body = crate::error::ApiError),
        (status = 404, description = "User not exist", body = crate::error::ApiError),
        (status = 412, description = "Validation failed", body = crate::error::ApiError),
    )
)]
pub async fn login(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    ValidatedJson(request): ValidatedJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let context = RequestContext::from_headers(&headers);
    let email = request.email.trim().to_lowercase();

    match state.auth.sign_in(request, UserRole::User).await {
        Ok(response) => {
            audit_log(&AuditEvent::LoginSuccess {
                user_id: response.user.id,
                email,
                context,
            });
            Ok(Json(response))
        }
        Err(err) => {
            audit_log(&AuditEvent::LoginFailure {
                email,
                reason: err.to_string(),
                context,
            });
            Err(err.into())
        }
    }
}

/// Exchange the bearer refresh token for a new token pair
///
/// Both tokens are rotated; the presented refresh token stops working.
#[utoipa::path(
    post,
    path = "/auth/refresh",
    tag = "auth",
    responses(
        (status = 200, description = "New token pair", body = TokenPair),
        (status = 401, description = "Session expired", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Extension(caller): Extension<AuthenticatedUser>,
) -> Result<Json<TokenPair>, AppError> {
    let tokens = state
        .auth
        .rotate_refresh_token(&caller.token, caller.user.id)
        .await?;

    audit_log(&AuditEvent::TokenRefresh {
        user_id: caller.user.id,
        context: RequestContext::from_headers(&headers),
    });

    Ok(Json(tokens))
}

/// End the current session
#[utoipa::path(
    post,
    path = "/auth/logout",
    tag = "auth",
    responses(
        (status = 200, description = "Logged out", body = MessageResponse),
        (status = 401, description = "Session expired", body = crate::error::ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Extension(caller): Extension<AuthenticatedUser>,
) -> Result<Json<MessageResponse>, AppError> {
    let session = state.auth.sign_out(caller.user.id, &caller.token).await?;

    audit_log(&AuditEvent::Logout {
        user_id: caller.user.id,
        session_id: session.id,
        context: RequestContext::from_headers(&headers),
    });

    Ok(Json(MessageResponse::new("Logout Successful")))
}

/// Issue a CSRF token and set its cookie
#[utoipa::path(
    get,
    path = "/auth/csrf-token",
    tag = "auth",
    responses(
        (status = 200, description = "CSRF token issued", body = CsrfTokenResponse),
    )
)]
pub async fn csrf_token(State(state): State<Arc<AppState>>, jar: CookieJar) -> impl IntoResponse {
    let (secret, csrf_token) = state.csrf.issue();

    (
        jar.add(state.csrf.cookie(secret)),
        Json(CsrfTokenResponse { csrf_token }),
    )
}
