//! Access guard
//!
//! Every route declares its access level when it is registered; the router
//! builder collects those records into a [`RouteTable`] keyed by
//! (method, route pattern). The guard middleware looks the matched route up
//! and either lets the request through, or resolves the bearer token to a
//! user and attaches it to the request extensions.

use crate::audit::{audit_log, AuditEvent, RequestContext};
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{MatchedPath, Request, State},
    http::{header, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::collections::HashMap;
use std::sync::Arc;
use todoguard_core::{DomainError, User};

/// Access level of a route
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// No credentials required
    Public,
    /// Bearer access token required
    Protected,
    /// Bearer refresh token required
    RefreshFlow,
}

/// Lookup table of (method, route pattern) -> access level
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    entries: HashMap<(Method, String), Access>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, method: Method, path: impl Into<String>, access: Access) {
        self.entries.insert((method, path.into()), access);
    }

    /// Access level for a matched route; HEAD falls back to GET
    pub fn lookup(&self, method: &Method, path: &str) -> Option<Access> {
        let key = (method.clone(), path.to_string());
        if let Some(access) = self.entries.get(&key) {
            return Some(*access);
        }
        if method == Method::HEAD {
            return self.entries.get(&(Method::GET, path.to_string())).copied();
        }
        None
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The caller resolved by the guard
///
/// Handlers extract it with `Extension<AuthenticatedUser>`.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user: User,
    /// Raw bearer token the request carried
    pub token: String,
}

/// State handed to the guard middleware
#[derive(Clone)]
pub struct GuardState {
    pub app: Arc<AppState>,
    pub routes: Arc<RouteTable>,
}

/// Guard middleware
///
/// Unmatched routes pass through so the router's 404 surfaces unchanged.
pub async fn guard(State(state): State<GuardState>, mut request: Request, next: Next) -> Response {
    let Some(path) = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
    else {
        return next.run(request).await;
    };

    let access = match state.routes.lookup(request.method(), &path) {
        None | Some(Access::Public) => return next.run(request).await,
        Some(access) => access,
    };

    // Absent header: bare 401, no detail
    let Some(auth_header) = request.headers().get(header::AUTHORIZATION) else {
        return StatusCode::UNAUTHORIZED.into_response();
    };

    let token = match auth_header
        .to_str()
        .ok()
        .and_then(|value| value.split_once(' '))
    {
        Some(("Bearer", token)) if !token.trim().is_empty() => token.trim().to_string(),
        _ => return AppError::from(DomainError::JwtTokenMissing).into_response(),
    };

    let refresh_flow = access == Access::RefreshFlow;
    match state.app.auth.verify_access_token(&token, refresh_flow).await {
        Ok(user) => {
            request
                .extensions_mut()
                .insert(AuthenticatedUser { user, token });
            next.run(request).await
        }
        Err(err) => {
            audit_log(&AuditEvent::InvalidToken {
                path,
                reason: err.to_string(),
                context: RequestContext::from_headers(request.headers()),
            });
            AppError::from(err).into_response()
        }
    }
}
