//! Health check handler

use crate::state::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use utoipa::ToSchema;

/// Status of one dependency
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ComponentStatus {
    /// `up` or `down`
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// `ok` or `error`
    pub status: String,
    pub info: BTreeMap<String, ComponentStatus>,
    pub uptime_secs: u64,
}

/// Ping the store
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "All dependencies up", body = HealthResponse),
        (status = 503, description = "A dependency is down", body = HealthResponse),
    )
)]
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let database = match state.store.ping().await {
        Ok(()) => ComponentStatus {
            status: "up".to_string(),
            message: None,
        },
        Err(e) => {
            tracing::warn!(error = %e, backend = state.store.backend_name(), "Health check failed");
            ComponentStatus {
                status: "down".to_string(),
                message: Some(e.to_string()),
            }
        }
    };

    let healthy = database.status == "up";
    let response = HealthResponse {
        status: if healthy { "ok" } else { "error" }.to_string(),
        info: BTreeMap::from([("database".to_string(), database)]),
        uptime_secs: state.uptime_secs(),
    };

    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(response))
}
