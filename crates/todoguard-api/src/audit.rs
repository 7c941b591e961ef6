//! Security audit logging for authentication events
//!
//! Every event is emitted at INFO level on the `audit` target so it can be
//! routed separately from application logs, e.g.
//! `RUST_LOG=audit=info,todoguard_api=warn`.
//!
//! ```ignore
//! use todoguard_api::audit::{audit_log, AuditEvent, RequestContext};
//!
//! audit_log(&AuditEvent::LoginSuccess {
//!     user_id: user.id,
//!     email: user.email.clone(),
//!     context: RequestContext::from_headers(&headers),
//! });
//! ```

use axum::http::{header, HeaderMap};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

/// Client details attached to every event
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestContext {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl RequestContext {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            ip_address: extract_ip_address(headers),
            user_agent: extract_user_agent(headers),
        }
    }
}

/// Security audit events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum AuditEvent {
    SignupSuccess {
        user_id: Uuid,
        email: String,
        context: RequestContext,
    },

    SignupFailure {
        email: String,
        reason: String,
        context: RequestContext,
    },

    LoginSuccess {
        user_id: Uuid,
        email: String,
        context: RequestContext,
    },

    LoginFailure {
        email: String,
        reason: String,
        context: RequestContext,
    },

    /// Refresh token exchanged for a new pair
    TokenRefresh {
        user_id: Uuid,
        context: RequestContext,
    },

    Logout {
        user_id: Uuid,
        session_id: Uuid,
        context: RequestContext,
    },

    /// Bearer token rejected by the guard
    InvalidToken {
        path: String,
        reason: String,
        context: RequestContext,
    },

    /// Request rejected by the sanitizer
    ContentRejected {
        path: String,
        field: String,
        context: RequestContext,
    },
}

impl AuditEvent {
    fn summary(&self) -> &'static str {
        match self {
            AuditEvent::SignupSuccess { .. } => "Signup successful",
            AuditEvent::SignupFailure { .. } => "Signup failed",
            AuditEvent::LoginSuccess { .. } => "Login successful",
            AuditEvent::LoginFailure { .. } => "Login failed",
            AuditEvent::TokenRefresh { .. } => "Token refresh",
            AuditEvent::Logout { .. } => "User logout",
            AuditEvent::InvalidToken { .. } => "Invalid token",
            AuditEvent::ContentRejected { .. } => "Content rejected",
        }
    }

    fn context(&self) -> &RequestContext {
        match self {
            AuditEvent::SignupSuccess { context, .. }
            | AuditEvent::SignupFailure { context, .. }
            | AuditEvent::LoginSuccess { context, .. }
            | AuditEvent::LoginFailure { context, .. }
            | AuditEvent::TokenRefresh { context, .. }
            | AuditEvent::Logout { context, .. }
            | AuditEvent::InvalidToken { context, .. }
            | AuditEvent::ContentRejected { context, .. } => context,
        }
    }
}

/// Log a security audit event with structured fields
///
/// The full event is attached as JSON in the `event` field; the client IP
/// is repeated as its own field for quick filtering.
pub fn audit_log(event: &AuditEvent) {
    let event_json = serde_json::to_string(event)
        .unwrap_or_else(|e| format!("{{\"error\":\"Failed to serialize audit event: {e}\"}}"));

    info!(
        target: "audit",
        event = %event_json,
        ip_address = ?event.context().ip_address,
        "{}",
        event.summary()
    );
}

/// Extract IP address from request headers
///
/// Checks X-Forwarded-For, then X-Real-IP.
pub fn extract_ip_address(headers: &HeaderMap) -> Option<String> {
    if let Some(xff) = headers.get("x-forwarded-for") {
        if let Ok(xff_str) = xff.to_str() {
            // First hop is the client
            if let Some(first_ip) = xff_str.split(',').next() {
                let ip = first_ip.trim();
                if !ip.is_empty() {
                    return Some(ip.to_string());
                }
            }
        }
    }

    headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim().to_string())
}

/// Extract user agent from request headers
pub fn extract_user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::USER_AGENT)
        .and_then(|ua| ua.to_str().ok())
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audit_event_serialization() {
        let event = AuditEvent::LoginSuccess {
            user_id: Uuid::new_v4(),
            email: "test@example.com".to_string(),
            context: RequestContext {
                ip_address: Some("192.168.1.1".to_string()),
                user_agent: None,
            },
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event_type\":\"login_success\""));
        assert!(json.contains("test@example.com"));
    }

    #[test]
    fn test_audit_log_does_not_panic() {
        audit_log(&AuditEvent::ContentRejected {
            path: "/todo".to_string(),
            field: "title".to_string(),
            context: RequestContext::default(),
        });
    }

    #[test]
    fn test_extract_ip_from_x_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            "203.0.113.1, 198.51.100.1".parse().unwrap(),
        );

        assert_eq!(
            extract_ip_address(&headers),
            Some("203.0.113.1".to_string())
        );
    }

    #[test]
    fn test_extract_ip_from_x_real_ip() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", "203.0.113.1".parse().unwrap());

        assert_eq!(
            extract_ip_address(&headers),
            Some("203.0.113.1".to_string())
        );
    }

    #[test]
    fn test_request_context_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(header::USER_AGENT, "Mozilla/5.0 (Test)".parse().unwrap());

        let context = RequestContext::from_headers(&headers);
        assert_eq!(context.user_agent.as_deref(), Some("Mozilla/5.0 (Test)"));
        assert_eq!(context.ip_address, None);
    }
}
