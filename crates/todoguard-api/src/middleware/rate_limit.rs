//! Per-client rate limiting
//!
//! Each client IP gets a GCRA bucket of `throttle.limit` requests that
//! refills evenly over `throttle.ttl_secs`. Requests over the limit get 429.
//! The client key is the first `X-Forwarded-For` hop, then `X-Real-IP`, then
//! the socket peer address.

use crate::audit::extract_ip_address;
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use todoguard_core::ThrottleConfig;

/// Keyed limiter over client IPs
pub struct ClientRateLimiter {
    limiter: DefaultKeyedRateLimiter<String>,
}

impl ClientRateLimiter {
    pub fn new(config: &ThrottleConfig) -> Self {
        let limit = NonZeroU32::new(config.limit).unwrap_or(NonZeroU32::MIN);
        let window = Duration::from_secs(config.ttl_secs.max(1));

        let quota = Quota::with_period(window / limit.get())
            .unwrap_or_else(|| Quota::per_second(limit))
            .allow_burst(limit);

        Self {
            limiter: RateLimiter::keyed(quota),
        }
    }

    /// Take one request from `key`'s bucket
    pub fn check(&self, key: &str) -> bool {
        self.limiter.check_key(&key.to_string()).is_ok()
    }

    /// Drop buckets that are back to full
    pub fn retain_recent(&self) {
        self.limiter.retain_recent();
    }
}

fn client_key(request: &Request) -> String {
    extract_ip_address(request.headers())
        .or_else(|| {
            request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        })
        .unwrap_or_else(|| "unknown".to_string())
}

/// Rate limiting middleware
pub async fn rate_limit(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let key = client_key(&request);
    if !state.rate_limiter.check(&key) {
        tracing::warn!(client = %key, "Rate limit exceeded");
        return AppError::TooManyRequests.into_response();
    }
    next.run(request).await
}
