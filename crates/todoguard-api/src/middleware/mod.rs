//! HTTP middleware
//!
//! Order on the way in: rate limit, CSRF, sanitizer, then the access guard
//! (see [`crate::auth::guard`]). Security headers wrap everything in
//! production.

pub mod csrf;
pub mod rate_limit;
pub mod sanitize;
pub mod security_headers;

pub use csrf::{csrf, CsrfProtection, CSRF_HEADER};
pub use rate_limit::{rate_limit, ClientRateLimiter};
pub use sanitize::{sanitize, InjectionRules, Sanitizer};
pub use security_headers::security_headers_middleware;
