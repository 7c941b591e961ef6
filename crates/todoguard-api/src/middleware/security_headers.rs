//! Security headers middleware
//!
//! Installed only in production. Sets a restrictive content security policy
//! plus the usual hardening headers on every response, error responses
//! included.

use axum::{
    extract::Request,
    http::{header, HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};

const CONTENT_SECURITY_POLICY: &str = "default-src 'self' https://polyfill.io https://*.cloudflare.com; \
     script-src 'self' https://polyfill.io https://*.cloudflare.com; \
     style-src 'self' https:; \
     img-src 'self' data: blob:; \
     font-src 'self' https: data:; \
     child-src 'self' blob:; \
     frame-src 'self'; \
     base-uri 'self'; \
     form-action 'self'; \
     frame-ancestors 'self'; \
     object-src 'none'; \
     upgrade-insecure-requests";

const STATIC_HEADERS: &[(&str, &str)] = &[
    ("cross-origin-embedder-policy", "require-corp"),
    ("cross-origin-opener-policy", "same-origin"),
    ("cross-origin-resource-policy", "same-origin"),
    ("origin-agent-cluster", "?1"),
    ("x-dns-prefetch-control", "off"),
    ("x-download-options", "noopen"),
    ("x-permitted-cross-domain-policies", "by-content-type"),
];

/// Security headers middleware
pub async fn security_headers_middleware(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static(CONTENT_SECURITY_POLICY),
    );

    // Prevent MIME type sniffing
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );

    headers.insert(
        header::X_FRAME_OPTIONS,
        HeaderValue::from_static("SAMEORIGIN"),
    );

    // Disable legacy XSS auditors
    headers.insert(header::X_XSS_PROTECTION, HeaderValue::from_static("0"));

    headers.insert(
        header::STRICT_TRANSPORT_SECURITY,
        HeaderValue::from_static("max-age=15552000; includeSubDomains"),
    );

    headers.insert(
        header::REFERRER_POLICY,
        HeaderValue::from_static("no-referrer"),
    );

    for &(name, value) in STATIC_HEADERS {
        headers.insert(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        );
    }

    headers.remove("x-powered-by");

    response
}
