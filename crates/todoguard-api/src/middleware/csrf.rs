//! CSRF double-submit protection
//!
//! `GET /auth/csrf-token` stores a random secret in an HttpOnly cookie and
//! returns a token bound to it. State-changing requests from browsers
//! (POST/PUT/PATCH carrying an `Origin` header) must echo that token in
//! `x-csrf-token`. The check is off in dev and skips excluded paths.

use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, Method},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use hmac::{digest::InvalidLength, Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use std::sync::Arc;
use todoguard_core::SecurityConfig;

pub const CSRF_HEADER: &str = "x-csrf-token";

type HmacSha256 = Hmac<Sha256>;

/// Issues and checks CSRF tokens
#[derive(Clone)]
pub struct CsrfProtection {
    mac: HmacSha256,
    cookie_name: String,
    max_age_secs: i64,
    exclude_routes: Vec<String>,
    enforced: bool,
}

impl CsrfProtection {
    pub fn new(
        config: &SecurityConfig,
        secret_key: &str,
        enforced: bool,
    ) -> Result<Self, InvalidLength> {
        let mut mac = HmacSha256::new_from_slice(secret_key.as_bytes())?;
        mac.update(b"csrf:");

        Ok(Self {
            mac,
            cookie_name: config.csrf_cookie_name.clone(),
            max_age_secs: config.csrf_cookie_max_age_secs,
            exclude_routes: config.csrf_exclude_routes.clone(),
            enforced,
        })
    }

    pub fn is_enforced(&self) -> bool {
        self.enforced
    }

    /// Fresh cookie secret and its token
    pub fn issue(&self) -> (String, String) {
        let mut secret = [0u8; 18];
        rand::thread_rng().fill_bytes(&mut secret);
        let secret = hex::encode(secret);
        let token = self.token_for(&secret);
        (secret, token)
    }

    fn keyed(&self, secret: &str) -> HmacSha256 {
        let mut mac = self.mac.clone();
        mac.update(secret.as_bytes());
        mac
    }

    /// Hex HMAC-SHA256 of `secret` under the server key
    pub fn token_for(&self, secret: &str) -> String {
        hex::encode(self.keyed(secret).finalize().into_bytes())
    }

    /// Constant-time check of `token` against `secret`
    pub fn verify(&self, secret: &str, token: &str) -> bool {
        match hex::decode(token) {
            Ok(tag) => self.keyed(secret).verify_slice(&tag).is_ok(),
            Err(_) => false,
        }
    }

    /// Cookie carrying `secret`; `Secure` whenever the check is enforced
    pub fn cookie(&self, secret: String) -> Cookie<'static> {
        Cookie::build((self.cookie_name.clone(), secret))
            .path("/")
            .max_age(time::Duration::seconds(self.max_age_secs))
            .http_only(true)
            .same_site(SameSite::Strict)
            .secure(self.enforced)
            .build()
    }

    pub fn is_excluded(&self, path: &str) -> bool {
        self.exclude_routes.iter().any(|route| route == path)
    }

    /// Whether this request must carry a valid token
    fn requires_check(&self, method: &Method, headers: &HeaderMap, path: &str) -> bool {
        self.enforced
            && matches!(*method, Method::POST | Method::PUT | Method::PATCH)
            && headers.contains_key(header::ORIGIN)
            && !self.is_excluded(path)
    }

    fn check(&self, headers: &HeaderMap) -> Result<(), AppError> {
        let jar = CookieJar::from_headers(headers);
        let secret = jar.get(&self.cookie_name).map(|c| c.value().to_string());
        let token = headers.get(CSRF_HEADER).and_then(|v| v.to_str().ok());

        match (secret, token) {
            (Some(secret), Some(token)) if self.verify(&secret, token) => Ok(()),
            _ => Err(AppError::Forbidden("Invalid CSRF token".to_string())),
        }
    }
}

/// CSRF middleware
pub async fn csrf(State(state): State<Arc<AppState>>, request: Request, next: Next) -> Response {
    let prefix = state.config.server.route_prefix();
    let path = request.uri().path();
    let path = path
        .strip_prefix(prefix.as_str())
        .filter(|p| !prefix.is_empty() && p.starts_with('/'))
        .unwrap_or(path);

    if state
        .csrf
        .requires_check(request.method(), request.headers(), path)
    {
        if let Err(err) = state.csrf.check(request.headers()) {
            tracing::warn!(path = %request.uri().path(), "CSRF check failed");
            return err.into_response();
        }
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn protection(enforced: bool) -> CsrfProtection {
        CsrfProtection::new(&SecurityConfig::default(), "secret-key", enforced).unwrap()
    }

    fn browser_post(cookie: Option<&str>, token: Option<&str>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::ORIGIN, HeaderValue::from_static("https://app.example.com"));
        if let Some(cookie) = cookie {
            headers.insert(
                header::COOKIE,
                HeaderValue::from_str(&format!("_csrf={cookie}")).unwrap(),
            );
        }
        if let Some(token) = token {
            headers.insert(CSRF_HEADER, HeaderValue::from_str(token).unwrap());
        }
        headers
    }

    #[test]
    fn test_issued_token_verifies() {
        let csrf = protection(true);
        let (secret, token) = csrf.issue();
        assert!(csrf.verify(&secret, &token));
        assert!(!csrf.verify(&secret, "0000"));

        let (other_secret, _) = csrf.issue();
        assert!(!csrf.verify(&other_secret, &token));
    }

    #[test]
    fn test_tokens_bound_to_server_key() {
        let a = CsrfProtection::new(&SecurityConfig::default(), "key-a", true).unwrap();
        let b = CsrfProtection::new(&SecurityConfig::default(), "key-b", true).unwrap();
        let (secret, token) = a.issue();
        assert!(!b.verify(&secret, &token));
    }

    #[test]
    fn test_requires_check() {
        let csrf = protection(true);
        let headers = browser_post(None, None);

        assert!(csrf.requires_check(&Method::POST, &headers, "/todo"));
        assert!(csrf.requires_check(&Method::PATCH, &headers, "/todo/1"));
        assert!(!csrf.requires_check(&Method::GET, &headers, "/todo"));
        assert!(!csrf.requires_check(&Method::DELETE, &headers, "/todo/1"));
        assert!(!csrf.requires_check(&Method::POST, &headers, "/auth/login"));
        assert!(!csrf.requires_check(&Method::POST, &HeaderMap::new(), "/todo"));
        assert!(!protection(false).requires_check(&Method::POST, &headers, "/todo"));
    }

    #[test]
    fn test_check_cookie_and_header() {
        let csrf = protection(true);
        let (secret, token) = csrf.issue();

        assert!(csrf.check(&browser_post(Some(&secret), Some(&token))).is_ok());
        assert!(csrf.check(&browser_post(Some(&secret), None)).is_err());
        assert!(csrf.check(&browser_post(None, Some(&token))).is_err());
        assert!(csrf
            .check(&browser_post(Some("tampered"), Some(&token)))
            .is_err());
    }

    #[test]
    fn test_token_is_hmac_of_secret() {
        let csrf = protection(true);
        let mut mac = HmacSha256::new_from_slice(b"secret-key").unwrap();
        mac.update(b"csrf:abc");
        assert_eq!(csrf.token_for("abc"), hex::encode(mac.finalize().into_bytes()));

        // Not hex, wrong length, flipped bit
        let token = csrf.token_for("abc");
        assert!(!csrf.verify("abc", "not-hex"));
        assert!(!csrf.verify("abc", &token[..32]));
        let mut flipped = hex::decode(&token).unwrap();
        flipped[0] ^= 1;
        assert!(!csrf.verify("abc", &hex::encode(flipped)));
    }

    #[test]
    fn test_cookie_attributes() {
        let cookie = protection(true).cookie("abc".to_string());
        assert_eq!(cookie.name(), "_csrf");
        assert_eq!(cookie.value(), "abc");
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.max_age(), Some(time::Duration::seconds(300)));
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Strict));
        assert_eq!(cookie.secure(), Some(true));

        let dev = protection(false).cookie("abc".to_string());
        assert_ne!(dev.secure(), Some(true));
    }
}
