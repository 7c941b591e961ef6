//! API integration tests
//!
//! Every test runs the full router over the in-memory store with a freshly
//! generated RSA key and cheap Argon2 parameters.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use rsa::pkcs1::EncodeRsaPrivateKey;
use rsa::pkcs8::LineEnding;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use serde_json::{json, Value};
use std::sync::Arc;
use todoguard_api::auth::PasswordConfig;
use todoguard_api::{create_router, AppState};
use todoguard_core::{AppConfig, Environment, MemoryStore};
use tower::ServiceExt;

struct TestApp {
    router: Router,
    public_key: RsaPublicKey,
}

impl TestApp {
    fn new() -> Self {
        Self::with_config(AppConfig::default())
    }

    fn with_config(mut config: AppConfig) -> Self {
        let key = RsaPrivateKey::new(&mut rand::thread_rng(), 1024).unwrap();
        config.auth.rsa_private_key = key.to_pkcs1_pem(LineEnding::LF).unwrap().to_string();

        let state = AppState::with_password_config(
            config,
            Arc::new(MemoryStore::new()),
            PasswordConfig {
                memory_cost: 8192,
                time_cost: 1,
                parallelism: 1,
                output_len: Some(32),
            },
        )
        .unwrap();

        Self {
            router: create_router(Arc::new(state)),
            public_key: RsaPublicKey::from(&key),
        }
    }

    fn encrypt(&self, password: &str) -> String {
        let blob = self
            .public_key
            .encrypt(
                &mut rand::thread_rng(),
                Oaep::new::<sha1::Sha1>(),
                password.as_bytes(),
            )
            .unwrap();
        STANDARD.encode(blob)
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap_or(Value::Null)
        };
        (status, json)
    }

    async fn sign_up(&self, email: &str) -> Value {
        let (status, body) = self
            .send(create_json_request(
                "POST",
                "/auth/signup",
                None,
                Some(json!({
                    "name": "Jane Doe",
                    "email": email,
                    "password": self.encrypt("Secret123!"),
                })),
            ))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body
    }
}

/// Helper to create a test request
fn create_json_request(
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }

    match body {
        Some(json_body) => builder
            .body(Body::from(serde_json::to_string(&json_body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

fn access_token(auth: &Value) -> String {
    auth["accessToken"].as_str().unwrap().to_string()
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health_check() {
    let app = TestApp::new();

    let (status, body) = app
        .send(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["info"]["database"]["status"], "up");
}

#[tokio::test]
async fn test_unknown_route() {
    let app = TestApp::new();

    let (status, _) = app
        .send(create_json_request("GET", "/nope", None, None))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_health_ignores_global_prefix() {
    let mut config = AppConfig::default();
    config.server.global_prefix = "api".to_string();
    let app = TestApp::with_config(config);

    let (status, _) = app
        .send(create_json_request("GET", "/health", None, None))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .send(create_json_request("GET", "/api/user/get-all", None, None))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .send(create_json_request("GET", "/user/get-all", None, None))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// =============================================================================
// Auth
// =============================================================================

#[tokio::test]
async fn test_signup_and_login() {
    let app = TestApp::new();

    let auth = app.sign_up("jane@example.com").await;
    assert_eq!(auth["user"]["email"], "jane@example.com");
    assert!(auth["user"].get("password").is_none());
    assert!(auth["accessToken"].is_string());
    assert!(auth["refreshToken"].is_string());

    let (status, body) = app
        .send(create_json_request(
            "POST",
            "/auth/login",
            None,
            Some(json!({
                "email": "jane@example.com",
                "password": app.encrypt("Secret123!"),
            })),
        ))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(body["user"]["lastLoginTime"].is_string());
}

#[tokio::test]
async fn test_duplicate_signup_conflicts() {
    let app = TestApp::new();
    app.sign_up("jane@example.com").await;

    let (status, body) = app
        .send(create_json_request(
            "POST",
            "/auth/signup",
            None,
            Some(json!({
                "name": "Jane Doe",
                "email": "jane@example.com",
                "password": app.encrypt("Secret123!"),
            })),
        ))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "USER_ALREADY_EXIST");
}

#[tokio::test]
async fn test_login_failures() {
    let app = TestApp::new();
    app.sign_up("jane@example.com").await;

    let (status, body) = app
        .send(create_json_request(
            "POST",
            "/auth/login",
            None,
            Some(json!({
                "email": "jane@example.com",
                "password": app.encrypt("wrong-password"),
            })),
        ))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "INVALID_CREDENTIALS");

    let (status, body) = app
        .send(create_json_request(
            "POST",
            "/auth/login",
            None,
            Some(json!({
                "email": "nobody@example.com",
                "password": app.encrypt("Secret123!"),
            })),
        ))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "USER_NOT_EXIST");
}

#[tokio::test]
async fn test_signup_validation() {
    let app = TestApp::new();

    let (status, _) = app
        .send(create_json_request(
            "POST",
            "/auth/signup",
            None,
            Some(json!({
                "name": "Jane Doe",
                "email": "not-an-email",
                "password": app.encrypt("Secret123!"),
            })),
        ))
        .await;
    assert_eq!(status, StatusCode::PRECONDITION_FAILED);
}

#[tokio::test]
async fn test_refresh_rotates_tokens() {
    let app = TestApp::new();
    let auth = app.sign_up("jane@example.com").await;
    let refresh = auth["refreshToken"].as_str().unwrap();

    // Access tokens are not accepted on the refresh route
    let (status, _) = app
        .send(create_json_request(
            "POST",
            "/auth/refresh",
            Some(&access_token(&auth)),
            None,
        ))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, rotated) = app
        .send(create_json_request("POST", "/auth/refresh", Some(refresh), None))
        .await;
    assert_eq!(status, StatusCode::OK, "{rotated}");
    assert!(rotated["accessToken"].is_string());

    // The spent refresh token no longer matches the session
    let (status, body) = app
        .send(create_json_request("POST", "/auth/refresh", Some(refresh), None))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "DEVICE_SESSION_EXPIRED");

    let (status, _) = app
        .send(create_json_request(
            "GET",
            "/user/get-user",
            Some(rotated["accessToken"].as_str().unwrap()),
            None,
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_logout_ends_session() {
    let app = TestApp::new();
    let auth = app.sign_up("jane@example.com").await;
    let token = access_token(&auth);

    let (status, body) = app
        .send(create_json_request("POST", "/auth/logout", Some(&token), None))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Logout Successful");

    let (status, body) = app
        .send(create_json_request("GET", "/user/get-user", Some(&token), None))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "DEVICE_SESSION_EXPIRED");
}

// =============================================================================
// Guard
// =============================================================================

#[tokio::test]
async fn test_guard_rejects_missing_and_malformed_headers() {
    let app = TestApp::new();

    let (status, _) = app
        .send(create_json_request("GET", "/user/get-user", None, None))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let request = Request::builder()
        .uri("/user/get-user")
        .header(header::AUTHORIZATION, "Basic abc")
        .body(Body::empty())
        .unwrap();
    let (status, body) = app.send(request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "JWT_TOKEN_MISSING");

    let (status, body) = app
        .send(create_json_request("GET", "/user/get-user", Some("garbage"), None))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "DEVICE_SESSION_EXPIRED");
}

#[tokio::test]
async fn test_public_route_needs_no_token() {
    let app = TestApp::new();
    app.sign_up("jane@example.com").await;

    let (status, body) = app
        .send(create_json_request("GET", "/user/get-all", None, None))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
}

// =============================================================================
// Sanitizer
// =============================================================================

#[tokio::test]
async fn test_sanitizer_rejects_injection_in_query() {
    let app = TestApp::new();

    let (status, body) = app
        .send(create_json_request(
            "GET",
            "/user/get-all?search=%27%20OR%201%3D1%20--",
            None,
            None,
        ))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "INVALID_CONTENT");
}

#[tokio::test]
async fn test_sanitizer_rejects_injection_in_body() {
    let app = TestApp::new();
    let auth = app.sign_up("jane@example.com").await;

    let (status, _) = app
        .send(create_json_request(
            "POST",
            "/todo",
            Some(&access_token(&auth)),
            Some(json!({"title": "x' or '1'='1", "description": "d"})),
        ))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_sanitizer_ignores_content_type_spelling() {
    let app = TestApp::new();
    let token = access_token(&app.sign_up("jane@example.com").await);

    for content_type in ["Application/JSON", "APPLICATION/JSON; charset=utf-8", "text/plain"] {
        let request = Request::builder()
            .method("POST")
            .uri("/todo")
            .header(header::CONTENT_TYPE, content_type)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::from(
                json!({
                    "title": "<script>alert(1)</script>' OR 1=1 --",
                    "description": "d",
                })
                .to_string(),
            ))
            .unwrap();
        let (status, body) = app.send(request).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{content_type}: {body}");
    }

    let (_, page) = app
        .send(create_json_request("GET", "/todo", Some(&token), None))
        .await;
    assert_eq!(page["total"], 0);
}

// =============================================================================
// Todos
// =============================================================================

#[tokio::test]
async fn test_todo_lifecycle() {
    let app = TestApp::new();
    let auth = app.sign_up("jane@example.com").await;
    let token = access_token(&auth);

    let (status, todo) = app
        .send(create_json_request(
            "POST",
            "/todo",
            Some(&token),
            Some(json!({"title": "Buy milk", "description": "Two litres"})),
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{todo}");
    assert_eq!(todo["status"], false);
    let id = todo["id"].as_str().unwrap().to_string();

    let (status, updated) = app
        .send(create_json_request(
            "PATCH",
            &format!("/todo/{id}"),
            Some(&token),
            Some(json!({"status": true})),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["status"], true);
    assert_eq!(updated["title"], "Buy milk");

    let (status, page) = app
        .send(create_json_request("GET", "/todo?status=true", Some(&token), None))
        .await;
    assert_eq!(status, StatusCode::OK, "{page}");
    assert_eq!(page["total"], 1);
    assert_eq!(page["data"][0]["id"], id.as_str());

    let (status, body) = app
        .send(create_json_request(
            "DELETE",
            &format!("/todo/{id}"),
            Some(&token),
            None,
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Delete Successful");

    let (status, page) = app
        .send(create_json_request("GET", "/todo", Some(&token), None))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 0);
}

#[tokio::test]
async fn test_todo_ownership() {
    let app = TestApp::new();
    let owner = access_token(&app.sign_up("owner@example.com").await);
    let other = access_token(&app.sign_up("other@example.com").await);

    let (_, todo) = app
        .send(create_json_request(
            "POST",
            "/todo",
            Some(&owner),
            Some(json!({"title": "Private", "description": "Mine"})),
        ))
        .await;
    let id = todo["id"].as_str().unwrap().to_string();

    let (status, _) = app
        .send(create_json_request(
            "PATCH",
            &format!("/todo/{id}"),
            Some(&other),
            Some(json!({"title": "Stolen"})),
        ))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .send(create_json_request(
            "DELETE",
            &format!("/todo/{id}"),
            Some(&other),
            None,
        ))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Other users see nothing in their own list but everything in allTodo
    let (_, own) = app
        .send(create_json_request("GET", "/todo", Some(&other), None))
        .await;
    assert_eq!(own["total"], 0);

    let (status, all) = app
        .send(create_json_request("GET", "/todo/allTodo", Some(&other), None))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(all["total"], 1);
}

#[tokio::test]
async fn test_update_missing_todo() {
    let app = TestApp::new();
    let token = access_token(&app.sign_up("jane@example.com").await);

    let (status, body) = app
        .send(create_json_request(
            "PATCH",
            &format!("/todo/{}", uuid::Uuid::new_v4()),
            Some(&token),
            Some(json!({"status": true})),
        ))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_pagination_validation() {
    let app = TestApp::new();

    let (status, _) = app
        .send(create_json_request("GET", "/user/get-all?limit=101", None, None))
        .await;
    assert_eq!(status, StatusCode::PRECONDITION_FAILED);

    let (status, _) = app
        .send(create_json_request("GET", "/user/get-all?page=0", None, None))
        .await;
    assert_eq!(status, StatusCode::PRECONDITION_FAILED);

    let (status, _) = app
        .send(create_json_request(
            "GET",
            "/user/get-all?page=5000000000&limit=10",
            None,
            None,
        ))
        .await;
    assert_eq!(status, StatusCode::PRECONDITION_FAILED);

    let (status, body) = app
        .send(create_json_request(
            "GET",
            "/user/get-all?sortField=password",
            None,
            None,
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BAD_REQUEST");
}

// =============================================================================
// CSRF
// =============================================================================

#[tokio::test]
async fn test_csrf_enforced_outside_dev() {
    let config = AppConfig {
        environment: Environment::Qa,
        ..AppConfig::default()
    };
    let app = TestApp::with_config(config);
    let token = access_token(&app.sign_up("jane@example.com").await);

    let mut request = create_json_request(
        "POST",
        "/todo",
        Some(&token),
        Some(json!({"title": "t", "description": "d"})),
    );
    request
        .headers_mut()
        .insert(header::ORIGIN, "http://localhost:3000".parse().unwrap());
    let (status, _) = app.send(request).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let response = app
        .router
        .clone()
        .oneshot(create_json_request("GET", "/auth/csrf-token", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap()
        .split(';')
        .next()
        .unwrap()
        .to_string();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let csrf: Value = serde_json::from_slice(&body).unwrap();

    let mut request = create_json_request(
        "POST",
        "/todo",
        Some(&token),
        Some(json!({"title": "t", "description": "d"})),
    );
    let headers = request.headers_mut();
    headers.insert(header::ORIGIN, "http://localhost:3000".parse().unwrap());
    headers.insert(header::COOKIE, cookie.parse().unwrap());
    headers.insert("x-csrf-token", csrf["csrfToken"].as_str().unwrap().parse().unwrap());
    let (status, body) = app.send(request).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
}

#[tokio::test]
async fn test_security_headers_in_production() {
    let config = AppConfig {
        environment: Environment::Production,
        ..AppConfig::default()
    };
    let app = TestApp::with_config(config);

    let response = app
        .router
        .clone()
        .oneshot(create_json_request("GET", "/health", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("content-security-policy"));
    assert_eq!(response.headers()["x-frame-options"], "SAMEORIGIN");
}
