//! API route definitions
//!
//! Routes are registered through [`ApiRouter`], which records each route's
//! access level in the guard's [`RouteTable`] as it adds the handler. The
//! global prefix is applied to everything except `/health`.

use crate::auth::{guard, Access, GuardState, RouteTable};
use crate::handlers::{auth, health, todo, user};
use crate::middleware::{csrf, rate_limit, sanitize, security_headers_middleware, CSRF_HEADER};
use crate::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    handler::Handler,
    http::{header, HeaderName, HeaderValue, Method},
    middleware,
    routing::{on, MethodFilter},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use todoguard_core::AppConfig;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

/// HTTP verbs the API uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Get,
    Post,
    Patch,
    Delete,
}

impl Verb {
    fn method(self) -> Method {
        match self {
            Verb::Get => Method::GET,
            Verb::Post => Method::POST,
            Verb::Patch => Method::PATCH,
            Verb::Delete => Method::DELETE,
        }
    }

    fn filter(self) -> MethodFilter {
        match self {
            Verb::Get => MethodFilter::GET,
            Verb::Post => MethodFilter::POST,
            Verb::Patch => MethodFilter::PATCH,
            Verb::Delete => MethodFilter::DELETE,
        }
    }
}

/// Router builder that keeps the access table in step with the routes
pub struct ApiRouter {
    router: Router<Arc<AppState>>,
    table: RouteTable,
    prefix: String,
}

impl ApiRouter {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            router: Router::new(),
            table: RouteTable::new(),
            prefix: prefix.into(),
        }
    }

    /// Register a prefixed route
    pub fn route<H, T>(self, verb: Verb, path: &str, access: Access, handler: H) -> Self
    where
        H: Handler<T, Arc<AppState>>,
        T: 'static,
    {
        let full = format!("{}{}", self.prefix, path);
        self.register(verb, full, access, handler)
    }

    /// Register a route outside the global prefix
    pub fn unprefixed<H, T>(self, verb: Verb, path: &str, access: Access, handler: H) -> Self
    where
        H: Handler<T, Arc<AppState>>,
        T: 'static,
    {
        self.register(verb, path.to_string(), access, handler)
    }

    fn register<H, T>(mut self, verb: Verb, path: String, access: Access, handler: H) -> Self
    where
        H: Handler<T, Arc<AppState>>,
        T: 'static,
    {
        self.router = self.router.route(&path, on(verb.filter(), handler));
        self.table.insert(verb.method(), path, access);
        self
    }

    pub fn finish(self) -> (Router<Arc<AppState>>, RouteTable) {
        (self.router, self.table)
    }
}

/// Every API route with its access level
pub fn api_routes(prefix: &str) -> ApiRouter {
    use Access::{Protected, Public, RefreshFlow};
    use Verb::{Delete, Get, Patch, Post};

    ApiRouter::new(prefix)
        .unprefixed(Get, "/health", Public, health::health_check)
        // Auth
        .route(Post, "/auth/signup", Public, auth::signup)
        .route(Post, "/auth/login", Public, auth::login)
        .route(Post, "/auth/refresh", RefreshFlow, auth::refresh)
        .route(Post, "/auth/logout", Protected, auth::logout)
        .route(Get, "/auth/csrf-token", Public, auth::csrf_token)
        // Users
        .route(Get, "/user/get-user", Protected, user::get_user)
        .route(Get, "/user/get-all", Public, user::get_all)
        // Todos
        .route(Post, "/todo", Protected, todo::create)
        .route(Get, "/todo", Protected, todo::list_own)
        .route(Get, "/todo/allTodo", Protected, todo::list_all)
        .route(Patch, "/todo/:id", Protected, todo::update)
        .route(Delete, "/todo/:id", Protected, todo::delete)
}

/// Build the application router with its middleware stack
pub fn create_router(state: Arc<AppState>) -> Router {
    let config = &state.config;
    let prefix = config.server.route_prefix();

    let (routes, table) = api_routes(&prefix).finish();
    tracing::debug!(routes = table.len(), prefix = %prefix, "Registered routes");

    let guard_state = GuardState {
        app: state.clone(),
        routes: Arc::new(table),
    };

    // Innermost first: guard, sanitizer, CSRF, rate limit
    let mut router = routes
        .layer(middleware::from_fn_with_state(guard_state, guard))
        .layer(middleware::from_fn_with_state(state.clone(), sanitize))
        .layer(middleware::from_fn_with_state(state.clone(), csrf))
        .layer(middleware::from_fn_with_state(state.clone(), rate_limit));

    if config.environment.serves_docs() {
        router = router.merge(
            SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::with_prefix(&prefix)),
        );
    }

    let mut router = router.with_state(state.clone());

    if config.environment.is_production() {
        router = router.layer(middleware::from_fn(security_headers_middleware));
    }

    router
        .layer(DefaultBodyLimit::max(config.server.max_body_size))
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(cors_layer(config))
        .layer(TraceLayer::new_for_http())
}

/// Any origin (mirrored) in dev/qa, the configured allow-list elsewhere
fn cors_layer(config: &AppConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static(CSRF_HEADER),
        ])
        .allow_credentials(true);

    if config.environment.allows_any_origin() {
        return cors.allow_origin(AllowOrigin::mirror_request());
    }

    let origins: Vec<HeaderValue> = config
        .security
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid allowed origin");
                None
            }
        })
        .collect();

    cors.allow_origin(AllowOrigin::list(origins))
}

/// OpenAPI document
#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::signup,
        auth::login,
        auth::refresh,
        auth::logout,
        auth::csrf_token,
        user::get_user,
        user::get_all,
        todo::create,
        todo::list_own,
        todo::list_all,
        todo::update,
        todo::delete,
    ),
    components(schemas(
        crate::error::ApiError,
        crate::auth::SignupRequest,
        crate::auth::LoginRequest,
        crate::auth::TokenPair,
        crate::auth::AuthResponse,
        crate::auth::MessageResponse,
        crate::auth::CsrfTokenResponse,
        crate::handlers::PaginationQuery,
        todo::CreateTodoRequest,
        todo::UpdateTodoRequest,
        health::HealthResponse,
        health::ComponentStatus,
        todoguard_core::User,
        todoguard_core::UserRole,
        todoguard_core::Todo,
        todoguard_core::SortOrder,
        todoguard_core::UserPage,
        todoguard_core::TodoPage,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "health", description = "Liveness"),
        (name = "auth", description = "Signup, login and session tokens"),
        (name = "user", description = "User profiles"),
        (name = "todo", description = "Todo items"),
    )
)]
pub struct ApiDoc;

impl ApiDoc {
    /// Document with the global prefix applied to every path but `/health`
    pub fn with_prefix(prefix: &str) -> utoipa::openapi::OpenApi {
        let mut doc = Self::openapi();
        if prefix.is_empty() {
            return doc;
        }

        let paths = std::mem::take(&mut doc.paths.paths);
        doc.paths.paths = paths
            .into_iter()
            .map(|(path, item)| {
                if path == "/health" {
                    (path, item)
                } else {
                    (format!("{prefix}{path}"), item)
                }
            })
            .collect();
        doc
    }
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_table_matches_registrations() {
        let (_, table) = api_routes("/api").finish();

        assert_eq!(table.len(), 13);
        assert_eq!(
            table.lookup(&Method::GET, "/health"),
            Some(Access::Public)
        );
        assert_eq!(
            table.lookup(&Method::POST, "/api/auth/refresh"),
            Some(Access::RefreshFlow)
        );
        assert_eq!(
            table.lookup(&Method::DELETE, "/api/todo/:id"),
            Some(Access::Protected)
        );
        assert_eq!(
            table.lookup(&Method::GET, "/api/user/get-all"),
            Some(Access::Public)
        );
        assert_eq!(table.lookup(&Method::GET, "/todo"), None);
    }

    #[test]
    fn test_openapi_prefix() {
        let doc = ApiDoc::with_prefix("/api");
        assert!(doc.paths.paths.contains_key("/health"));
        assert!(doc.paths.paths.contains_key("/api/auth/signup"));
        assert!(doc.paths.paths.contains_key("/api/todo/{id}"));
        assert!(!doc.paths.paths.contains_key("/auth/signup"));
    }

    #[test]
    fn test_openapi_has_bearer_scheme() {
        let doc = ApiDoc::openapi();
        let components = doc.components.unwrap();
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }
}
