//! Request sanitizer
//!
//! Runs ahead of the guard on every request. The reconstructed request URL
//! is screened first, then every string in the query and in the body of
//! POST/PUT/PATCH requests is cleaned and screened. A body is treated as
//! JSON whenever it parses as JSON, whatever its content type claims:
//!
//! 1. `%20` becomes a space
//! 2. control characters are stripped, and `javascript:`/`data:`/`vbscript:`
//!    values collapse to `about:blank`
//! 3. injection heuristics on the value
//! 4. markup is stripped (script/style blocks, then any tag)
//! 5. injection heuristics on the stripped value
//!
//! A heuristic hit rejects the request with 403. Otherwise the cleaned
//! query and body replace the originals.

use crate::audit::{audit_log, AuditEvent, RequestContext};
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, uri::PathAndQuery, HeaderValue, Method, Uri},
    middleware::Next,
    response::{IntoResponse, Response},
};
use regex::{Regex, RegexBuilder};
use serde_json::Value;
use std::sync::Arc;

/// Field name reported when the URL itself is rejected
const URL_FIELD: &str = "request_url";

/// SQL-injection and XSS heuristics, all case-insensitive
const INJECTION_PATTERNS: &[&str] = &[
    // quote followed by `or`
    r"w*((%27)|('))((%6F)|o|(%4F))((%72)|r|(%52))",
    // quote, comment and hash meta characters
    r"(%27)|(')|(--)|(%23)|(#)",
    // `=` followed by a quote, comment or terminator
    r"((%3D)|(=))[^\n]*((%27)|(')|(--)|(%3B)|(;))",
    r"((%27)|('))union",
    // `<tag>` / `</tag>`
    r"((%3C)|<)((%2F)|/)*[a-z0-9%]+((%3E)|>)",
    // `<img ...>`
    r"((%3C)|<)((%69)|i|(%49))((%6D)|m|(%4D))((%67)|g|(%47))[^\n]+((%3E)|>)",
];

/// Compiled injection heuristics
#[derive(Debug, Clone)]
pub struct InjectionRules {
    patterns: Vec<Regex>,
}

impl InjectionRules {
    pub fn new() -> Result<Self, regex::Error> {
        let patterns = INJECTION_PATTERNS
            .iter()
            .map(|p| RegexBuilder::new(p).case_insensitive(true).build())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    /// True when any heuristic matches
    pub fn is_match(&self, input: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(input))
    }
}

/// String cleaning and screening for request data
#[derive(Debug, Clone)]
pub struct Sanitizer {
    rules: InjectionRules,
    control_chars: Regex,
    unsafe_scheme: Regex,
    script_blocks: Regex,
    style_blocks: Regex,
    tags: Regex,
}

impl Sanitizer {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            rules: InjectionRules::new()?,
            control_chars: Regex::new(
                r"[\x{0000}-\x{001F}\x{007F}-\x{009F}\x{2000}-\x{200D}\x{FEFF}]",
            )?,
            unsafe_scheme: Regex::new(r"(?i)^[^\w]*(javascript|data|vbscript):")?,
            script_blocks: Regex::new(r"(?is)<script\b[^>]*>.*?</script\s*>")?,
            style_blocks: Regex::new(r"(?is)<style\b[^>]*>.*?</style\s*>")?,
            tags: Regex::new(r"(?s)<[^>]*>")?,
        })
    }

    pub fn rules(&self) -> &InjectionRules {
        &self.rules
    }

    /// Strip control characters and neutralize script-bearing schemes
    pub fn sanitize_url(&self, value: &str) -> String {
        let cleaned = self.control_chars.replace_all(value, "");
        let cleaned = cleaned.trim();
        if self.unsafe_scheme.is_match(cleaned) {
            return "about:blank".to_string();
        }
        cleaned.to_string()
    }

    /// Remove script/style blocks with their contents, then every tag
    pub fn strip_tags(&self, value: &str) -> String {
        let without_scripts = self.script_blocks.replace_all(value, "");
        let without_styles = self.style_blocks.replace_all(&without_scripts, "");
        self.tags.replace_all(&without_styles, "").into_owned()
    }

    /// Full pipeline for one value; `key` names the field on rejection
    pub fn clean(&self, key: &str, value: &str) -> Result<String, AppError> {
        let value = value.replace("%20", " ");
        let value = self.sanitize_url(&value);
        if self.rules.is_match(&value) {
            return Err(AppError::InvalidContent(key.to_string()));
        }

        let stripped = self.strip_tags(&value);
        if self.rules.is_match(&stripped) {
            return Err(AppError::InvalidContent(key.to_string()));
        }
        Ok(stripped)
    }

    /// Run [`Sanitizer::clean`] over every string in a JSON value, in place.
    ///
    /// Strings inside arrays are reported under the array's key.
    pub fn sanitize_value(&self, key: &str, value: &mut Value) -> Result<(), AppError> {
        match value {
            Value::String(s) => {
                *s = self.clean(key, s)?;
            }
            Value::Array(items) => {
                for item in items {
                    self.sanitize_value(key, item)?;
                }
            }
            Value::Object(map) => {
                for (field, item) in map.iter_mut() {
                    self.sanitize_value(field, item)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Strip-only pass: removes markup from every string, never rejects
    pub fn strip_markup(&self, value: &mut Value) {
        match value {
            Value::String(s) => *s = self.strip_tags(s),
            Value::Array(items) => items.iter_mut().for_each(|v| self.strip_markup(v)),
            Value::Object(map) => map.values_mut().for_each(|v| self.strip_markup(v)),
            _ => {}
        }
    }

    /// Screen the reconstructed request URL
    pub fn check_url(&self, url: &str) -> Result<(), AppError> {
        if self.rules.is_match(url) {
            return Err(AppError::InvalidContent(URL_FIELD.to_string()));
        }
        Ok(())
    }

    /// Clean every query parameter; returns the re-encoded query
    pub fn sanitize_query(&self, query: &str) -> Result<String, AppError> {
        let pairs: Vec<(String, String)> = serde_urlencoded::from_str(query)
            .map_err(|_| AppError::BadRequest("Malformed query string".to_string()))?;

        let cleaned = pairs
            .into_iter()
            .map(|(key, value)| {
                let value = self.clean(&key, &value)?;
                Ok((key, value))
            })
            .collect::<Result<Vec<_>, AppError>>()?;

        serde_urlencoded::to_string(&cleaned)
            .map_err(|_| AppError::BadRequest("Malformed query string".to_string()))
    }
}

/// Sanitizer middleware
pub async fn sanitize(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    let context = RequestContext::from_headers(request.headers());

    match sanitize_request(&state, request).await {
        Ok(request) => next.run(request).await,
        Err(err) => {
            if let AppError::InvalidContent(field) = &err {
                audit_log(&AuditEvent::ContentRejected {
                    path,
                    field: field.clone(),
                    context,
                });
            }
            err.into_response()
        }
    }
}

async fn sanitize_request(state: &AppState, request: Request) -> Result<Request, AppError> {
    let sanitizer = &state.sanitizer;
    sanitizer.check_url(&request_url(&request))?;

    let (mut parts, body) = request.into_parts();

    if let Some(query) = parts.uri.query().filter(|q| !q.is_empty()) {
        let cleaned = sanitizer.sanitize_query(query)?;
        parts.uri = replace_query(&parts.uri, &cleaned)?;
    }

    if !matches!(parts.method, Method::POST | Method::PUT | Method::PATCH) {
        return Ok(Request::from_parts(parts, body));
    }

    let bytes = axum::body::to_bytes(body, state.config.server.max_body_size)
        .await
        .map_err(|_| AppError::BadRequest("Failed to read request body".to_string()))?;

    // Non-JSON and malformed JSON bodies are left for the extractor to reject
    let Ok(mut value) = serde_json::from_slice::<Value>(&bytes) else {
        return Ok(Request::from_parts(parts, Body::from(bytes)));
    };

    sanitizer.sanitize_value("body", &mut value)?;

    let rewritten = serde_json::to_vec(&value)
        .map_err(|e| AppError::BadRequest(format!("Failed to encode request body: {e}")))?;
    parts
        .headers
        .insert(header::CONTENT_LENGTH, HeaderValue::from(rewritten.len()));

    Ok(Request::from_parts(parts, Body::from(rewritten)))
}

/// `scheme://host/path?query` as the client addressed it
fn request_url(request: &Request) -> String {
    let headers = request.headers();
    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("http");
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .or_else(|| request.uri().host())
        .unwrap_or("localhost");
    let path_and_query = request
        .uri()
        .path_and_query()
        .map(PathAndQuery::as_str)
        .unwrap_or("/");

    format!("{scheme}://{host}{path_and_query}")
}

fn replace_query(uri: &Uri, query: &str) -> Result<Uri, AppError> {
    let path_and_query = if query.is_empty() {
        uri.path().to_string()
    } else {
        format!("{}?{}", uri.path(), query)
    };

    let mut parts = uri.clone().into_parts();
    parts.path_and_query = Some(
        PathAndQuery::try_from(path_and_query)
            .map_err(|_| AppError::BadRequest("Malformed query string".to_string()))?,
    );
    Uri::from_parts(parts).map_err(|_| AppError::BadRequest("Malformed request URI".to_string()))
}
