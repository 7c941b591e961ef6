//! Extractors that run `validator` rules before the handler sees the value
//!
//! Deserialization failures are 400; rule violations are 412 with
//! per-field messages.

use crate::error::AppError;
use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Query, Request},
    http::request::Parts,
    Json,
};
use serde::de::DeserializeOwned;
use validator::Validate;

/// JSON body that passed validation
#[derive(Debug, Clone)]
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;
        value.validate()?;
        Ok(Self(value))
    }
}

/// Query string that passed validation
#[derive(Debug, Clone)]
pub struct ValidatedQuery<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for ValidatedQuery<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;
        value.validate()?;
        Ok(Self(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::StatusCode, response::IntoResponse, routing::get, Router};
    use serde::Deserialize;
    use tower::ServiceExt;

    #[derive(Debug, Deserialize, Validate)]
    struct Params {
        #[validate(range(min = 1, max = 10))]
        n: i64,
    }

    async fn echo(ValidatedQuery(params): ValidatedQuery<Params>) -> impl IntoResponse {
        params.n.to_string()
    }

    async fn status_of(uri: &str) -> StatusCode {
        let app = Router::new().route("/", get(echo));
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        app.oneshot(request).await.unwrap().status()
    }

    #[tokio::test]
    async fn test_validated_query() {
        assert_eq!(status_of("/?n=5").await, StatusCode::OK);
        assert_eq!(status_of("/?n=0").await, StatusCode::PRECONDITION_FAILED);
        assert_eq!(status_of("/?n=abc").await, StatusCode::BAD_REQUEST);
    }
}
