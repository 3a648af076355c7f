//! Extractors whose rejections are [`ServerError`]s, so malformed requests
//! get the same `{"error": code}` body as every other failure.

use axum::extract::{FromRequest, FromRequestParts, Path, Query, Request};
use axum::http::request::Parts;
use axum::Json;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::ServerError;

/// JSON request body.  Rejects with 400 `invalid_body`.
pub struct JsonBody<T>(pub T);

#[axum::async_trait]
impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(JsonBody(value)),
            Err(rejection) => {
                debug!(reason = %rejection.body_text(), "rejected request body");
                Err(ServerError::Validation("invalid_body"))
            }
        }
    }
}

/// Query string.  Rejects with 400 `invalid_query`.
pub struct QueryParams<T>(pub T);

#[axum::async_trait]
impl<S, T> FromRequestParts<S> for QueryParams<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(value)) => Ok(QueryParams(value)),
            Err(rejection) => {
                debug!(reason = %rejection.body_text(), "rejected query string");
                Err(ServerError::Validation("invalid_query"))
            }
        }
    }
}

/// Path parameters.  A segment that fails to decode names nothing, so
/// this rejects with 404 `not_found`.
pub struct PathParam<T>(pub T);

#[axum::async_trait]
impl<S, T> FromRequestParts<S> for PathParam<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Path::<T>::from_request_parts(parts, state).await {
            Ok(Path(value)) => Ok(PathParam(value)),
            Err(rejection) => {
                debug!(reason = %rejection.body_text(), "rejected path parameter");
                Err(ServerError::NotFound)
            }
        }
    }
}

/// A block id from the path; `None` unless it is an integer.  No block
/// can carry such an id.
pub fn parse_block_id(raw: &str) -> Option<i64> {
    raw.trim().parse().ok()
}
