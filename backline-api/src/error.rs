//! HTTP error translation
//!
//! Handlers return `ApiResult<T>`; errors are translated to the HTTP
//! taxonomy at the boundary. Backend messages are forwarded; internal
//! errors get a generic message so nothing leaks to clients.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

use backline_common::Error;

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Wrapper giving the common error taxonomy an HTTP rendering
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            Error::Validation(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg.clone()),
            Error::Auth(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            Error::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Error::RateLimited(msg) => (StatusCode::TOO_MANY_REQUESTS, msg.clone()),
            // Downstream failure: message forwarded, not guaranteed stable
            Error::Backend(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            Error::Io(_) | Error::Config(_) | Error::Internal(_) => {
                error!("internal error: {}", self.0);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
