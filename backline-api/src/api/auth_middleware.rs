//! Authentication middleware
//!
//! Tower layer validating the `Authorization: Bearer <service_key>` header
//! on API routes. Public routes are skipped: the health check, the SSE
//! endpoint (the EventSource API cannot send custom headers), and the
//! pre-identity auth flows. An empty configured key disables the check.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::extract::Request;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tower::{Layer, Service};

/// Tower layer for bearer-token authentication
#[derive(Clone)]
pub struct AuthLayer {
    pub service_key: Arc<str>,
}

impl AuthLayer {
    pub fn new(service_key: &str) -> Self {
        Self {
            service_key: Arc::from(service_key),
        }
    }
}

impl<S> Layer<S> for AuthLayer {
    type Service = AuthMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthMiddleware {
            inner,
            service_key: Arc::clone(&self.service_key),
        }
    }
}

/// Tower service that performs the bearer check
#[derive(Clone)]
pub struct AuthMiddleware<S> {
    inner: S,
    service_key: Arc<str>,
}

impl<S> Service<Request> for AuthMiddleware<S>
where
    S: Service<Request, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request) -> Self::Future {
        let service_key = Arc::clone(&self.service_key);
        let mut inner = self.inner.clone();

        Box::pin(async move {
            // Auth disabled by configuration (empty key)
            if service_key.is_empty() || is_public(request.uri().path()) {
                return inner.call(request).await;
            }

            let presented = bearer_token(request.headers()).map(|t| t == service_key.as_ref());
            match presented {
                Some(true) => inner.call(request).await,
                Some(false) => Ok(unauthorized("Service key is not valid")),
                None => Ok(unauthorized("Authorization bearer token is required")),
            }
        })
    }
}

/// Routes reachable without a bearer token
fn is_public(path: &str) -> bool {
    path == "/health" || path == "/api/events" || path.starts_with("/api/auth/")
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

fn unauthorized(message: &str) -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({ "error": message }))).into_response()
}
