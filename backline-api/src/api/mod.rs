//! HTTP API surface

pub mod auth;
pub mod auth_middleware;
pub mod handlers;
pub mod sse;
