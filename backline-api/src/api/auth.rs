//! Authentication flow handlers
//!
//! Pre-identity flows only: password reset and magic-link sign-in. Link
//! delivery belongs to the external identity provider; these handlers own
//! the request-side behavior the apps rely on. Password reset responds
//! identically whether or not the account exists, so the endpoint cannot be
//! used to enumerate addresses.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use backline_common::{Error, Result};

use crate::error::ApiResult;
use crate::state::AppContext;

/// Uniform reply for password reset, regardless of account existence
const RESET_MESSAGE: &str =
    "If an account exists for that address, a password reset link has been sent.";

/// Uniform reply for magic-link requests under the rate limit
const MAGIC_LINK_MESSAGE: &str =
    "If an account exists for that address, a sign-in link has been sent.";

/// User-facing copy for over-limit requests
const RATE_LIMIT_MESSAGE: &str = "Too many attempts. Please try again later.";

#[derive(Debug, Deserialize)]
pub struct EmailPayload {
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: &'static str,
}

/// POST /api/auth/password-reset
///
/// Always 200 with the generic message for well-formed addresses.
pub async fn password_reset(
    State(_ctx): State<AppContext>,
    Json(payload): Json<EmailPayload>,
) -> ApiResult<Json<MessageResponse>> {
    let email = normalize_email(&payload.email)?;
    info!(email = %redact(&email), "password reset requested");

    Ok(Json(MessageResponse {
        success: true,
        message: RESET_MESSAGE,
    }))
}

/// POST /api/auth/magic-link
///
/// Rate limited per address; over-limit requests get 429 with a
/// user-facing message.
pub async fn magic_link(
    State(ctx): State<AppContext>,
    Json(payload): Json<EmailPayload>,
) -> ApiResult<Json<MessageResponse>> {
    let email = normalize_email(&payload.email)?;
    ctx.magic_link_limiter.check(&email)?;
    info!(email = %redact(&email), "magic link requested");

    Ok(Json(MessageResponse {
        success: true,
        message: MAGIC_LINK_MESSAGE,
    }))
}

/// Minimal shape check; the identity provider does the real validation.
fn normalize_email(email: &str) -> Result<String> {
    let email = email.trim().to_ascii_lowercase();
    let valid = email
        .split_once('@')
        .map(|(local, domain)| !local.is_empty() && domain.contains('.'))
        .unwrap_or(false);
    if !valid {
        return Err(Error::Validation("a valid email address is required".to_string()));
    }
    Ok(email)
}

/// Log-safe rendering: keep the domain, hide the local part
fn redact(email: &str) -> String {
    match email.split_once('@') {
        Some((_, domain)) => format!("***@{domain}"),
        None => "***".to_string(),
    }
}

/// Sliding-window request limiter keyed by normalized address.
///
/// In the hosted original this limit lives in the identity provider; here
/// it is enforced in-process so the 429 surface behaves the same.
pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    requests: Mutex<HashMap<String, Vec<Instant>>>,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            requests: Mutex::new(HashMap::new()),
        }
    }

    /// Record one request for `key`, failing with `Error::RateLimited` when
    /// the window already holds `max_requests`.
    pub fn check(&self, key: &str) -> Result<()> {
        let now = Instant::now();
        let mut requests = self.requests.lock().unwrap();
        let entry = requests.entry(key.to_string()).or_default();
        entry.retain(|at| now.duration_since(*at) < self.window);

        if entry.len() >= self.max_requests {
            return Err(Error::RateLimited(RATE_LIMIT_MESSAGE.to_string()));
        }

        entry.push(now);
        Ok(())
    }
}
